use chrono::{DateTime, FixedOffset, Timelike, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DayPeriod {
    Morning,
    Afternoon,
    Evening,
}

impl DayPeriod {
    /// Before 12 is morning, before 18 afternoon, anything later evening.
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            0..=11 => Self::Morning,
            12..=17 => Self::Afternoon,
            _ => Self::Evening,
        }
    }

    pub fn at(instant: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self::from_hour(instant.with_timezone(&offset).hour())
    }

    pub fn salutation(&self) -> &'static str {
        match self {
            Self::Morning => "Buenos días",
            Self::Afternoon => "Buenas tardes",
            Self::Evening => "Buenas noches",
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, TimeZone, Utc};

    use super::DayPeriod;

    #[test]
    fn hour_boundaries_follow_noon_and_six_pm() {
        assert_eq!(DayPeriod::from_hour(0), DayPeriod::Morning);
        assert_eq!(DayPeriod::from_hour(11), DayPeriod::Morning);
        assert_eq!(DayPeriod::from_hour(12), DayPeriod::Afternoon);
        assert_eq!(DayPeriod::from_hour(17), DayPeriod::Afternoon);
        assert_eq!(DayPeriod::from_hour(18), DayPeriod::Evening);
        assert_eq!(DayPeriod::from_hour(23), DayPeriod::Evening);
    }

    #[test]
    fn period_is_computed_in_reference_offset() {
        let bogota = FixedOffset::west_opt(5 * 3600).expect("valid offset");
        // 03:30 UTC is 22:30 the previous evening in UTC-5.
        let instant = Utc.with_ymd_and_hms(2026, 3, 10, 3, 30, 0).single().expect("valid instant");
        assert_eq!(DayPeriod::at(instant, bogota), DayPeriod::Evening);

        let instant = Utc.with_ymd_and_hms(2026, 3, 10, 14, 0, 0).single().expect("valid instant");
        assert_eq!(DayPeriod::at(instant, bogota), DayPeriod::Morning);
        assert_eq!(DayPeriod::at(instant, bogota).salutation(), "Buenos días");
    }
}
