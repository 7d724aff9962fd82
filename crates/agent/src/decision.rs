use crate::intent::IntentSignals;

/// Store-derived facts about a conversation, read before a reply is decided.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HistoryFlags {
    pub has_any_history: bool,
    pub link_sent_before: bool,
}

/// Per-message link and tone policy. Recomputed for every message, never persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecisionRecord {
    pub is_first_interaction: bool,
    pub link_sent_before: bool,
    pub is_registered: bool,
    pub wants_link: bool,
    pub is_farewell_raw: bool,
    pub is_farewell_exclusive: bool,
    pub should_block_link: bool,
    pub should_send_link: bool,
}

impl DecisionRecord {
    pub fn resolve(intent: IntentSignals, history: HistoryFlags) -> Self {
        let is_first_interaction = !history.has_any_history;
        let is_farewell_exclusive =
            intent.is_farewell && !intent.wants_link && !intent.is_registered;
        let should_block_link = intent.is_registered || is_farewell_exclusive;
        let should_send_link = !should_block_link && (is_first_interaction || intent.wants_link);

        Self {
            is_first_interaction,
            link_sent_before: history.link_sent_before,
            is_registered: intent.is_registered,
            wants_link: intent.wants_link,
            is_farewell_raw: intent.is_farewell,
            is_farewell_exclusive,
            should_block_link,
            should_send_link,
        }
    }

    /// Decision used when nothing about the message could be read: a first contact
    /// that should receive the link.
    pub fn first_contact() -> Self {
        Self::resolve(IntentSignals::default(), HistoryFlags::default())
    }

    pub fn fallback_category(&self) -> FallbackCategory {
        if self.should_block_link {
            FallbackCategory::Farewell
        } else if self.is_first_interaction && !self.wants_link {
            FallbackCategory::Greeting
        } else if self.should_send_link {
            FallbackCategory::Resend
        } else {
            FallbackCategory::AlreadySent
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FallbackCategory {
    Greeting,
    Resend,
    AlreadySent,
    Farewell,
}

impl FallbackCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::Resend => "resend",
            Self::AlreadySent => "already_sent",
            Self::Farewell => "farewell",
        }
    }

    /// Whether templates of this category carry the registration link.
    pub fn includes_link(&self) -> bool {
        matches!(self, Self::Greeting | Self::Resend)
    }
}

#[cfg(test)]
mod tests {
    use super::{DecisionRecord, FallbackCategory, HistoryFlags};
    use crate::intent::IntentSignals;

    fn every_input() -> impl Iterator<Item = (IntentSignals, HistoryFlags)> {
        (0u8..32).map(|bits| {
            let bit = |index: u8| bits & (1 << index) != 0;
            (
                IntentSignals { is_registered: bit(0), wants_link: bit(1), is_farewell: bit(2) },
                HistoryFlags { has_any_history: bit(3), link_sent_before: bit(4) },
            )
        })
    }

    #[test]
    fn block_and_send_are_mutually_exclusive_for_every_input() {
        for (intent, history) in every_input() {
            let record = DecisionRecord::resolve(intent, history);
            assert!(
                !(record.should_block_link && record.should_send_link),
                "conflicting decision for {intent:?} {history:?}"
            );
        }
    }

    #[test]
    fn truth_table_matches_policy_formulas() {
        for (intent, history) in every_input() {
            let record = DecisionRecord::resolve(intent, history);
            let first = !history.has_any_history;
            let exclusive = intent.is_farewell && !intent.wants_link && !intent.is_registered;
            let block = intent.is_registered || exclusive;

            assert_eq!(record.is_first_interaction, first);
            assert_eq!(record.is_farewell_exclusive, exclusive);
            assert_eq!(record.should_block_link, block);
            assert_eq!(record.should_send_link, !block && (first || intent.wants_link));
            assert_eq!(record.link_sent_before, history.link_sent_before);
        }
    }

    #[test]
    fn link_sent_before_never_changes_the_link_decision() {
        for (intent, history) in every_input() {
            let flipped = HistoryFlags { link_sent_before: !history.link_sent_before, ..history };
            let a = DecisionRecord::resolve(intent, history);
            let b = DecisionRecord::resolve(intent, flipped);
            assert_eq!(a.should_send_link, b.should_send_link);
            assert_eq!(a.should_block_link, b.should_block_link);
        }
    }

    #[test]
    fn fallback_category_agrees_with_link_decision() {
        for (intent, history) in every_input() {
            let record = DecisionRecord::resolve(intent, history);
            assert_eq!(record.fallback_category().includes_link(), record.should_send_link);
        }
    }

    #[test]
    fn fallback_categories_for_representative_states() {
        let returning = HistoryFlags { has_any_history: true, link_sent_before: true };

        let registered =
            DecisionRecord::resolve(IntentSignals { is_registered: true, ..Default::default() }, returning);
        assert_eq!(registered.fallback_category(), FallbackCategory::Farewell);

        let thanks =
            DecisionRecord::resolve(IntentSignals { is_farewell: true, ..Default::default() }, returning);
        assert_eq!(thanks.fallback_category(), FallbackCategory::Farewell);

        let resend =
            DecisionRecord::resolve(IntentSignals { wants_link: true, ..Default::default() }, returning);
        assert_eq!(resend.fallback_category(), FallbackCategory::Resend);

        let idle = DecisionRecord::resolve(IntentSignals::default(), returning);
        assert_eq!(idle.fallback_category(), FallbackCategory::AlreadySent);

        assert_eq!(DecisionRecord::first_contact().fallback_category(), FallbackCategory::Greeting);
        assert!(DecisionRecord::first_contact().should_send_link);
    }
}
