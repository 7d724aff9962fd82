use std::sync::{Arc, LazyLock};

use chrono::FixedOffset;
use regex::Regex;

use outreach_core::config::CampaignConfig;
use outreach_core::text;
use outreach_core::{Clock, DayPeriod};

use crate::decision::DecisionRecord;

const LINK_INTRODUCTION: &str = "Aquí le adjunto el enlace de inscripción 👇:";

/// Normalized openings that count as a greeting when they start a reply.
pub const GREETING_TOKENS: &[&str] =
    &["hola", "buenos dias", "buenas tardes", "buenas noches", "buen dia", "saludos"];

static EXCESS_NEWLINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("excess newlines regex is invalid"));

static REPEATED_SPACES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" {2,}").expect("repeated spaces regex is invalid"));

/// Any URL on `domain`, with or without protocol, through the end of the token.
fn link_pattern(domain: &str) -> Option<Regex> {
    if domain.is_empty() {
        return None;
    }
    Regex::new(&format!(r"(?i)(?:https?://)?{}\S*", regex::escape(domain))).ok()
}

/// Repairs any outgoing reply so the link appears exactly when the decision requires it
/// and the reply opens with a greeting. Applying it twice is the same as applying it once.
#[derive(Clone)]
pub struct ResponsePolicy {
    link_url: String,
    link: Option<Regex>,
    offset: FixedOffset,
    clock: Arc<dyn Clock>,
}

impl ResponsePolicy {
    pub fn new(campaign: &CampaignConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            link_url: campaign.link_url.trim().to_string(),
            link: link_pattern(campaign.link_domain()),
            offset: campaign.reference_offset(),
            clock,
        }
    }

    pub fn salutation(&self) -> &'static str {
        DayPeriod::at(self.clock.now(), self.offset).salutation()
    }

    /// Counts links on the campaign domain, whatever their path or query.
    pub fn link_count(&self, candidate: &str) -> usize {
        self.link.as_ref().map_or(0, |link| link.find_iter(candidate).count())
    }

    pub fn enforce(&self, candidate: &str, decision: &DecisionRecord, name: Option<&str>) -> String {
        let linked = self.enforce_link(candidate, decision.should_send_link);
        let greeted = self.enforce_greeting(linked, name);
        EXCESS_NEWLINES.replace_all(&greeted, "\n\n").trim().to_string()
    }

    fn enforce_link(&self, candidate: &str, should_send_link: bool) -> String {
        let Some(link) = &self.link else {
            return candidate.to_string();
        };

        match (should_send_link, link.find(candidate)) {
            (true, None) => {
                format!("{}\n\n{LINK_INTRODUCTION}\n{}", candidate.trim_end(), self.link_url)
            }
            (true, Some(first)) => {
                let (kept, rest) = candidate.split_at(first.end());
                if !link.is_match(rest) {
                    return candidate.to_string();
                }
                format!("{kept}{}", strip_links(link, rest))
            }
            (false, Some(_)) => strip_links(link, candidate),
            (false, None) => candidate.to_string(),
        }
    }

    fn enforce_greeting(&self, candidate: String, name: Option<&str>) -> String {
        if opens_with_greeting(&candidate) {
            return candidate;
        }
        let salutation = self.salutation();
        let opening = match name.map(str::trim).filter(|name| !name.is_empty()) {
            Some(name) => format!("¡{salutation}, {name}! 👋"),
            None => format!("¡{salutation}! 👋"),
        };
        format!("{opening}\n\n{candidate}")
    }
}

fn strip_links(link: &Regex, candidate: &str) -> String {
    let stripped = link.replace_all(candidate, "");
    REPEATED_SPACES.replace_all(&stripped, " ").into_owned()
}

/// Case and diacritic insensitive. Leading punctuation and emoji are skipped.
pub fn opens_with_greeting(candidate: &str) -> bool {
    let normalized = text::normalize(candidate);
    let opening = normalized.trim_start_matches(|character: char| !character.is_alphanumeric());
    GREETING_TOKENS.iter().any(|token| {
        opening.strip_prefix(token).is_some_and(|rest| {
            rest.chars().next().map_or(true, |next| !next.is_alphanumeric())
        })
    })
}
