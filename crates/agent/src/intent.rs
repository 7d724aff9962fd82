use outreach_core::text;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntentCategory {
    AlreadyRegistered,
    WantsLink,
    Farewell,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchMode {
    /// The phrase appears anywhere in the text.
    Substring,
    /// The phrase appears as a run of whole words.
    Word,
}

#[derive(Clone, Copy, Debug)]
pub struct IntentRule {
    pub category: IntentCategory,
    pub mode: MatchMode,
    pub phrases: &'static [&'static str],
}

impl IntentRule {
    fn matches(&self, normalized: &str, words: &[&str]) -> bool {
        self.phrases.iter().any(|phrase| match self.mode {
            MatchMode::Substring => normalized.contains(phrase),
            MatchMode::Word => contains_word_run(words, phrase),
        })
    }
}

/// Bare negatives ("no", "nada") count as "I don't see the link, send it again". They match
/// as substrings, so unrelated negatives and words such as "buenos" also ask for the link.
pub const DEFAULT_RULES: &[IntentRule] = &[
    IntentRule {
        category: IntentCategory::AlreadyRegistered,
        mode: MatchMode::Substring,
        phrases: &[
            "ya me registre",
            "ya me inscribi",
            "ya lo llene",
            "ya participe",
            "listo el registro",
            "ya quedo",
        ],
    },
    IntentRule {
        category: IntentCategory::WantsLink,
        mode: MatchMode::Substring,
        phrases: &[
            "envia el link",
            "mandame el enlace",
            "reenvia",
            "otra vez",
            "de nuevo",
            "pasa el link",
            "quiero inscribirme",
            "quiero participar",
            "me quiero anotar",
            "como me inscribo",
            "a donde entro",
            "cual es el link",
            "no lo veo",
            "no aparece",
            "no me llego",
            "no",
            "tampoco",
            "nada",
        ],
    },
    IntentRule {
        category: IntentCategory::Farewell,
        mode: MatchMode::Substring,
        phrases: &[
            "gracias",
            "muy amable",
            "agradecido",
            "hasta luego",
            "chao",
            "nos vemos",
            "bendiciones",
            "feliz dia",
        ],
    },
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IntentSignals {
    pub is_registered: bool,
    pub wants_link: bool,
    pub is_farewell: bool,
}

#[derive(Clone, Debug)]
pub struct IntentClassifier {
    rules: Vec<IntentRule>,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_RULES.to_vec())
    }
}

impl IntentClassifier {
    pub fn new(rules: Vec<IntentRule>) -> Self {
        Self { rules }
    }

    /// Expects text already passed through [`text::normalize`].
    pub fn matches(&self, category: IntentCategory, normalized: &str) -> bool {
        let words = text::words(normalized).collect::<Vec<_>>();
        self.rules
            .iter()
            .filter(|rule| rule.category == category)
            .any(|rule| rule.matches(normalized, &words))
    }

    pub fn classify(&self, normalized: &str) -> IntentSignals {
        IntentSignals {
            is_registered: self.matches(IntentCategory::AlreadyRegistered, normalized),
            wants_link: self.matches(IntentCategory::WantsLink, normalized),
            is_farewell: self.matches(IntentCategory::Farewell, normalized),
        }
    }
}

fn contains_word_run(words: &[&str], phrase: &str) -> bool {
    let needle = phrase.split_whitespace().collect::<Vec<_>>();
    if needle.is_empty() || needle.len() > words.len() {
        return false;
    }
    words.windows(needle.len()).any(|window| window == needle.as_slice())
}
