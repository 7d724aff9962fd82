use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Lower-cases, strips diacritics and trims surrounding whitespace.
///
/// Decomposes to NFD and drops combining marks, so `"Ya me REGISTRÉ "` becomes
/// `"ya me registre"` and `"ñ"` folds to `"n"`. Empty input yields an empty string.
pub fn normalize(raw: &str) -> String {
    let stripped =
        raw.nfd().filter(|character| !is_combining_mark(*character)).collect::<String>();
    stripped.to_lowercase().trim().to_string()
}

pub fn is_blank(raw: &str) -> bool {
    raw.trim().is_empty()
}

/// Splits normalized text into alphanumeric word tokens.
pub fn words(normalized: &str) -> impl Iterator<Item = &str> {
    normalized.split(|character: char| !character.is_alphanumeric()).filter(|word| !word.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{is_blank, normalize, words};

    #[test]
    fn folds_case_and_strips_diacritics() {
        assert_eq!(normalize("  Ya me REGISTRÉ  "), "ya me registre");
        assert_eq!(normalize("Buenos Días, Señora"), "buenos dias, senora");
        assert_eq!(normalize("¿Cuál es el LINK?"), "¿cual es el link?");
    }

    #[test]
    fn empty_and_whitespace_inputs_normalize_to_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize(" \n\t "), "");
        assert!(is_blank(" \n\t "));
        assert!(!is_blank(" no "));
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = normalize("Gracias, FELIZ DÍA 🎉");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn words_split_on_punctuation() {
        let tokens = words("no, la verdad... no lo veo!").collect::<Vec<_>>();
        assert_eq!(tokens, vec!["no", "la", "verdad", "no", "lo", "veo"]);
    }
}
