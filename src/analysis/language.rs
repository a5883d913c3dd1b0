use std::collections::HashSet;

/// ISO 639-1 codes plus a few widely used three-letter codes.
const BUILTIN_LANGUAGES: &[&str] = &[
    "aa", "ab", "ae", "af", "ak", "am", "an", "ar", "as", "av", "ay", "az", "ba", "be", "bg", "bh",
    "bi", "bm", "bn", "bo", "br", "bs", "ca", "ce", "ch", "co", "cr", "cs", "cu", "cv", "cy", "da",
    "de", "dv", "dz", "ee", "el", "en", "eo", "es", "et", "eu", "fa", "ff", "fi", "fj", "fo", "fr",
    "fy", "ga", "gd", "gl", "gn", "gu", "gv", "ha", "he", "hi", "ho", "hr", "ht", "hu", "hy", "hz",
    "ia", "id", "ie", "ig", "ii", "ik", "io", "is", "it", "iu", "ja", "jv", "ka", "kg", "ki", "kj",
    "kk", "kl", "km", "kn", "ko", "kr", "ks", "ku", "kv", "kw", "ky", "la", "lb", "lg", "li", "ln",
    "lo", "lt", "lu", "lv", "mg", "mh", "mi", "mk", "ml", "mn", "mr", "ms", "mt", "my", "na", "nb",
    "nd", "ne", "ng", "nl", "nn", "no", "nr", "nv", "ny", "oc", "oj", "om", "or", "os", "pa", "pi",
    "pl", "ps", "pt", "qu", "rm", "rn", "ro", "ru", "rw", "sa", "sc", "sd", "se", "sg", "si", "sk",
    "sl", "sm", "sn", "so", "sq", "sr", "ss", "st", "su", "sv", "sw", "ta", "te", "tg", "th", "ti",
    "tk", "tl", "tn", "to", "tr", "ts", "tt", "tw", "ty", "ug", "uk", "ur", "uz", "ve", "vi", "vo",
    "wa", "wo", "xh", "yi", "yo", "za", "zh", "zu",
    "ast", "ckb", "fil", "gsw", "haw", "kok", "mni", "nds", "sat", "sco", "yue",
];

/// Validates and canonicalizes language tags.
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    languages: HashSet<String>,
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        LanguageRegistry::new()
    }
}

impl LanguageRegistry {
    pub fn new() -> Self {
        LanguageRegistry {
            languages: BUILTIN_LANGUAGES.iter().map(|code| code.to_string()).collect(),
        }
    }

    /// Adds primary language subtags to the registry.
    pub fn with_languages<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.languages
            .extend(codes.into_iter().map(|code| code.as_ref().to_lowercase()));
        self
    }

    pub fn is_known(&self, primary: &str) -> bool {
        self.languages.contains(&primary.to_lowercase())
    }

    /// Canonical form of `tag`, or `None` when it is not a usable tag.
    ///
    /// `pt_br` becomes `pt-BR`, `zh-hant-tw` becomes `zh-Hant-TW`.
    pub fn normalize(&self, tag: &str) -> Option<String> {
        let tag = tag.trim().replace('_', "-");
        let mut parts = tag.split('-');

        let primary = parts.next()?.to_lowercase();
        if !self.is_known(&primary) {
            return None;
        }

        let mut result = vec![primary];
        let mut seen_script = false;
        let mut seen_region = false;
        let mut seen_variant = false;

        for part in parts {
            if part.is_empty() || !part.chars().all(|c| c.is_ascii_alphanumeric()) {
                return None;
            }
            let alpha = part.chars().all(|c| c.is_ascii_alphabetic());
            let digits = part.chars().all(|c| c.is_ascii_digit());

            if part.len() == 4 && alpha && !seen_script && !seen_region && !seen_variant {
                let mut script = part.to_lowercase();
                script[..1].make_ascii_uppercase();
                result.push(script);
                seen_script = true;
            } else if ((part.len() == 2 && alpha) || (part.len() == 3 && digits))
                && !seen_region
                && !seen_variant
            {
                result.push(part.to_uppercase());
                seen_region = true;
            } else if (5..=8).contains(&part.len())
                || (part.len() == 4 && part.starts_with(|c: char| c.is_ascii_digit()))
            {
                result.push(part.to_lowercase());
                seen_variant = true;
            } else {
                return None;
            }
        }

        Some(result.join("-"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_case_and_separator() {
        let registry = LanguageRegistry::new();
        assert_eq!(registry.normalize("EN").as_deref(), Some("en"));
        assert_eq!(registry.normalize("pt_br").as_deref(), Some("pt-BR"));
        assert_eq!(registry.normalize("zh-hant-tw").as_deref(), Some("zh-Hant-TW"));
        assert_eq!(registry.normalize("es-419").as_deref(), Some("es-419"));
        assert_eq!(registry.normalize("de-DE-1996").as_deref(), Some("de-DE-1996"));
    }

    #[test]
    fn rejects_unknown_or_malformed_tags() {
        let registry = LanguageRegistry::new();
        assert!(registry.normalize("").is_none());
        assert!(registry.normalize("qq").is_none());
        assert!(registry.normalize("en-").is_none());
        assert!(registry.normalize("en-US-GB").is_none());
        assert!(registry.normalize("en-x").is_none());
        assert!(registry.normalize("english").is_none());
    }

    #[test]
    fn registry_can_be_extended() {
        let registry = LanguageRegistry::new().with_languages(["tlh"]);
        assert_eq!(registry.normalize("TLH").as_deref(), Some("tlh"));
    }
}
