use crate::analysis::token::Token;

/// Word separators: whitespace and common punctuation. The hyphen is not a
/// separator so hyphenated terms stay whole.
pub const SEPARATORS: &[char] = &[
    ' ', '\u{00A0}', '\r', '\n', '\u{000C}', '\t', '\u{2028}', '\u{2029}', ',', '.', ';', '"', ':',
    '<', '>', '¿', '?', '¡', '!', '(', ')', '[', ']', '{', '}', '=', '+', '/', '*', '\u{00AB}',
    '\u{00BB}', '\u{201C}', '\u{201D}', '\u{201E}', '\u{FF00}',
];

pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<Token>;

    fn name(&self) -> &str;
}

/// Splits on [`SEPARATORS`], optionally lower-casing first.
#[derive(Debug, Clone)]
pub struct SeparatorTokenizer {
    pub lowercase: bool,
}

impl Default for SeparatorTokenizer {
    fn default() -> Self {
        SeparatorTokenizer { lowercase: true }
    }
}

impl Tokenizer for SeparatorTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        let text = if self.lowercase {
            text.to_lowercase()
        } else {
            text.to_string()
        };

        let mut tokens = Vec::new();
        let mut position = 0u32;
        let mut start: Option<usize> = None;

        for (offset, ch) in text.char_indices() {
            if SEPARATORS.contains(&ch) {
                if let Some(begin) = start.take() {
                    tokens.push(Token::new(text[begin..offset].to_string(), position, begin));
                    position += 1;
                }
            } else if start.is_none() {
                start = Some(offset);
            }
        }
        if let Some(begin) = start {
            tokens.push(Token::new(text[begin..].to_string(), position, begin));
        }

        tokens
    }

    fn name(&self) -> &str {
        "separator"
    }
}
