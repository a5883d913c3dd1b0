use std::collections::BTreeSet;
use crate::analysis::token::Token;
use crate::analysis::tokenizer::{SeparatorTokenizer, Tokenizer};

pub const NGRAM_SIZE: usize = 3;

/// Cuts words into consecutive, non-overlapping grams. The last gram of a
/// word may be shorter than `size`.
#[derive(Debug, Clone)]
pub struct NGramFilter {
    pub size: usize,
}

impl Default for NGramFilter {
    fn default() -> Self {
        NGramFilter { size: NGRAM_SIZE }
    }
}

impl NGramFilter {
    pub fn new(size: usize) -> Self {
        NGramFilter { size: size.max(1) }
    }

    pub fn grams(&self, token: &Token) -> Vec<String> {
        let chars: Vec<char> = token.text.chars().collect();
        chars
            .chunks(self.size)
            .map(|chunk| chunk.iter().collect())
            .collect()
    }
}

/// Maps a gram to its index key. Collisions only widen the candidate set.
pub fn gram_key(gram: &str) -> u32 {
    crc32fast::hash(gram.as_bytes())
}

/// Distinct n-gram keys of a text, in ascending order.
pub fn ngram_keys(text: &str) -> BTreeSet<u32> {
    let tokenizer = SeparatorTokenizer::default();
    let filter = NGramFilter::default();

    tokenizer
        .tokenize(text)
        .iter()
        .flat_map(|token| filter.grams(token))
        .map(|gram| gram_key(&gram))
        .collect()
}

/// Exact-match bucket of a plain text. Case-insensitive and deliberately
/// narrow: callers must re-compare the real text.
pub fn text_hash(text: &str) -> u32 {
    crc32fast::hash(text.to_lowercase().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grams_are_consecutive_slices() {
        let token = Token::new("translation".to_string(), 0, 0);
        assert_eq!(NGramFilter::default().grams(&token), vec!["tra", "nsl", "ati", "on"]);
    }

    #[test]
    fn short_word_is_one_gram() {
        let token = Token::new("é".to_string(), 0, 0);
        assert_eq!(NGramFilter::default().grams(&token), vec!["é"]);
    }

    #[test]
    fn keys_are_deterministic_and_case_insensitive() {
        let a = ngram_keys("Hello World");
        let b = ngram_keys("hello world");
        assert_eq!(a, b);
        assert_eq!(a, ngram_keys("Hello World"));
    }

    #[test]
    fn keys_ignore_word_order_and_duplicates() {
        assert_eq!(ngram_keys("world hello"), ngram_keys("hello world hello"));
        // hel, lo, wor, ld
        assert_eq!(ngram_keys("hello world").len(), 4);
    }

    #[test]
    fn blank_text_has_no_keys() {
        assert!(ngram_keys("  ... ").is_empty());
    }

    #[test]
    fn text_hash_folds_case() {
        assert_eq!(text_hash("Hello World"), text_hash("hello world"));
        assert_ne!(text_hash("hello world"), text_hash("hello there"));
    }
}
