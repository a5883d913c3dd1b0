pub mod token;
pub mod tokenizer;
pub mod ngram;
pub mod markup;
pub mod language;
