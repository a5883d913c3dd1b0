pub mod concordance;
pub mod fuzzy;
pub mod results;
