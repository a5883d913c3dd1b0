pub mod indexer;
pub mod scheduler;
pub mod tasks;
