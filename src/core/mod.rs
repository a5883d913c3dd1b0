pub mod types;
pub mod config;
pub mod context;
pub mod error;
pub mod utils;
pub mod memory;
pub mod catalog;
pub mod manager;
