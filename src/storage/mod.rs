pub mod backend;
pub mod checkpoint;
pub mod embedded;
pub mod file_lock;
pub mod layout;
pub mod relational;
pub mod sorted_map;
pub mod wal;
