pub mod core;
pub mod storage;
pub mod analysis;
pub mod index;
pub mod scoring;
pub mod search;
pub mod parallel;
pub mod transfer;

pub use crate::core::config::{BackendConfig, Config};
pub use crate::core::context::EngineContext;
pub use crate::core::error::{Error, ErrorKind, Result};
pub use crate::core::manager::{MemoryInfo, MemoryManager};
pub use crate::core::memory::Memory;
pub use crate::core::types::{Properties, Registry, TranslationUnit, UnitRecord, Variant};
pub use crate::parallel::tasks::{TaskId, TaskOutput, TaskStatus};
pub use crate::search::concordance::ConcordanceQuery;
pub use crate::search::fuzzy::SearchQuery;
pub use crate::search::results::Match;
pub use crate::storage::backend::StorageBackend;
pub use crate::transfer::export::ExportOptions;
pub use crate::transfer::import::ImportOptions;

/*
┌────────────────────────────────────────────────────────────────────────────────────────────┐
│                             TMSTORE STRUCT ARCHITECTURE                                     │
└────────────────────────────────────────────────────────────────────────────────────────────┘

┌─────────────────────────────────────── CORE LAYER ──────────────────────────────────────────┐
│                                                                                              │
│  ┌────────────────────────────────────────────────────────────────────────────────────┐    │
│  │                            struct MemoryManager                                     │    │
│  │  ┌──────────────────────────────────────────────────────────────────────────────┐ │    │
│  │  │ config: Config                      // Work dir, pool size, retention        │ │    │
│  │  │ context: Arc<EngineContext>         // Languages, id generator, user         │ │    │
│  │  │ catalog: Mutex<MemoryCatalog>       // memories.json                         │ │    │
│  │  │ open: Arc<OpenRegistry>             // Open memories with pins and leases    │ │    │
│  │  │ scheduler: TaskScheduler            // Background operations                 │ │    │
│  │  └──────────────────────────────────────────────────────────────────────────────┘ │    │
│  └────────────────────────────────────────────────────────────────────────────────────┘    │
│                                                                                              │
│  ┌──────────────────────────┐  ┌──────────────────────────┐  ┌─────────────────────────┐  │
│  │ struct Memory            │  │ struct TranslationUnit   │  │ struct Match            │  │
│  │ • name                   │  │ • id                     │  │ • source: Variant       │  │
│  │ • backend: Box<dyn       │  │ • properties             │  │ • target: Variant       │  │
│  │   StorageBackend>        │  │ • variants: lang ->      │  │ • similarity: 0..=100   │  │
│  │ • session (import)       │  │   Variant                │  │ • origin, properties    │  │
│  └──────────────────────────┘  └──────────────────────────┘  └─────────────────────────┘  │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌───────────────────────────────────── INDEXING LAYER ────────────────────────────────────────┐
│                                                                                              │
│  text ─> SeparatorTokenizer ─> NGramFilter (3 chars) ─> crc32 keys ─> posting (key, id)      │
│  text ─> lowercase ─> crc32 ─> exact bucket (hash, id)                                       │
│                                                                                              │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌────────────────────────────────────── SEARCH LAYER ─────────────────────────────────────────┐
│                                                                                              │
│  exact (100):  bucket candidates ─> compare real text ─> target variant?                     │
│  fuzzy (<100): postings ─> CandidateTally ─> CountBounds ─> similarity() ─> target variant?  │
│  concordance:  scan segments in id order ─> substring / full regex ─> load_unit              │
│                                                                                              │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────────── STORAGE LAYER ──────────────────────────────────────────┐
│                                                                                              │
│  trait StorageBackend                                                                        │
│  ├── EmbeddedBackend     .lock + units/ + registry/ + lang/<tag>/{segments,buckets,postings} │
│  │                       each a SortedMapFile: BTreeMap + Wal + lz4 Checkpoint               │
│  └── RelationalBackend   SQLite: tu, tuprop, tuv, registry, index_tables, fuzzy_<n>          │
│                                                                                              │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────────── PARALLEL LAYER ─────────────────────────────────────────┐
│                                                                                              │
│  ParallelIndexer   rayon: markup extraction + n-grams for import batches                     │
│  TaskScheduler     crossbeam bounded queue ─> worker threads ─> TaskStore (retention, TTL)   │
│                                                                                              │
└──────────────────────────────────────────────────────────────────────────────────────────────┘
*/
