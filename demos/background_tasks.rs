/// Background task demo
///
/// Imports a generated batch, exports it again and polls task status
/// while the scheduler works.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tmstore::core::config::{BackendConfig, Config};
use tmstore::core::context::EngineContext;
use tmstore::core::manager::MemoryManager;
use tmstore::core::types::UnitRecord;
use tmstore::parallel::tasks::TaskStatus;
use tmstore::transfer::export::ExportOptions;
use tmstore::transfer::import::ImportOptions;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let work_dir = std::env::temp_dir().join(format!("tmstore-tasks-{}", std::process::id()));
    let config = Config {
        workers: 2,
        ..Config::with_work_dir(&work_dir)
    };
    let manager = MemoryManager::new(config, Arc::new(EngineContext::default()))?;

    let embedded = manager.create_memory(Some("embedded"), "Embedded", None)?;
    let relational = manager.create_memory(
        Some("relational"),
        "Relational",
        Some(BackendConfig::Relational { database: work_dir.join("relational.db") }),
    )?;

    let records: Vec<UnitRecord> = (0..5_000)
        .map(|i| {
            UnitRecord::new(format!("unit-{}", i))
                .with_variant("en", format!("Message number {} was delivered", i))
                .with_variant("fr", format!("Le message numéro {} a été livré", i))
        })
        .collect();

    let start = Instant::now();
    let tasks = vec![
        manager.import_records(&embedded, records.clone(), ImportOptions::default().with_project("Demo"))?,
        manager.import_records(&relational, records, ImportOptions::default().with_project("Demo"))?,
    ];

    for task in &tasks {
        loop {
            match manager.status(task)? {
                TaskStatus::Pending => std::thread::sleep(Duration::from_millis(50)),
                status => {
                    println!("Task {} finished after {:?}: {:?}", task, start.elapsed(), status);
                    break;
                }
            }
        }
    }

    let destination = work_dir.join("embedded.jsonl");
    let task = manager.export(&embedded, destination.clone(), ExportOptions::default())?;
    let status = manager.wait(&task, Duration::from_secs(30))?;
    println!("Export to {}: {:?}", destination.display(), status);

    for info in manager.list_memories() {
        println!("{} ({}) open={}", info.descriptor.name, info.descriptor.backend.type_name(), info.is_open);
    }

    drop(manager);
    std::fs::remove_dir_all(&work_dir)?;
    Ok(())
}
