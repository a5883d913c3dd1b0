/// tmstore API demo
///
/// Creates a memory, stores a few units and runs the three kinds of lookup:
/// - exact search
/// - fuzzy search
/// - concordance

use std::sync::Arc;
use tmstore::core::config::Config;
use tmstore::core::context::EngineContext;
use tmstore::core::manager::MemoryManager;
use tmstore::core::types::UnitRecord;
use tmstore::parallel::tasks::{TaskOutput, TaskStatus};
use tmstore::search::concordance::ConcordanceQuery;
use tmstore::search::fuzzy::SearchQuery;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let work_dir = std::env::temp_dir().join("tmstore-demo");
    let manager = MemoryManager::new(Config::with_work_dir(&work_dir), Arc::new(EngineContext::default()))?;

    // Step 1: create a memory (or reuse it from a previous run)
    let id = "demo";
    if manager.list_memories().iter().all(|info| info.descriptor.id != id) {
        manager.create_memory(Some(id), "Demo memory", None)?;
    }

    // Step 2: store units
    let units = [
        ("1", "Save the file", "Datei speichern"),
        ("2", "Save the file as", "Datei speichern unter"),
        ("3", "Open the settings", "Einstellungen öffnen"),
        ("4", "Close the file", "Datei schließen"),
    ];
    for (unit_id, en, de) in units {
        manager.store_unit(id, UnitRecord::new(unit_id).with_variant("en", en).with_variant("de-de", de))?;
    }
    println!("Stored {} units\n", units.len());

    // Step 3: exact and fuzzy search
    for min_similarity in [100, 60] {
        let query = SearchQuery::new("Save the file", "en", "de-DE").with_min_similarity(min_similarity);
        let task = manager.search(id, query)?;
        if let TaskStatus::Completed(TaskOutput::Matches(matches)) =
            manager.wait(&task, std::time::Duration::from_secs(5))?
        {
            println!("Matches at {}%:", min_similarity);
            for m in matches {
                println!("  {:>3}%  {}  =>  {}", m.similarity, m.source.plain_text, m.target.plain_text);
            }
            println!();
        }
    }

    // Step 4: concordance
    let task = manager.concordance(id, ConcordanceQuery::new("file", "en").with_limit(10))?;
    if let TaskStatus::Completed(TaskOutput::Units(units)) = manager.wait(&task, std::time::Duration::from_secs(5))? {
        println!("Units containing 'file':");
        for unit in units {
            if let Some(variant) = unit.variant("en") {
                println!("  [{}] {}", unit.id, variant.plain_text);
            }
        }
    }

    Ok(())
}
