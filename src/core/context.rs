use crate::analysis::language::LanguageRegistry;
use crate::core::utils::IdGenerator;

/// Process-scoped state shared by every open memory.
///
/// Built once at startup and handed around behind an `Arc`. Construction loads
/// the language subtag registry; there is nothing to tear down.
#[derive(Debug)]
pub struct EngineContext {
    pub languages: LanguageRegistry,
    pub ids: IdGenerator,
    pub user: String,
}

impl EngineContext {
    pub fn new(languages: LanguageRegistry, user: impl Into<String>) -> Self {
        EngineContext {
            languages,
            ids: IdGenerator::new(),
            user: user.into(),
        }
    }

    /// Built-in languages, acting user taken from the environment.
    pub fn from_env() -> Self {
        let user = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string());
        EngineContext::new(LanguageRegistry::new(), user)
    }
}

impl Default for EngineContext {
    fn default() -> Self {
        EngineContext::from_env()
    }
}
