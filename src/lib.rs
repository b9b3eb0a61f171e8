pub mod cache;
pub mod config;
pub mod discovery;
pub mod environments;
pub mod error;
pub mod executor;
pub mod models;
pub mod normalize;
pub mod parsers;
pub mod reporting;
pub mod security;
pub mod tools;
pub mod validator;

// Re-export commonly used items
pub use cache::{CacheStats, PerformanceManager, RunKind, RunMetrics};
pub use config::Config;
pub use discovery::CollectionDiscoverer;
pub use environments::EnvironmentResolver;
pub use error::{BrunoError, ConfigError, Result};
pub use executor::RequestExecutor;
pub use models::*;
pub use parsers::BruFileParser;
pub use tools::BrunoTools;
pub use validator::CollectionValidator;
