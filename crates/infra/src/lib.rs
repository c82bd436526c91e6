//! Infrastructure layer: Postgres directory, SQL scope filters, config.

pub mod config;
pub mod directory;
pub mod scope_query;

pub use config::{ConfigError, RouteSettings, Settings};
pub use directory::PostgresDirectory;
pub use scope_query::{ScopeColumns, ScopeQueryError, push_scope_filter};
