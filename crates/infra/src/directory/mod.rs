//! Storage adapters for the authorization directory port.

pub mod postgres;

pub use postgres::PostgresDirectory;
