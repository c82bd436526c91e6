//! `civgate-core`: organizational hierarchy and identifier primitives.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod error;
pub mod hierarchy;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use hierarchy::{NodeRef, OrgLevel, OrgNode};
pub use id::{AccountId, DepartmentId, MunicipalityId, SectorId, UnitId};
