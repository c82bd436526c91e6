//! Postgres-backed organizational directory.
//!
//! Read-only: the administrative application owns these tables and the
//! authorization core only queries them.
//!
//! ## Expected schema
//!
//! | table | columns |
//! |-------|---------|
//! | `profiles` | `account_id` (pk), `role` text, `active`, `municipality_id?`, `department_id?`, `unit_id?`, `sector_id?` |
//! | `municipalities` | `id`, `name`, `active` |
//! | `departments` | `id`, `municipality_id`, `name`, `active` |
//! | `units` | `id`, `department_id`, `name`, `active` |
//! | `sectors` | `id`, `unit_id`, `name`, `active` |
//! | `department_modules` | `department_id`, `module_key`, `active`, `updated_at` |
//! | `municipality_modules` | `municipality_id`, `module_key`, `active`, `updated_at` |
//!
//! ## Error Mapping
//!
//! | SQLx Error | DirectoryError |
//! |------------|----------------|
//! | decode / column errors | `Corrupt` |
//! | anything else (pool closed, IO, database errors) | `Unavailable` |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use civgate_auth::{
    CatalogScope, DirectoryError, ModuleActivation, OrgDirectory, Profile, Role,
};
use civgate_core::{
    AccountId, DepartmentId, MunicipalityId, NodeRef, OrgLevel, OrgNode, SectorId, UnitId,
};

/// Postgres-backed [`OrgDirectory`].
///
/// Uses the SQLx connection pool, which is `Send + Sync` and cheap to clone.
#[derive(Debug, Clone)]
pub struct PostgresDirectory {
    pool: Arc<PgPool>,
}

impl PostgresDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait]
impl OrgDirectory for PostgresDirectory {
    #[instrument(skip(self), fields(account_id = %account), err)]
    async fn profile(&self, account: AccountId) -> Result<Option<Profile>, DirectoryError> {
        let row = sqlx::query(
            r#"
            SELECT
                account_id,
                role,
                active,
                municipality_id,
                department_id,
                unit_id,
                sector_id
            FROM profiles
            WHERE account_id = $1
            "#,
        )
        .bind(account.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_profile", e))?;

        row.map(|row| profile_from_row(&row)).transpose()
    }

    #[instrument(skip(self), fields(node = %node), err)]
    async fn node(&self, node: NodeRef) -> Result<Option<OrgNode>, DirectoryError> {
        let row = sqlx::query(&node_query(node.level()))
            .bind(node.uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_node", e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let name: String = row.try_get("name").map_err(|e| corrupt("node", e))?;
        let active: bool = row.try_get("active").map_err(|e| corrupt("node", e))?;
        let parent: Option<Uuid> = match node.level() {
            OrgLevel::Municipality => None,
            _ => Some(row.try_get("parent_id").map_err(|e| corrupt("node", e))?),
        };

        node_from_parts(node, parent, name, active).map(Some)
    }

    #[instrument(skip(self), fields(scope = %scope, rows = tracing::field::Empty), err)]
    async fn module_activations(
        &self,
        scope: CatalogScope,
    ) -> Result<Vec<ModuleActivation>, DirectoryError> {
        let (sql, id) = match scope {
            CatalogScope::Department(id) => (
                r#"
                SELECT module_key, active, updated_at
                FROM department_modules
                WHERE department_id = $1
                "#,
                *id.as_uuid(),
            ),
            CatalogScope::Municipality(id) => (
                r#"
                SELECT module_key, active, updated_at
                FROM municipality_modules
                WHERE municipality_id = $1
                "#,
                *id.as_uuid(),
            ),
        };

        let rows = sqlx::query(sql)
            .bind(id)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_module_catalog", e))?;

        let mut activations = Vec::with_capacity(rows.len());
        for row in rows {
            activations.push(ModuleActivation {
                scope,
                module: row
                    .try_get::<String, _>("module_key")
                    .map_err(|e| corrupt("module catalog", e))?,
                active: row.try_get("active").map_err(|e| corrupt("module catalog", e))?,
                updated_at: row
                    .try_get::<DateTime<Utc>, _>("updated_at")
                    .map_err(|e| corrupt("module catalog", e))?,
            });
        }

        tracing::Span::current().record("rows", activations.len());
        Ok(activations)
    }
}

fn profile_from_row(row: &PgRow) -> Result<Profile, DirectoryError> {
    let account_id: Uuid = row.try_get("account_id").map_err(|e| corrupt("profile", e))?;
    let role: String = row.try_get("role").map_err(|e| corrupt("profile", e))?;
    let get_id = |column: &str| -> Result<Option<Uuid>, DirectoryError> {
        row.try_get(column).map_err(|e| corrupt("profile", e))
    };

    let account_id = AccountId::from_uuid(account_id);
    Ok(Profile {
        account_id,
        role: parse_role(account_id, &role),
        active: row.try_get("active").map_err(|e| corrupt("profile", e))?,
        municipality_id: get_id("municipality_id")?.map(MunicipalityId::from_uuid),
        department_id: get_id("department_id")?.map(DepartmentId::from_uuid),
        unit_id: get_id("unit_id")?.map(UnitId::from_uuid),
        sector_id: get_id("sector_id")?.map(SectorId::from_uuid),
    })
}

/// Unknown role text is not corruption: the profile simply grants nothing.
fn parse_role(account: AccountId, raw: &str) -> Option<Role> {
    match raw.parse::<Role>() {
        Ok(role) => Some(role),
        Err(err) => {
            tracing::warn!(account_id = %account, %err, "profile role not recognised");
            None
        }
    }
}

fn node_query(level: OrgLevel) -> String {
    match level {
        OrgLevel::Municipality => {
            "SELECT id, name, active FROM municipalities WHERE id = $1".to_string()
        }
        OrgLevel::Department => node_query_with_parent("departments", "municipality_id"),
        OrgLevel::Unit => node_query_with_parent("units", "department_id"),
        OrgLevel::Sector => node_query_with_parent("sectors", "unit_id"),
    }
}

fn node_query_with_parent(table: &str, parent_column: &str) -> String {
    format!("SELECT id, name, active, {parent_column} AS parent_id FROM {table} WHERE id = $1")
}

fn node_from_parts(
    node: NodeRef,
    parent: Option<Uuid>,
    name: String,
    active: bool,
) -> Result<OrgNode, DirectoryError> {
    let org = match (node, node.level().parent_level()) {
        (NodeRef::Municipality(id), _) => OrgNode::municipality(id, name),
        (_, Some(parent_level)) => {
            let parent = parent.ok_or_else(|| {
                DirectoryError::Corrupt(format!("{node} has no parent link"))
            })?;
            OrgNode::child(node, NodeRef::from_parts(parent_level, parent), name)
                .map_err(|e| DirectoryError::Corrupt(e.to_string()))?
        }
        (_, None) => {
            return Err(DirectoryError::Corrupt(format!(
                "{node} has no parent level"
            )));
        }
    };

    Ok(if active { org } else { org.deactivated() })
}

fn corrupt(what: &str, err: sqlx::Error) -> DirectoryError {
    DirectoryError::Corrupt(format!("failed to decode {what} row: {err}"))
}

/// Map SQLx errors to directory errors.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> DirectoryError {
    match err {
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::ColumnNotFound(_) | sqlx::Error::Decode(_) => {
            DirectoryError::Corrupt(format!("decode error in {operation}: {err}"))
        }
        sqlx::Error::Database(db_err) => DirectoryError::Unavailable(format!(
            "database error in {operation}: {}",
            db_err.message()
        )),
        sqlx::Error::PoolClosed => {
            DirectoryError::Unavailable(format!("connection pool closed in {operation}"))
        }
        _ => DirectoryError::Unavailable(format!("sqlx error in {operation}: {err}")),
    }
}
