use crate::db::pool::DbPool;
use rusqlite::OptionalExtension;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("no tenant mapping for {0}")]
    NotFound(String),
    #[error("owner already mapped: {0}")]
    Conflict(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Owner email → tenant id mapping.
pub trait TenantDirectory: Send + Sync {
    fn lookup_tenant_for_email(&self, email: &str) -> Result<String, DirectoryError>;

    /// Advisory: a `false` here does not stop a concurrent attempt from
    /// mapping the same email first. `record_owner` is the real guard.
    fn email_owns_tenant(&self, email: &str) -> Result<bool, DirectoryError>;

    /// Map every email to `tenant_id` atomically. Fails with `Conflict` if
    /// any email is already mapped.
    fn record_owner(&self, tenant_id: &str, emails: &[String]) -> Result<(), DirectoryError>;

    fn delete_mapping(&self, tenant_id: &str) -> Result<(), DirectoryError>;
}

pub struct SqliteDirectory {
    db: Arc<DbPool>,
}

impl SqliteDirectory {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }
}

fn is_unique_violation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<rusqlite::Error>(),
        Some(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

impl TenantDirectory for SqliteDirectory {
    fn lookup_tenant_for_email(&self, email: &str) -> Result<String, DirectoryError> {
        let found: Option<String> = self.db.read(|conn| {
            Ok(conn
                .query_row(
                    "SELECT tenant_id FROM user_tenant_mapping WHERE email = ?1",
                    [email],
                    |row| row.get(0),
                )
                .optional()?)
        })?;
        found.ok_or_else(|| DirectoryError::NotFound(email.to_string()))
    }

    fn email_owns_tenant(&self, email: &str) -> Result<bool, DirectoryError> {
        let exists = self.db.read(|conn| {
            Ok(conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM user_tenant_mapping WHERE email = ?1)",
                [email],
                |row| row.get(0),
            )?)
        })?;
        Ok(exists)
    }

    fn record_owner(&self, tenant_id: &str, emails: &[String]) -> Result<(), DirectoryError> {
        let result = self.db.write(|conn| {
            let tx = conn.unchecked_transaction()?;
            for email in emails {
                tx.execute(
                    "INSERT INTO user_tenant_mapping (email, tenant_id) VALUES (?1, ?2)",
                    rusqlite::params![email, tenant_id],
                )?;
            }
            tx.commit()?;
            Ok(())
        });

        match result {
            Ok(()) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(DirectoryError::Conflict(format!(
                "{} already belongs to a tenant",
                emails.join(", ")
            ))),
            Err(e) => Err(DirectoryError::Storage(e)),
        }
    }

    fn delete_mapping(&self, tenant_id: &str) -> Result<(), DirectoryError> {
        self.db.write(|conn| {
            conn.execute(
                "DELETE FROM user_tenant_mapping WHERE tenant_id = ?1",
                [tenant_id],
            )?;
            Ok(())
        })?;
        Ok(())
    }
}
