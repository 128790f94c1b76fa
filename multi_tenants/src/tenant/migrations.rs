use crate::db::apply_migrations;
use crate::tenant::schema::SqlitePartitions;
use anyhow::Context;
use std::sync::Arc;

const TENANT_MIGRATIONS: &[(&str, &str)] = &[
    ("001_providers", include_str!("migrations/001_providers.sql")),
    (
        "002_index_attempts",
        include_str!("migrations/002_index_attempts.sql"),
    ),
];

/// Applies structural migrations to one tenant's partition.
///
/// Blocking by nature. Async callers must run it on the blocking pool.
pub trait MigrationRunner: Send + Sync {
    fn apply_migrations(&self, tenant_id: &str) -> anyhow::Result<()>;
}

pub struct SqliteMigrationRunner {
    partitions: Arc<SqlitePartitions>,
}

impl SqliteMigrationRunner {
    pub fn new(partitions: Arc<SqlitePartitions>) -> Self {
        Self { partitions }
    }
}

impl MigrationRunner for SqliteMigrationRunner {
    fn apply_migrations(&self, tenant_id: &str) -> anyhow::Result<()> {
        let conn = self.partitions.open(tenant_id)?;
        apply_migrations(&conn, TENANT_MIGRATIONS, tenant_id)
            .with_context(|| format!("migrations failed for tenant {}", tenant_id))
    }
}
