use crate::tenant::allocator::validate_tenant_id;
use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Creates and destroys a tenant's isolated data partition.
pub trait SchemaProvisioner: Send + Sync {
    /// Create the partition unless it exists. Returns whether it already existed.
    fn create_if_not_exists(&self, tenant_id: &str) -> Result<bool>;

    /// Destroy the partition. Dropping a partition that does not exist is Ok.
    fn drop_schema(&self, tenant_id: &str) -> Result<()>;
}

/// Partitions stored as one SQLite database per tenant:
/// `{root}/{tenant_id}.db`.
pub struct SqlitePartitions {
    root: PathBuf,
}

impl SqlitePartitions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn partition_path(&self, tenant_id: &str) -> Result<PathBuf> {
        validate_tenant_id(tenant_id)?;
        Ok(self.root.join(format!("{}.db", tenant_id)))
    }

    /// Open an existing partition. Never creates one.
    pub fn open(&self, tenant_id: &str) -> Result<Connection> {
        let path = self.partition_path(tenant_id)?;
        if !path.exists() {
            bail!("partition for tenant {} does not exist", tenant_id);
        }
        let conn = Connection::open(&path)
            .with_context(|| format!("failed to open partition: {}", path.display()))?;
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(conn)
    }

    /// Tenant ids of every partition on disk.
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to list {}", self.root.display()))
            }
        };
        let mut ids = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("db") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("failed to remove {}", path.display())),
    }
}

impl SchemaProvisioner for SqlitePartitions {
    fn create_if_not_exists(&self, tenant_id: &str) -> Result<bool> {
        let path = self.partition_path(tenant_id)?;
        fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create dir: {}", self.root.display()))?;
        if path.exists() {
            return Ok(true);
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("failed to create partition: {}", path.display()))?;
        // Write the header page so the partition exists before any migration.
        conn.execute_batch("PRAGMA user_version = 1;")?;
        Ok(false)
    }

    fn drop_schema(&self, tenant_id: &str) -> Result<()> {
        let path = self.partition_path(tenant_id)?;
        remove_if_present(&path)?;
        for suffix in ["-journal", "-wal", "-shm"] {
            let mut sidecar = path.clone().into_os_string();
            sidecar.push(suffix);
            remove_if_present(Path::new(&sidecar))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_reports_prior_existence() {
        let dir = tempfile::tempdir().unwrap();
        let partitions = SqlitePartitions::new(dir.path().join("tenants"));

        assert!(!partitions.create_if_not_exists("tenant_a").unwrap());
        assert!(partitions.partition_path("tenant_a").unwrap().exists());
        assert!(partitions.create_if_not_exists("tenant_a").unwrap());
        assert_eq!(partitions.list().unwrap(), vec!["tenant_a".to_string()]);
    }

    #[test]
    fn drop_is_tolerant_of_missing_partition() {
        let dir = tempfile::tempdir().unwrap();
        let partitions = SqlitePartitions::new(dir.path());

        partitions.drop_schema("tenant_never_created").unwrap();

        partitions.create_if_not_exists("tenant_a").unwrap();
        partitions.drop_schema("tenant_a").unwrap();
        assert!(partitions.list().unwrap().is_empty());
        partitions.drop_schema("tenant_a").unwrap();
    }

    #[test]
    fn open_never_creates() {
        let dir = tempfile::tempdir().unwrap();
        let partitions = SqlitePartitions::new(dir.path());
        assert!(partitions.open("tenant_missing").is_err());
        assert!(!partitions.partition_path("tenant_missing").unwrap().exists());
    }

    #[test]
    fn invalid_ids_never_touch_disk() {
        let dir = tempfile::tempdir().unwrap();
        let partitions = SqlitePartitions::new(dir.path().join("tenants"));
        assert!(partitions.create_if_not_exists("../escape").is_err());
        assert!(partitions.drop_schema("../escape").is_err());
        assert!(!dir.path().join("escape.db").exists());
    }

    #[test]
    fn list_of_missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let partitions = SqlitePartitions::new(dir.path().join("nope"));
        assert!(partitions.list().unwrap().is_empty());
    }
}
