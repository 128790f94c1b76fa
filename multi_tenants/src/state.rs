use crate::config::PlatformConfig;
use crate::control_plane::ControlPlaneClient;
use crate::db::{self, pool::DbPool};
use crate::tenant::directory::SqliteDirectory;
use crate::tenant::migrations::SqliteMigrationRunner;
use crate::tenant::schema::SqlitePartitions;
use crate::tenant::seeder::SqliteSeeder;
use crate::tenant::{Collaborators, TenancySettings, TenantProvisioner};
use anyhow::Context;
use std::sync::Arc;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub config: PlatformConfig,
    pub db: Arc<DbPool>,
    pub partitions: Arc<SqlitePartitions>,
    pub provisioner: Arc<TenantProvisioner>,
}

impl AppState {
    /// Open the platform database, apply its migrations and wire the
    /// SQLite-backed collaborators behind a [`TenantProvisioner`].
    pub fn open(config: PlatformConfig, reader_count: usize) -> anyhow::Result<SharedState> {
        let db = Arc::new(
            DbPool::open(&config.database_path, reader_count).context("failed to open database")?,
        );
        db::run_migrations(&db).context("failed to run database migrations")?;

        std::fs::create_dir_all(&config.partitions_dir).with_context(|| {
            format!(
                "failed to create partitions dir: {}",
                config.partitions_dir.display()
            )
        })?;
        let partitions = Arc::new(SqlitePartitions::new(&config.partitions_dir));

        let control_plane = ControlPlaneClient::from_config(&config.control_plane)
            .context("failed to build control-plane client")?;

        let provisioner = TenantProvisioner::new(
            TenancySettings::from_config(&config),
            Collaborators {
                directory: Arc::new(SqliteDirectory::new(Arc::clone(&db))),
                schemas: partitions.clone(),
                migrations: Arc::new(SqliteMigrationRunner::new(Arc::clone(&partitions))),
                seeder: Arc::new(SqliteSeeder::new(
                    Arc::clone(&partitions),
                    config.default_keys.clone(),
                )),
                control_plane: Arc::new(control_plane),
            },
        )
        .with_audit(Arc::clone(&db));

        Ok(Arc::new(Self {
            config,
            db,
            partitions,
            provisioner: Arc::new(provisioner),
        }))
    }
}
