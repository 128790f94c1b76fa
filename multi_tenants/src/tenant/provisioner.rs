use crate::audit;
use crate::config::PlatformConfig;
use crate::context;
use crate::control_plane::{ControlPlane, ControlPlaneError};
use crate::db::pool::DbPool;
use crate::error::ProvisionError;
use crate::tenant::allocator;
use crate::tenant::directory::{DirectoryError, TenantDirectory};
use crate::tenant::migrations::MigrationRunner;
use crate::tenant::rollback::{RollbackCoordinator, RollbackReport};
use crate::tenant::saga::{Compensation, ProvisioningAttempt, SagaError, Step, StepFailure};
use crate::tenant::schema::SchemaProvisioner;
use crate::tenant::seeder::DefaultSeeder;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

#[derive(Debug, Clone)]
pub struct TenancySettings {
    pub multi_tenant: bool,
    pub default_schema: String,
    pub tenant_id_prefix: String,
    /// Upper bound on the control-plane step. Elapsing counts as a failed
    /// notification.
    pub notify_timeout: Duration,
}

impl TenancySettings {
    pub fn from_config(cfg: &PlatformConfig) -> Self {
        Self {
            multi_tenant: cfg.multi_tenant,
            default_schema: cfg.default_schema.clone(),
            tenant_id_prefix: cfg.tenant_id_prefix.clone(),
            notify_timeout: Duration::from_secs(cfg.control_plane.timeout_secs),
        }
    }
}

pub struct Collaborators {
    pub directory: Arc<dyn TenantDirectory>,
    pub schemas: Arc<dyn SchemaProvisioner>,
    pub migrations: Arc<dyn MigrationRunner>,
    pub seeder: Arc<dyn DefaultSeeder>,
    pub control_plane: Arc<dyn ControlPlane>,
}

/// Drives the provisioning saga for new tenant owners.
///
/// Shared as `Arc<TenantProvisioner>`: each saga runs on its own task so
/// that an abandoned caller cannot stop it between a forward step and its
/// compensation.
pub struct TenantProvisioner {
    settings: TenancySettings,
    directory: Arc<dyn TenantDirectory>,
    schemas: Arc<dyn SchemaProvisioner>,
    migrations: Arc<dyn MigrationRunner>,
    seeder: Arc<dyn DefaultSeeder>,
    control_plane: Arc<dyn ControlPlane>,
    rollback: RollbackCoordinator,
    audit_db: Option<Arc<DbPool>>,
}

impl TenantProvisioner {
    pub fn new(settings: TenancySettings, c: Collaborators) -> Self {
        let rollback = RollbackCoordinator::new(Arc::clone(&c.schemas), Arc::clone(&c.directory));
        Self {
            settings,
            directory: c.directory,
            schemas: c.schemas,
            migrations: c.migrations,
            seeder: c.seeder,
            control_plane: c.control_plane,
            rollback,
            audit_db: None,
        }
    }

    /// Record provisioning and rollback events in the platform audit log.
    pub fn with_audit(mut self, db: Arc<DbPool>) -> Self {
        self.audit_db = Some(db);
        self
    }

    /// Tenant id mapped to `email`, without provisioning.
    ///
    /// Single-tenant deployments always get the default schema. A mapping
    /// with an empty tenant id means the caller belongs to no tenant.
    pub fn lookup_tenant(&self, email: &str) -> Result<String, ProvisionError> {
        if !self.settings.multi_tenant {
            return Ok(self.settings.default_schema.clone());
        }
        match self.directory.lookup_tenant_for_email(email) {
            Ok(tenant_id) if tenant_id.is_empty() => Err(ProvisionError::Unauthorized(
                "user does not belong to an organization".into(),
            )),
            Ok(tenant_id) => Ok(tenant_id),
            Err(DirectoryError::NotFound(_)) => {
                Err(ProvisionError::NotFound("no such tenant".into()))
            }
            Err(e) => {
                tracing::error!("Tenant lookup failed for {}: {:#}", email, e);
                Err(ProvisionError::Provisioning)
            }
        }
    }

    /// Tenant id for `email`, provisioning a new tenant on first sight.
    ///
    /// Provisioning failures collapse into [`ProvisionError::Provisioning`];
    /// `Conflict` and `Unauthorized` keep their kind.
    pub async fn resolve_tenant(self: &Arc<Self>, email: &str) -> Result<String, ProvisionError> {
        match self.lookup_tenant(email) {
            Err(ProvisionError::NotFound(_)) => {}
            found => return found,
        }

        match self.provision_new_tenant(email).await {
            Ok(_) => {}
            Err(e @ (ProvisionError::Conflict(_) | ProvisionError::Unauthorized(_))) => {
                return Err(e)
            }
            Err(e) => {
                tracing::error!("Tenant provisioning failed for {}: {}", email, e);
                return Err(ProvisionError::Provisioning);
            }
        }

        self.lookup_tenant(email).map_err(|e| match e {
            ProvisionError::NotFound(_) => {
                ProvisionError::Unauthorized("user does not belong to an organization".into())
            }
            other => other,
        })
    }

    /// Allocate a tenant id and run the whole saga: data plane first, then
    /// the control plane. Any failure after the preconditions rolls back
    /// what this attempt created.
    ///
    /// The saga runs to completion or compensation even if the returned
    /// future is dropped.
    pub async fn provision_new_tenant(
        self: &Arc<Self>,
        email: &str,
    ) -> Result<String, ProvisionError> {
        let tenant_id = allocator::allocate_tenant_id(&self.settings.tenant_id_prefix);
        let span = tracing::info_span!("provision_tenant", tenant_id = %tenant_id);
        let this = Arc::clone(self);
        let email = email.to_string();

        let supervisor = tokio::spawn(this.supervise(tenant_id, email).instrument(span));
        match supervisor.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Provisioning supervisor failed: {}", e);
                Err(ProvisionError::Provisioning)
            }
        }
    }

    /// Runs the saga on its own task. A panic anywhere in it aborts that
    /// task and everything provisioning can create for the id is removed.
    async fn supervise(
        self: Arc<Self>,
        tenant_id: String,
        email: String,
    ) -> Result<String, ProvisionError> {
        let saga = {
            let this = Arc::clone(&self);
            let tenant_id = tenant_id.clone();
            let email = email.clone();
            tokio::spawn(
                async move { this.run_saga(&tenant_id, &email).await }.in_current_span(),
            )
        };

        match saga.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Provisioning of {} aborted: {}", tenant_id, e);
                let report = self.rollback.rollback(&tenant_id);
                let cause = serde_json::json!({ "aborted": e.to_string() });
                self.audit_rollback(&report, &email, cause);
                Err(ProvisionError::Provisioning)
            }
        }
    }

    async fn run_saga(&self, tenant_id: &str, email: &str) -> Result<String, ProvisionError> {
        let mut attempt = ProvisioningAttempt::new(tenant_id);

        let outcome = match self.provision_data_plane(&mut attempt, email).await {
            Ok(()) => self.notify_control_plane(&mut attempt, email).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                tracing::info!("Provisioned tenant {} for {}", tenant_id, email);
                if let Some(db) = &self.audit_db {
                    audit::log_tenant_event_best_effort(
                        db,
                        audit::TENANT_PROVISIONED,
                        tenant_id,
                        Some(email),
                        None,
                    );
                }
                Ok(tenant_id.to_string())
            }
            Err(SagaError::Rejected(e)) => {
                tracing::info!("Provisioning of {} for {} rejected: {}", tenant_id, email, e);
                Err(e)
            }
            Err(SagaError::Step(failure)) => {
                tracing::error!("Tenant provisioning failed for {}: {}", tenant_id, failure);
                let report = self.rollback.compensate(tenant_id, attempt.compensations());
                let completed: Vec<&str> = attempt.completed().iter().map(Step::as_str).collect();
                self.audit_rollback(
                    &report,
                    email,
                    serde_json::json!({
                        "failed_step": failure.step.as_str(),
                        "completed_steps": completed,
                    }),
                );
                Err(failure.into_public_error())
            }
        }
    }

    /// Create and prepare the tenant's partition and map its owner.
    ///
    /// Preconditions are checked before any side effect. The execution
    /// context is active from migrations through the owner mapping and is
    /// restored before this returns, whatever the outcome.
    pub async fn provision_data_plane(
        &self,
        attempt: &mut ProvisioningAttempt,
        email: &str,
    ) -> Result<(), SagaError> {
        if !self.settings.multi_tenant {
            return Err(SagaError::Rejected(ProvisionError::Unauthorized(
                "multi-tenancy is not enabled".into(),
            )));
        }
        match self.directory.email_owns_tenant(email) {
            Ok(false) => {}
            Ok(true) => {
                return Err(SagaError::Rejected(ProvisionError::Conflict(
                    "user already belongs to an organization".into(),
                )))
            }
            Err(e) => {
                tracing::error!("Ownership check failed for {}: {:#}", email, e);
                return Err(SagaError::Rejected(ProvisionError::Provisioning));
            }
        }

        let tenant_id = attempt.tenant_id().to_string();
        tracing::info!("Provisioning tenant: {}", tenant_id);

        match self.schemas.create_if_not_exists(&tenant_id) {
            Ok(true) => {
                // Not ours to drop on rollback.
                tracing::info!("Schema already exists for tenant {}", tenant_id);
            }
            Ok(false) => {
                attempt.register(Compensation::DropSchema);
                tracing::info!("Created schema for tenant {}", tenant_id);
            }
            Err(e) => {
                // A failed create can still leave a partial partition on disk.
                attempt.register(Compensation::DropSchema);
                return Err(StepFailure::failed(Step::CreateSchema, e).into());
            }
        }
        attempt.complete(Step::CreateSchema);

        context::scope(tenant_id, self.run_in_tenant_context(attempt, email)).await
    }

    async fn run_in_tenant_context(
        &self,
        attempt: &mut ProvisioningAttempt,
        email: &str,
    ) -> Result<(), SagaError> {
        attempt.complete(Step::ActivateContext);
        let tenant_id = attempt.tenant_id().to_string();

        let runner = Arc::clone(&self.migrations);
        let target = tenant_id.clone();
        tokio::task::spawn_blocking(move || runner.apply_migrations(&target))
            .await
            .map_err(|e| {
                StepFailure::failed(
                    Step::ApplyMigrations,
                    anyhow::anyhow!("migration task aborted: {}", e),
                )
            })?
            .map_err(|e| StepFailure::failed(Step::ApplyMigrations, e))?;
        attempt.complete(Step::ApplyMigrations);

        self.seeder
            .seed_defaults(&tenant_id)
            .map_err(|e| StepFailure::failed(Step::SeedDefaults, e))?;
        attempt.complete(Step::SeedDefaults);

        match self.directory.record_owner(&tenant_id, &[email.to_string()]) {
            Ok(()) => {}
            Err(DirectoryError::Conflict(detail)) => {
                return Err(StepFailure::conflict(Step::RecordOwner, detail).into())
            }
            Err(e) => return Err(StepFailure::failed(Step::RecordOwner, e.into()).into()),
        }
        attempt.register(Compensation::DeleteMapping);
        attempt.complete(Step::RecordOwner);
        Ok(())
    }

    async fn notify_control_plane(
        &self,
        attempt: &mut ProvisioningAttempt,
        email: &str,
    ) -> Result<(), SagaError> {
        let tenant_id = attempt.tenant_id().to_string();
        let timeout = self.settings.notify_timeout;

        let result = match tokio::time::timeout(
            timeout,
            self.control_plane.notify_tenant_created(&tenant_id, email),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ControlPlaneError::Timeout(timeout)),
        };
        result.map_err(|e| StepFailure::failed(Step::NotifyControlPlane, e.into()))?;

        attempt.complete(Step::NotifyControlPlane);
        Ok(())
    }

    /// Best-effort removal of everything provisioning creates for
    /// `tenant_id`. Never fails; problems are in the report.
    pub fn rollback(&self, tenant_id: &str) -> RollbackReport {
        let report = self.rollback.rollback(tenant_id);
        if let Some(db) = &self.audit_db {
            let details = report.to_json().to_string();
            audit::log_tenant_event_best_effort(
                db,
                audit::TENANT_ROLLED_BACK,
                tenant_id,
                None,
                Some(&details),
            );
        }
        report
    }

    fn audit_rollback(&self, report: &RollbackReport, email: &str, cause: serde_json::Value) {
        let Some(db) = &self.audit_db else {
            return;
        };
        let mut details = report.to_json();
        details["cause"] = cause;
        audit::log_tenant_event_best_effort(
            db,
            audit::TENANT_ROLLED_BACK,
            &report.tenant_id,
            Some(email),
            Some(&details.to_string()),
        );
    }
}
