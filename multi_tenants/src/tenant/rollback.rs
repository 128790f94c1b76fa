use crate::tenant::directory::TenantDirectory;
use crate::tenant::saga::Compensation;
use crate::tenant::schema::SchemaProvisioner;
use std::sync::Arc;

/// A compensation that itself failed. Logged, never propagated.
#[derive(Debug, Clone)]
pub struct RollbackWarning {
    pub compensation: Compensation,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct RollbackReport {
    pub tenant_id: String,
    pub undone: Vec<Compensation>,
    pub warnings: Vec<RollbackWarning>,
}

impl RollbackReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "undone": self.undone.iter().map(|c| c.as_str()).collect::<Vec<_>>(),
            "warnings": self
                .warnings
                .iter()
                .map(|w| serde_json::json!({ "compensation": w.compensation.as_str(), "error": w.message }))
                .collect::<Vec<_>>(),
        })
    }
}

/// Best-effort undo of a tenant's data-plane side effects.
///
/// Every compensation is attempted even if an earlier one failed, and
/// nothing here returns an error. A failed undo is reported in the
/// [`RollbackReport`] and leaves an orphan for manual cleanup.
pub struct RollbackCoordinator {
    schemas: Arc<dyn SchemaProvisioner>,
    directory: Arc<dyn TenantDirectory>,
}

impl RollbackCoordinator {
    pub fn new(schemas: Arc<dyn SchemaProvisioner>, directory: Arc<dyn TenantDirectory>) -> Self {
        Self { schemas, directory }
    }

    /// Undo everything provisioning could have created for `tenant_id`.
    pub fn rollback(&self, tenant_id: &str) -> RollbackReport {
        self.compensate(
            tenant_id,
            &[Compensation::DropSchema, Compensation::DeleteMapping],
        )
    }

    /// Run `compensations` in reverse registration order.
    pub fn compensate(&self, tenant_id: &str, compensations: &[Compensation]) -> RollbackReport {
        tracing::info!("Rolling back tenant provisioning for tenant_id: {}", tenant_id);
        let mut report = RollbackReport {
            tenant_id: tenant_id.to_string(),
            undone: Vec::new(),
            warnings: Vec::new(),
        };

        for compensation in compensations.iter().rev() {
            let result = match compensation {
                Compensation::DeleteMapping => self
                    .directory
                    .delete_mapping(tenant_id)
                    .map_err(anyhow::Error::from),
                Compensation::DropSchema => self.schemas.drop_schema(tenant_id),
            };
            match result {
                Ok(()) => report.undone.push(*compensation),
                Err(e) => {
                    tracing::warn!(
                        "rollback step {} failed for tenant {}: {:#}",
                        compensation,
                        tenant_id,
                        e
                    );
                    report.warnings.push(RollbackWarning {
                        compensation: *compensation,
                        message: format!("{:#}", e),
                    });
                }
            }
        }

        if !report.is_clean() {
            tracing::error!(
                "Rollback of tenant {} incomplete ({} of {} compensations failed); manual cleanup required",
                tenant_id,
                report.warnings.len(),
                compensations.len()
            );
        }
        report
    }
}
