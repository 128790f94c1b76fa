//! In-memory collaborators with failure injection, for saga tests.

use crate::context;
use crate::control_plane::{ControlPlane, ControlPlaneError};
use crate::tenant::directory::{DirectoryError, TenantDirectory};
use crate::tenant::migrations::MigrationRunner;
use crate::tenant::schema::SchemaProvisioner;
use crate::tenant::seeder::DefaultSeeder;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Barrier, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    CreateSchema,
    CreateSchemaPanic,
    Migrations,
    MigrationsPanic,
    Seed,
    SeedPanic,
    RecordOwner,
    RecordOwnerPanic,
    OwnershipCheck,
    DropSchema,
    DeleteMapping,
}

/// Schema provisioner, migration runner, seeder and directory in one.
#[derive(Default)]
pub struct FakeDataPlane {
    schemas: Mutex<HashSet<String>>,
    /// email → tenant id
    mappings: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashSet<FailPoint>>,
    seen_context: Mutex<Vec<Option<String>>>,
    migration_barrier: Mutex<Option<Arc<Barrier>>>,
    /// When set, `email_owns_tenant` always answers `false`, so concurrent
    /// attempts all get past the advisory check.
    advisory_blind: Mutex<bool>,
}

impl FakeDataPlane {
    pub fn fail_at(&self, point: FailPoint) {
        self.failures.lock().unwrap().insert(point);
    }

    fn should_fail(&self, point: FailPoint) -> bool {
        self.failures.lock().unwrap().contains(&point)
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    /// Side-effecting calls, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn seed_tenant(&self, tenant_id: &str, email: &str) {
        self.schemas.lock().unwrap().insert(tenant_id.to_string());
        self.mappings
            .lock()
            .unwrap()
            .insert(email.to_string(), tenant_id.to_string());
    }

    pub fn has_schema(&self, tenant_id: &str) -> bool {
        self.schemas.lock().unwrap().contains(tenant_id)
    }

    pub fn schema_count(&self) -> usize {
        self.schemas.lock().unwrap().len()
    }

    pub fn mapping_for(&self, email: &str) -> Option<String> {
        self.mappings.lock().unwrap().get(email).cloned()
    }

    pub fn mapping_count(&self) -> usize {
        self.mappings.lock().unwrap().len()
    }

    /// Execution context observed by the seeder, one entry per call.
    pub fn seen_context(&self) -> Vec<Option<String>> {
        self.seen_context.lock().unwrap().clone()
    }

    pub fn hold_migrations_at(&self, barrier: Arc<Barrier>) {
        *self.migration_barrier.lock().unwrap() = Some(barrier);
    }

    pub fn blind_advisory_check(&self) {
        *self.advisory_blind.lock().unwrap() = true;
    }
}

impl SchemaProvisioner for FakeDataPlane {
    fn create_if_not_exists(&self, tenant_id: &str) -> anyhow::Result<bool> {
        self.record(format!("create_schema {}", tenant_id));
        if self.should_fail(FailPoint::CreateSchemaPanic) {
            panic!("injected create_schema panic");
        }
        if self.should_fail(FailPoint::CreateSchema) {
            anyhow::bail!("injected create_schema failure");
        }
        Ok(!self.schemas.lock().unwrap().insert(tenant_id.to_string()))
    }

    fn drop_schema(&self, tenant_id: &str) -> anyhow::Result<()> {
        self.record(format!("drop_schema {}", tenant_id));
        if self.should_fail(FailPoint::DropSchema) {
            anyhow::bail!("injected drop_schema failure");
        }
        self.schemas.lock().unwrap().remove(tenant_id);
        Ok(())
    }
}

impl MigrationRunner for FakeDataPlane {
    fn apply_migrations(&self, tenant_id: &str) -> anyhow::Result<()> {
        self.record(format!("migrate {}", tenant_id));
        let barrier = self.migration_barrier.lock().unwrap().clone();
        if let Some(barrier) = barrier {
            barrier.wait();
        }
        if self.should_fail(FailPoint::MigrationsPanic) {
            panic!("injected migration panic");
        }
        if self.should_fail(FailPoint::Migrations) {
            anyhow::bail!("injected migration failure");
        }
        Ok(())
    }
}

impl DefaultSeeder for FakeDataPlane {
    fn seed_defaults(&self, tenant_id: &str) -> anyhow::Result<()> {
        self.record(format!("seed {}", tenant_id));
        self.seen_context
            .lock()
            .unwrap()
            .push(context::current_tenant_id());
        if self.should_fail(FailPoint::SeedPanic) {
            panic!("injected seeding panic");
        }
        if self.should_fail(FailPoint::Seed) {
            anyhow::bail!("injected seeding failure");
        }
        Ok(())
    }
}

impl TenantDirectory for FakeDataPlane {
    fn lookup_tenant_for_email(&self, email: &str) -> Result<String, DirectoryError> {
        self.mapping_for(email)
            .ok_or_else(|| DirectoryError::NotFound(email.to_string()))
    }

    fn email_owns_tenant(&self, email: &str) -> Result<bool, DirectoryError> {
        if self.should_fail(FailPoint::OwnershipCheck) {
            return Err(DirectoryError::Storage(anyhow::anyhow!(
                "injected ownership check failure"
            )));
        }
        if *self.advisory_blind.lock().unwrap() {
            return Ok(false);
        }
        Ok(self.mappings.lock().unwrap().contains_key(email))
    }

    fn record_owner(&self, tenant_id: &str, emails: &[String]) -> Result<(), DirectoryError> {
        self.record(format!("record_owner {}", tenant_id));
        if self.should_fail(FailPoint::RecordOwnerPanic) {
            panic!("injected record_owner panic");
        }
        if self.should_fail(FailPoint::RecordOwner) {
            return Err(DirectoryError::Storage(anyhow::anyhow!(
                "injected record_owner failure"
            )));
        }
        let mut mappings = self.mappings.lock().unwrap();
        if let Some(taken) = emails.iter().find(|e| mappings.contains_key(*e)) {
            return Err(DirectoryError::Conflict(format!(
                "{} already belongs to a tenant",
                taken
            )));
        }
        for email in emails {
            mappings.insert(email.clone(), tenant_id.to_string());
        }
        Ok(())
    }

    fn delete_mapping(&self, tenant_id: &str) -> Result<(), DirectoryError> {
        self.record(format!("delete_mapping {}", tenant_id));
        if self.should_fail(FailPoint::DeleteMapping) {
            return Err(DirectoryError::Storage(anyhow::anyhow!(
                "injected delete_mapping failure"
            )));
        }
        self.mappings
            .lock()
            .unwrap()
            .retain(|_, t| t.as_str() != tenant_id);
        Ok(())
    }
}

pub enum FakeResponse {
    Ok,
    Status(u16, &'static str),
    Hang(Duration),
    Panic,
}

pub struct FakeControlPlane {
    response: FakeResponse,
    notified: Mutex<Vec<(String, String)>>,
}

impl FakeControlPlane {
    pub fn new(response: FakeResponse) -> Self {
        Self {
            response,
            notified: Mutex::new(Vec::new()),
        }
    }

    pub fn notified(&self) -> Vec<(String, String)> {
        self.notified.lock().unwrap().clone()
    }
}

#[async_trait]
impl ControlPlane for FakeControlPlane {
    async fn notify_tenant_created(
        &self,
        tenant_id: &str,
        email: &str,
    ) -> Result<(), ControlPlaneError> {
        self.notified
            .lock()
            .unwrap()
            .push((tenant_id.to_string(), email.to_string()));
        match &self.response {
            FakeResponse::Ok => Ok(()),
            FakeResponse::Status(status, body) => Err(ControlPlaneError::Rejected {
                status: *status,
                body: body.to_string(),
            }),
            FakeResponse::Hang(d) => {
                tokio::time::sleep(*d).await;
                Ok(())
            }
            FakeResponse::Panic => panic!("injected control plane panic"),
        }
    }
}
