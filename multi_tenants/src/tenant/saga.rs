//! Bookkeeping for one provisioning attempt.
//!
//! Forward steps report a tagged [`StepFailure`] instead of unwinding, and
//! every step that leaves something behind registers the [`Compensation`]
//! that undoes it. The rollback coordinator replays that list backwards.

use crate::error::ProvisionError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    CreateSchema,
    ActivateContext,
    ApplyMigrations,
    SeedDefaults,
    RecordOwner,
    NotifyControlPlane,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::CreateSchema => "create_schema",
            Step::ActivateContext => "activate_context",
            Step::ApplyMigrations => "apply_migrations",
            Step::SeedDefaults => "seed_defaults",
            Step::RecordOwner => "record_owner",
            Step::NotifyControlPlane => "notify_control_plane",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compensation {
    DropSchema,
    DeleteMapping,
}

impl Compensation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Compensation::DropSchema => "drop_schema",
            Compensation::DeleteMapping => "delete_mapping",
        }
    }
}

impl fmt::Display for Compensation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub enum StepCause {
    /// The directory's uniqueness constraint rejected the owner.
    Conflict(String),
    Error(anyhow::Error),
}

#[derive(Debug)]
pub struct StepFailure {
    pub step: Step,
    pub cause: StepCause,
}

impl StepFailure {
    pub fn failed(step: Step, cause: anyhow::Error) -> Self {
        Self {
            step,
            cause: StepCause::Error(cause),
        }
    }

    pub fn conflict(step: Step, detail: impl Into<String>) -> Self {
        Self {
            step,
            cause: StepCause::Conflict(detail.into()),
        }
    }

    /// What the caller of `provision_new_tenant` gets to see.
    pub fn into_public_error(self) -> ProvisionError {
        match (self.step, self.cause) {
            (_, StepCause::Conflict(_)) => {
                ProvisionError::Conflict("user already belongs to an organization".into())
            }
            (Step::NotifyControlPlane, StepCause::Error(_)) => ProvisionError::Upstream,
            (_, StepCause::Error(_)) => ProvisionError::Provisioning,
        }
    }
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            StepCause::Conflict(detail) => write!(f, "{} conflicted: {}", self.step, detail),
            StepCause::Error(e) => write!(f, "{} failed: {:#}", self.step, e),
        }
    }
}

/// Why a saga stopped.
#[derive(Debug)]
pub enum SagaError {
    /// A precondition failed before any side effect.
    Rejected(ProvisionError),
    Step(StepFailure),
}

impl From<StepFailure> for SagaError {
    fn from(failure: StepFailure) -> Self {
        SagaError::Step(failure)
    }
}

/// In-memory record of one attempt. Never persisted.
#[derive(Debug)]
pub struct ProvisioningAttempt {
    tenant_id: String,
    completed: Vec<Step>,
    compensations: Vec<Compensation>,
}

impl ProvisioningAttempt {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            completed: Vec::new(),
            compensations: Vec::new(),
        }
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn complete(&mut self, step: Step) {
        tracing::info!("tenant {}: {} done", self.tenant_id, step);
        self.completed.push(step);
    }

    /// Register an undo action. Registering the same one twice is a no-op.
    pub fn register(&mut self, compensation: Compensation) {
        if !self.compensations.contains(&compensation) {
            self.compensations.push(compensation);
        }
    }

    pub fn completed(&self) -> &[Step] {
        &self.completed
    }

    /// Registered compensations, in registration order.
    pub fn compensations(&self) -> &[Compensation] {
        &self.compensations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_tracks_steps_and_dedups_compensations() {
        let mut attempt = ProvisioningAttempt::new("tenant_a");
        attempt.register(Compensation::DropSchema);
        attempt.complete(Step::CreateSchema);
        attempt.register(Compensation::DropSchema);
        attempt.register(Compensation::DeleteMapping);

        assert_eq!(attempt.tenant_id(), "tenant_a");
        assert_eq!(attempt.completed(), &[Step::CreateSchema]);
        assert_eq!(
            attempt.compensations(),
            &[Compensation::DropSchema, Compensation::DeleteMapping]
        );
    }

    #[test]
    fn public_error_hides_cause() {
        let failure = StepFailure::failed(
            Step::ApplyMigrations,
            anyhow::anyhow!("disk full at /var/lib/secret"),
        );
        let err = failure.into_public_error();
        assert!(matches!(err, ProvisionError::Provisioning));
        assert!(!err.to_string().contains("secret"));
    }

    #[test]
    fn public_error_for_conflict_and_upstream() {
        let conflict = StepFailure::conflict(Step::RecordOwner, "a@b.c already belongs").into_public_error();
        assert!(matches!(conflict, ProvisionError::Conflict(_)));

        let upstream = StepFailure::failed(Step::NotifyControlPlane, anyhow::anyhow!("500"))
            .into_public_error();
        assert!(matches!(upstream, ProvisionError::Upstream));
    }

    #[test]
    fn display_includes_step_and_cause_chain() {
        let cause = anyhow::anyhow!("root cause").context("while seeding");
        let failure = StepFailure::failed(Step::SeedDefaults, cause);
        let text = failure.to_string();
        assert!(text.starts_with("seed_defaults failed"));
        assert!(text.contains("root cause"));
    }
}
