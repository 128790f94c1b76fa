//! Task-scoped "current tenant" context.
//!
//! The value lives in a tokio task-local, so it follows the task across
//! worker threads at await points and is invisible to every other task.
//! It only exists inside [`scope`]; leaving the scope restores whatever was
//! there before, on normal return, error, panic or cancellation alike.
//! Blocking-pool closures do not inherit task-locals, so work sent to
//! `spawn_blocking` must receive the tenant id explicitly.

use std::future::Future;

tokio::task_local! {
    static CURRENT_TENANT_ID: String;
}

/// Run `fut` with `tenant_id` as the current tenant.
pub async fn scope<F>(tenant_id: impl Into<String>, fut: F) -> F::Output
where
    F: Future,
{
    CURRENT_TENANT_ID.scope(tenant_id.into(), fut).await
}

/// The tenant the running task is scoped to, if any.
pub fn current_tenant_id() -> Option<String> {
    CURRENT_TENANT_ID.try_with(|id| id.clone()).ok()
}
