use anyhow::{bail, Result};

const MAX_TENANT_ID_LEN: usize = 128;

/// Allocate a new tenant id: `{prefix}{uuid-v4}`.
///
/// The prefix keeps tenant ids distinguishable from other identifier
/// namespaces (user ids, default schema names).
pub fn allocate_tenant_id(prefix: &str) -> String {
    format!("{}{}", prefix, uuid::Uuid::new_v4())
}

/// Reject ids that could escape the partitions directory or break SQL
/// identifiers: only ASCII alphanumerics, `_` and `-` are allowed.
pub fn validate_tenant_id(tenant_id: &str) -> Result<()> {
    if tenant_id.is_empty() {
        bail!("tenant id must not be empty");
    }
    if tenant_id.len() > MAX_TENANT_ID_LEN {
        bail!(
            "tenant id longer than {} chars: {}",
            MAX_TENANT_ID_LEN,
            tenant_id.len()
        );
    }
    if let Some(c) = tenant_id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        bail!("invalid character {:?} in tenant id {}", c, tenant_id);
    }
    Ok(())
}
