use crate::config::ControlPlaneConfig;
use crate::error::ProvisionError;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ControlPlaneError {
    #[error("control plane rejected tenant creation ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("control plane request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("control plane did not answer within {0:?}")]
    Timeout(Duration),
}

impl From<ControlPlaneError> for ProvisionError {
    fn from(_: ControlPlaneError) -> Self {
        ProvisionError::Upstream
    }
}

/// Remote registry of tenants.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Declare that `tenant_id`, owned by `email`, now exists. One attempt,
    /// no retries.
    async fn notify_tenant_created(
        &self,
        tenant_id: &str,
        email: &str,
    ) -> Result<(), ControlPlaneError>;
}

#[derive(Serialize)]
struct CreateTenantRequest<'a> {
    tenant_id: &'a str,
    email: &'a str,
}

pub struct ControlPlaneClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl ControlPlaneClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
        })
    }

    pub fn from_config(cfg: &ControlPlaneConfig) -> anyhow::Result<Self> {
        Self::new(
            &cfg.base_url,
            &cfg.api_key,
            Duration::from_secs(cfg.timeout_secs),
        )
    }
}

#[async_trait]
impl ControlPlane for ControlPlaneClient {
    async fn notify_tenant_created(
        &self,
        tenant_id: &str,
        email: &str,
    ) -> Result<(), ControlPlaneError> {
        let url = format!("{}/tenants/create", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .json(&CreateTenantRequest { tenant_id, email })
            .send()
            .await?;

        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            tracing::error!("Control plane tenant creation failed ({}): {}", status, body);
            return Err(ControlPlaneError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        tracing::info!("Control plane acknowledged tenant {}", tenant_id);
        Ok(())
    }
}
