use crate::config::DefaultKeysConfig;
use crate::tenant::schema::SqlitePartitions;
use anyhow::Context;
use std::sync::Arc;

/// Writes baseline configuration rows into a tenant's partition.
///
/// Implementations must upsert: calling twice leaves the same state as
/// calling once.
pub trait DefaultSeeder: Send + Sync {
    fn seed_defaults(&self, tenant_id: &str) -> anyhow::Result<()>;
}

pub struct DefaultLlmProvider {
    pub name: &'static str,
    pub provider: &'static str,
    pub default_model_name: &'static str,
    pub is_default: bool,
}

pub const DEFAULT_LLM_PROVIDERS: &[DefaultLlmProvider] = &[
    DefaultLlmProvider {
        name: "OpenAI",
        provider: "openai",
        default_model_name: "gpt-4o",
        is_default: true,
    },
    DefaultLlmProvider {
        name: "Anthropic",
        provider: "anthropic",
        default_model_name: "claude-3-5-sonnet-20240620",
        is_default: false,
    },
];

pub const DEFAULT_EMBEDDING_PROVIDER: &str = "cohere";

pub struct SqliteSeeder {
    partitions: Arc<SqlitePartitions>,
    keys: DefaultKeysConfig,
}

impl SqliteSeeder {
    pub fn new(partitions: Arc<SqlitePartitions>, keys: DefaultKeysConfig) -> Self {
        Self { partitions, keys }
    }

    fn key_for(&self, provider: &str) -> Option<&str> {
        match provider {
            "openai" => self.keys.openai.as_deref(),
            "anthropic" => self.keys.anthropic.as_deref(),
            "cohere" => self.keys.cohere.as_deref(),
            _ => None,
        }
    }
}

impl DefaultSeeder for SqliteSeeder {
    fn seed_defaults(&self, tenant_id: &str) -> anyhow::Result<()> {
        let conn = self.partitions.open(tenant_id)?;
        let tx = conn.unchecked_transaction()?;

        for p in DEFAULT_LLM_PROVIDERS {
            tx.execute(
                "INSERT INTO llm_provider
                    (name, provider, api_key, default_model_name, is_default_provider)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(name) DO UPDATE SET
                    provider = excluded.provider,
                    api_key = excluded.api_key,
                    default_model_name = excluded.default_model_name,
                    is_default_provider = excluded.is_default_provider,
                    updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')",
                rusqlite::params![
                    p.name,
                    p.provider,
                    self.key_for(p.provider),
                    p.default_model_name,
                    p.is_default,
                ],
            )
            .with_context(|| format!("failed to upsert LLM provider {}", p.name))?;
        }

        tx.execute(
            "INSERT INTO cloud_embedding_provider (provider_type, api_key)
             VALUES (?1, ?2)
             ON CONFLICT(provider_type) DO UPDATE SET
                api_key = excluded.api_key,
                updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')",
            rusqlite::params![
                DEFAULT_EMBEDDING_PROVIDER,
                self.key_for(DEFAULT_EMBEDDING_PROVIDER)
            ],
        )
        .context("failed to upsert cloud embedding provider")?;

        tx.commit()?;
        tracing::info!("seeded default providers for tenant {}", tenant_id);
        Ok(())
    }
}
