use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct PlatformConfig {
    /// Multi-tenant deployments give every owner an isolated partition.
    /// Single-tenant deployments resolve everyone to `default_schema`.
    #[serde(default)]
    pub multi_tenant: bool,
    #[serde(default = "default_schema")]
    pub default_schema: String,
    #[serde(default = "default_tenant_id_prefix")]
    pub tenant_id_prefix: String,
    #[serde(default = "default_db_path")]
    pub database_path: PathBuf,
    #[serde(default = "default_partitions_dir")]
    pub partitions_dir: PathBuf,
    #[serde(default)]
    pub control_plane: ControlPlaneConfig,
    #[serde(default)]
    pub default_keys: DefaultKeysConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ControlPlaneConfig {
    #[serde(default = "default_control_plane_url")]
    pub base_url: String,
    /// Shared service key sent as a bearer token.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            base_url: default_control_plane_url(),
            api_key: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// API keys written into every new tenant's baseline provider rows.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DefaultKeysConfig {
    pub openai: Option<String>,
    pub anthropic: Option<String>,
    pub cohere: Option<String>,
}

// Default functions
fn default_schema() -> String {
    "public".into()
}
fn default_tenant_id_prefix() -> String {
    "tenant_".into()
}
fn default_db_path() -> PathBuf {
    PathBuf::from("data/platform.db")
}
fn default_partitions_dir() -> PathBuf {
    PathBuf::from("data/tenants")
}
fn default_control_plane_url() -> String {
    "http://localhost:8082".into()
}
fn default_timeout_secs() -> u64 {
    10
}

/// Load config from TOML file with env var overrides.
pub fn load(path: &str) -> anyhow::Result<PlatformConfig> {
    let content = if std::path::Path::new(path).exists() {
        std::fs::read_to_string(path)?
    } else {
        tracing::warn!("Config file not found at {}, using defaults", path);
        String::new()
    };

    let mut config: PlatformConfig = toml::from_str(&content)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

/// Env var overrides, looked up through `lookup` so tests do not have to
/// mutate the process environment.
fn apply_env_overrides<F>(config: &mut PlatformConfig, lookup: F) -> anyhow::Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("TENANTPLANE_MULTI_TENANT") {
        config.multi_tenant = parse_bool(&v)?;
    }
    if let Some(v) = lookup("TENANTPLANE_DB_PATH") {
        config.database_path = PathBuf::from(v);
    }
    if let Some(v) = lookup("TENANTPLANE_PARTITIONS_DIR") {
        config.partitions_dir = PathBuf::from(v);
    }
    if let Some(v) = lookup("TENANTPLANE_CONTROL_PLANE_URL") {
        config.control_plane.base_url = v;
    }
    if let Some(v) = lookup("TENANTPLANE_CONTROL_PLANE_API_KEY") {
        config.control_plane.api_key = v;
    }
    if let Some(v) = lookup("TENANTPLANE_OPENAI_DEFAULT_API_KEY") {
        config.default_keys.openai = Some(v);
    }
    if let Some(v) = lookup("TENANTPLANE_ANTHROPIC_DEFAULT_API_KEY") {
        config.default_keys.anthropic = Some(v);
    }
    if let Some(v) = lookup("TENANTPLANE_COHERE_DEFAULT_API_KEY") {
        config.default_keys.cohere = Some(v);
    }
    Ok(())
}

fn parse_bool(value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => anyhow::bail!("invalid boolean value: {}", other),
    }
}
