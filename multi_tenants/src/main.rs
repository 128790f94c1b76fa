use anyhow::Context;
use clap::{Parser, Subcommand};
use tenantplane::{config, state::AppState};
use tracing::info;

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "tenantplane",
    about = "Tenant provisioning for the multi-tenant data plane",
    version
)]
struct Cli {
    /// Path to TOML config file
    #[arg(short, long, default_value = "platform.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create data directories and apply platform database migrations
    Bootstrap,
    /// Print the tenant mapped to an email without provisioning
    Lookup {
        #[arg(long)]
        email: String,
    },
    /// Resolve the tenant for an email, provisioning one on first sight
    Resolve {
        #[arg(long)]
        email: String,
    },
    /// Remove a tenant's partition and owner mappings
    Rollback {
        #[arg(long)]
        tenant_id: String,
    },
}

// ── Entry point ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging from RUST_LOG (default: info)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tenantplane=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load(&cli.config)?;

    match cli.command {
        Commands::Bootstrap => bootstrap(cfg),
        Commands::Lookup { email } => lookup(cfg, &email),
        Commands::Resolve { email } => resolve(cfg, &email).await,
        Commands::Rollback { tenant_id } => rollback(cfg, &tenant_id),
    }
}

// ── Bootstrap ──────────────────────────────────────────────────────────────

fn bootstrap(cfg: config::PlatformConfig) -> anyhow::Result<()> {
    info!("Starting bootstrap...");
    let state = AppState::open(cfg, 1).context("bootstrap failed")?;
    info!(
        "Database ready at {}, partitions under {}",
        state.config.database_path.display(),
        state.config.partitions_dir.display()
    );
    if !state.config.multi_tenant {
        info!(
            "Multi-tenancy disabled; all users resolve to '{}'",
            state.config.default_schema
        );
    }
    info!("Bootstrap complete.");
    Ok(())
}

// ── Lookup ─────────────────────────────────────────────────────────────────

fn lookup(cfg: config::PlatformConfig, email: &str) -> anyhow::Result<()> {
    let state = AppState::open(cfg, 1)?;
    match state.provisioner.lookup_tenant(email) {
        Ok(tenant_id) => {
            println!("{}", tenant_id);
            Ok(())
        }
        Err(e) => anyhow::bail!("no tenant for {}: {}", email, e),
    }
}

// ── Resolve ────────────────────────────────────────────────────────────────

async fn resolve(cfg: config::PlatformConfig, email: &str) -> anyhow::Result<()> {
    let state = AppState::open(cfg, 2)?;
    match state.provisioner.resolve_tenant(email).await {
        Ok(tenant_id) => {
            println!("{}", tenant_id);
            Ok(())
        }
        Err(e) => anyhow::bail!("could not resolve tenant for {}: {}", email, e),
    }
}

// ── Rollback ───────────────────────────────────────────────────────────────

fn rollback(cfg: config::PlatformConfig, tenant_id: &str) -> anyhow::Result<()> {
    tenantplane::tenant::allocator::validate_tenant_id(tenant_id)?;
    let state = AppState::open(cfg, 1)?;
    let report = state.provisioner.rollback(tenant_id);
    println!("{}", serde_json::to_string_pretty(&report.to_json())?);
    if !report.is_clean() {
        anyhow::bail!(
            "rollback of {} incomplete; manual cleanup required",
            tenant_id
        );
    }
    info!("Rolled back tenant {}", tenant_id);
    Ok(())
}
