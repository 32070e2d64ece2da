use anyhow::Context;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Missing required credentials abort here, before anything binds
    let cfg = provost::config::Config::from_env()?;

    // Init logging; an unknown level name is also fatal at startup
    let filter = EnvFilter::try_new(&cfg.log_level)
        .with_context(|| format!("invalid log level: {}", cfg.log_level))?;
    fmt().with_env_filter(filter).init();

    info!(
        target: "init",
        "provost starting: bind={}, cosign={}, ldap={}, realm={}",
        cfg.address, cfg.cosign_url, cfg.ldap_url, cfg.accepted_realm
    );

    provost::server::run(cfg).await
}
