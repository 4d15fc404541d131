use anyhow::anyhow;
use backend_client::BackendClient;
use chrono::Duration;
use clap::Args;

use crate::views;

use super::BackendConfig;

#[derive(Args, Debug)]
pub struct HealthcheckArgs {
    /// The timeout to use when performing the healthcheck, in milliseconds
    #[clap(long, env = "CASEBOOK_HEALTH_CHECK_TIMEOUT_MS", default_value_t = 1000)]
    health_check_timeout_ms: u64,
}

pub async fn healthcheck_cmd(
    HealthcheckArgs {
        health_check_timeout_ms,
    }: HealthcheckArgs,
    backend_config: BackendConfig,
) -> anyhow::Result<()> {
    let backend = BackendClient::new(backend_config.into_connection_settings()?);

    views::check_health(
        &backend,
        Duration::milliseconds(health_check_timeout_ms as i64),
    )
    .await
    .map_err(|e| anyhow!("healthcheck failed: {e}"))?;

    tracing::info!("✅ Healthcheck passed");
    Ok(())
}
