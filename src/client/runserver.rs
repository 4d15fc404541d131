use std::path::PathBuf;

use chrono::Duration;
use clap::Args;

use crate::views;

use super::BackendConfig;
use super::SiteConfig;

#[derive(Args, Debug)]
#[command(about, long_about = "Launch the server")]
pub struct RunserverArgs {
    #[command(flatten)]
    site: SiteConfig,
    #[arg(long, env = "CASEBOOK_PORT", default_value_t = 8090)]
    pub(super) port: u16,
    #[arg(long, env = "CASEBOOK_ADDRESS", default_value_t = String::from("0.0.0.0"))]
    address: String,
    /// How long public pages serve content read from the store before reading it again, in seconds
    ///
    /// 0 reads the store on every request.
    #[arg(long, env = "CASEBOOK_REVALIDATE_SECONDS", default_value_t = 60)]
    pub(super) revalidate_seconds: u64,
    /// Restricts the admin session cookie to HTTPS. Disable only for local development.
    #[arg(long, env = "CASEBOOK_SECURE_COOKIES", default_value_t = true, action = clap::ArgAction::Set)]
    pub(super) secure_cookies: bool,
    /// YAML file mapping author keys to their name, role and avatar
    #[arg(long, env = "CASEBOOK_AUTHORS_FILE")]
    pub(super) authors_file: Option<PathBuf>,
    /// The timeout to use when performing the healthcheck, in milliseconds
    #[clap(long, env = "CASEBOOK_HEALTH_CHECK_TIMEOUT_MS", default_value_t = 1000)]
    health_check_timeout_ms: u64,
}

/// Create and run the server
pub async fn runserver(
    RunserverArgs {
        site,
        port,
        address,
        revalidate_seconds,
        secure_cookies,
        authors_file,
        health_check_timeout_ms,
    }: RunserverArgs,
    backend: BackendConfig,
    app_version: Option<String>,
) -> anyhow::Result<()> {
    let config = views::ServerConfig {
        port,
        address,
        health_check_timeout: Duration::milliseconds(health_check_timeout_ms as i64),
        backend: backend.into_connection_settings()?,
        site: site.into(),
        revalidate: std::time::Duration::from_secs(revalidate_seconds),
        secure_cookies,
        authors_file,
        app_version,
    };

    let server = views::Server::new(config).await?;
    Ok(server.start().await?)
}
