use anyhow::Context as _;
use anyhow::bail;
use backend_client::ConnectionSettings;
use clap::Args;
use url::Url;

/// Connection to the hosted backend serving the content store, object storage and auth
#[derive(Args, Debug, Clone)]
pub struct BackendConfig {
    #[arg(long, env = "BACKEND_URL")]
    pub backend_url: Url,
    /// Key used for public reads and sign in
    #[arg(long, env = "BACKEND_ANON_KEY", hide_env_values = true)]
    pub backend_anon_key: String,
    /// Key used for admin writes and uploads
    #[arg(long, env = "BACKEND_SERVICE_KEY", hide_env_values = true)]
    pub backend_service_key: String,
}

impl BackendConfig {
    pub fn into_connection_settings(self) -> anyhow::Result<ConnectionSettings> {
        let BackendConfig {
            backend_url,
            backend_anon_key,
            backend_service_key,
        } = self;
        for (name, value) in [
            ("BACKEND_ANON_KEY", &backend_anon_key),
            ("BACKEND_SERVICE_KEY", &backend_service_key),
        ] {
            if value.trim().is_empty() {
                bail!("{name} is set but empty, the backend cannot be reached without it");
            }
        }
        ConnectionSettings::new(backend_url, backend_anon_key, backend_service_key)
            .context("BACKEND_URL cannot be used as the base URL of the backend")
    }
}
