mod backend_config;
pub mod healthcheck;
pub mod runserver;
mod site_config;
mod telemetry_config;

pub use backend_config::BackendConfig;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use healthcheck::HealthcheckArgs;
use runserver::RunserverArgs;
pub use site_config::SiteConfig;
pub use telemetry_config::TelemetryConfig;

#[derive(Parser, Debug)]
#[command(author, version)]
pub struct Client {
    #[command(flatten)]
    pub backend_config: BackendConfig,
    #[command(flatten)]
    pub telemetry_config: TelemetryConfig,
    #[arg(long, env, value_enum, default_value_t = Color::Auto)]
    pub color: Color,
    /// Casebook version, reported by the `/version` endpoint
    #[clap(long, env = "CASEBOOK_GIT_DESCRIBE")]
    pub app_version: Option<String>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(ValueEnum, Debug, Default, Clone)]
pub enum Color {
    Never,
    Always,
    #[default]
    Auto,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Runserver(Box<RunserverArgs>), // suppresses clippy lint about variant size
    #[command(about, long_about = "Checks that the backend answers")]
    Healthcheck(HealthcheckArgs),
}
