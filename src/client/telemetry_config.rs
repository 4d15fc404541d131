use anyhow::Context as _;
use clap::Args;
use clap::ValueEnum;
use common::tracing::Telemetry;
use educe::Educe;
use opentelemetry_otlp::WithExportConfig as _;
use url::Url;

/// Export of the service spans to an OpenTelemetry collector
#[derive(Args, Debug, Educe, Clone)]
#[educe(Default)]
pub struct TelemetryConfig {
    #[educe(Default = TelemetryKind::None)]
    #[clap(long, env, default_value_t)]
    pub telemetry_kind: TelemetryKind,
    /// Name the exported spans are reported under
    #[educe(Default = "casebook".into())]
    #[clap(long, env, default_value = "casebook")]
    pub service_name: String,
    #[educe(Default = Url::parse("http://localhost:4317").unwrap())]
    #[arg(long, env, default_value = "http://localhost:4317")]
    pub telemetry_endpoint: Url,
}

impl TelemetryConfig {
    /// `None` when spans are only logged
    pub fn telemetry(&self) -> Option<Telemetry> {
        match self.telemetry_kind {
            TelemetryKind::None => None,
            TelemetryKind::Opentelemetry => Some(Telemetry {
                service_name: self.service_name.clone(),
            }),
        }
    }

    /// OTLP exporter sending spans to [TelemetryConfig::telemetry_endpoint] over gRPC
    pub fn span_exporter(&self) -> anyhow::Result<opentelemetry_otlp::SpanExporter> {
        opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(self.telemetry_endpoint.as_str())
            .build()
            .with_context(|| {
                format!(
                    "cannot build a span exporter for '{}'",
                    self.telemetry_endpoint
                )
            })
    }
}

#[derive(Default, ValueEnum, Debug, Clone, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum TelemetryKind {
    #[default]
    None,
    Opentelemetry,
}
