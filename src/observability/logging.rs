use opentelemetry::{global, trace::TracerProvider as _, KeyValue};
use opentelemetry_otlp::{WithExportConfig, SpanExporter};
use opentelemetry_sdk::{
    resource::Resource,
    runtime,
    trace::{span_processor_with_async_runtime::BatchSpanProcessor, SdkTracerProvider},
};
use opentelemetry_semantic_conventions::resource::{SERVICE_NAME, SERVICE_VERSION};
use thiserror::Error;
use tracing::{Metadata, Subscriber};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, time::UtcTime},
    layer::{Context, Filter, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

const DEFAULT_DIRECTIVES: &str = "ollama4rs=info,tool=info,warn";

#[derive(Debug, Error)]
pub enum TracingInitError {
    #[error("invalid filter directives: {0}")]
    Filter(String),
    #[error("failed to build OTLP exporter: {0}")]
    Exporter(String),
    #[error("a global subscriber is already installed: {0}")]
    AlreadyInstalled(String),
}

#[derive(Debug, Clone, Default)]
pub struct TracingOptions {
    /// `EnvFilter` directives; `RUST_LOG` wins when set.
    pub filter: Option<String>,
    /// Emit JSON lines instead of the human-readable format.
    pub json: bool,
    /// OTLP/HTTP traces endpoint, e.g. `http://localhost:4318/v1/traces`.
    pub otlp_endpoint: Option<String>,
}

/// Only spans from this crate and rmcp reach the exporter.
#[derive(Debug, Clone)]
struct ClientSpanFilter;

impl<S: Subscriber> Filter<S> for ClientSpanFilter {
    fn enabled(&self, meta: &Metadata<'_>, _cx: &Context<'_, S>) -> bool {
        let target = meta.target();
        if target.starts_with("rmcp") {
            return !matches!(meta.name(), "serve_inner" | "streamable_http_session");
        }
        target.starts_with("ollama4rs") || target == "tool"
    }
}

/// Console logging with span close events, filtered by `RUST_LOG` or
/// `ollama4rs=info,tool=info,warn`.
pub fn init_default_tracing() {
    if let Err(e) = init_tracing(TracingOptions::default()) {
        eprintln!("tracing not initialised: {e}");
    }
}

/// Installs the global subscriber. Returns the tracer provider when OTLP
/// export is enabled; call `shutdown` on it before exit to flush spans.
pub fn init_tracing(options: TracingOptions) -> Result<Option<SdkTracerProvider>, TracingInitError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(options.filter.as_deref().unwrap_or(DEFAULT_DIRECTIVES))
            .map_err(|e| TracingInitError::Filter(e.to_string()))?,
    };

    let fmt_layer = if options.json {
        fmt::layer()
            .json()
            .with_timer(UtcTime::rfc_3339())
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(filter)
            .boxed()
    } else {
        fmt::layer()
            .with_timer(UtcTime::rfc_3339())
            .with_target(false)
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(filter)
            .boxed()
    };

    let provider = options
        .otlp_endpoint
        .as_deref()
        .map(otlp_provider)
        .transpose()?;

    let otel_layer = provider.as_ref().map(|provider| {
        tracing_opentelemetry::layer()
            .with_tracer(provider.tracer("ollama4rs"))
            .with_filter(ClientSpanFilter)
    });

    Registry::default()
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()
        .map_err(|e| TracingInitError::AlreadyInstalled(e.to_string()))?;

    if let Some(provider) = &provider {
        global::set_tracer_provider(provider.clone());
    }
    Ok(provider)
}

fn otlp_provider(endpoint: &str) -> Result<SdkTracerProvider, TracingInitError> {
    let exporter = SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| TracingInitError::Exporter(e.to_string()))?;

    let resource = Resource::builder()
        .with_attributes([
            KeyValue::new(SERVICE_NAME, "ollama4rs"),
            KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
        ])
        .build();

    let processor = BatchSpanProcessor::builder(exporter, runtime::Tokio).build();

    Ok(SdkTracerProvider::builder()
        .with_resource(resource)
        .with_span_processor(processor)
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_directives_are_reported() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let err = init_tracing(TracingOptions {
            filter: Some("ollama4rs=notalevel".into()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, TracingInitError::Filter(_)));
    }
}
