//! Tracing setup for the relayer binary.
//!
//! Log level comes from `RUST_LOG` (default `info`); `LOG_FORMAT=json` switches to
//! newline-delimited JSON for log shippers.

use axum::http::Request;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{DefaultOnResponse, MakeSpan, TraceLayer};
use tracing::{Level, Span};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    fn from_env() -> Self {
        match std::env::var("LOG_FORMAT").as_deref() {
            Ok("json") | Ok("JSON") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Telemetry {
    name: Option<String>,
    version: Option<String>,
    format: LogFormat,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl Telemetry {
    pub fn new() -> Self {
        Self {
            name: None,
            version: None,
            format: LogFormat::from_env(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Installs the global subscriber. A second registration is ignored.
    pub fn register(self) -> Self {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let registry = tracing_subscriber::registry().with(filter);
        let installed = match self.format {
            LogFormat::Json => registry
                .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
                .try_init(),
            LogFormat::Text => registry
                .with(tracing_subscriber::fmt::layer().with_target(true))
                .try_init(),
        };
        if installed.is_ok() {
            tracing::info!(
                service = self.name.as_deref().unwrap_or("unknown"),
                version = self.version.as_deref().unwrap_or("unknown"),
                format = ?self.format,
                "Telemetry initialized"
            );
        }
        self
    }

    /// Request span layer for the HTTP router. 5xx responses are recorded as failures.
    pub fn http_tracing(&self) -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>, HttpMakeSpan> {
        TraceLayer::new_for_http()
            .make_span_with(HttpMakeSpan)
            .on_response(DefaultOnResponse::new().level(Level::INFO))
    }
}

/// One `http_request` span per request with method and path.
#[derive(Debug, Clone, Copy)]
pub struct HttpMakeSpan;

impl<B> MakeSpan<B> for HttpMakeSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        tracing::info_span!(
            "http_request",
            method = %request.method(),
            path = %request.uri().path(),
        )
    }
}
