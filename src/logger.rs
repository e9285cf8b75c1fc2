use std::future::Future;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Instant;

use anyhow::{Context, Result};
use opentelemetry::global;
use opentelemetry::metrics::{Counter, Histogram};
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{LogExporter, MetricExporter, Protocol, WithExportConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use serde::{Deserialize, Serialize};
use tracing::{Level, error, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, fmt};

const SERVICE_NAME: &str = "cadence-proxy";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct LogConfig {
    /// An `EnvFilter` directive, e.g. `info` or `cadence_proxy=debug`.
    pub log_level: String,
    /// Write a daily rolling file here instead of stdout.
    pub log_dir: Option<PathBuf>,
    /// OTLP/HTTP endpoint for logs and metrics.
    pub otel_endpoint: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: None,
            otel_endpoint: None,
        }
    }
}

/// Keeps the exporters alive; dropping it flushes nothing, call [`shutdown`](Self::shutdown).
#[derive(Default)]
pub struct Telemetry {
    logger_provider: Option<SdkLoggerProvider>,
    meter_provider: Option<SdkMeterProvider>,
}

impl Telemetry {
    pub fn shutdown(self) {
        if let Some(provider) = self.logger_provider {
            if let Err(err) = provider.shutdown() {
                eprintln!("log exporter shutdown failed: {err}");
            }
        }
        if let Some(provider) = self.meter_provider {
            if let Err(err) = provider.shutdown() {
                eprintln!("metric exporter shutdown failed: {err}");
            }
        }
    }
}

static RESOURCE: OnceLock<Resource> = OnceLock::new();
fn get_resource() -> Resource {
    RESOURCE
        .get_or_init(|| Resource::builder().with_service_name(SERVICE_NAME).build())
        .clone()
}

fn init_logs(end_point: &str) -> Result<SdkLoggerProvider> {
    let exporter = LogExporter::builder()
        .with_http()
        .with_protocol(Protocol::HttpBinary)
        .with_endpoint(end_point)
        .build()
        .context("building the OTLP log exporter")?;
    Ok(SdkLoggerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(get_resource())
        .build())
}

fn init_metrics(end_point: &str) -> Result<SdkMeterProvider> {
    let exporter = MetricExporter::builder()
        .with_http()
        .with_protocol(Protocol::HttpBinary)
        .with_endpoint(end_point)
        .build()
        .context("building the OTLP metric exporter")?;
    Ok(SdkMeterProvider::builder()
        .with_periodic_exporter(exporter)
        .with_resource(get_resource())
        .build())
}

fn env_filter(log_level: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(log_level).with_context(|| format!("invalid log level '{log_level}'"))
}

/// Installs the global subscriber.
///
/// Text logs go to stdout, or to `<log_dir>/cadence-proxy.log` rotated daily.
/// With an OTLP endpoint every event is also bridged to OpenTelemetry logs
/// and the global meter provider exports over OTLP.
pub fn init_tracing(config: &LogConfig) -> Result<Telemetry> {
    let mut telemetry = Telemetry::default();

    let otel_layer = match &config.otel_endpoint {
        Some(endpoint) => {
            let logger_provider = init_logs(endpoint)?;
            let meter_provider = init_metrics(endpoint)?;
            global::set_meter_provider(meter_provider.clone());
            let filter = env_filter(&config.log_level)?
                .add_directive("hyper=off".parse()?)
                .add_directive("tonic=off".parse()?)
                .add_directive("h2=off".parse()?)
                .add_directive("reqwest=off".parse()?);
            let layer = OpenTelemetryTracingBridge::new(&logger_provider).with_filter(filter);
            telemetry.logger_provider = Some(logger_provider);
            telemetry.meter_provider = Some(meter_provider);
            Some(layer)
        }
        None => None,
    };

    let (stdout_layer, file_layer) = match &config.log_dir {
        Some(dir) => {
            let appender =
                RollingFileAppender::new(Rotation::DAILY, dir, format!("{SERVICE_NAME}.log"));
            let layer = fmt::layer()
                .with_writer(appender)
                .with_ansi(false)
                .with_filter(env_filter(&config.log_level)?);
            (None, Some(layer))
        }
        None => {
            let layer = fmt::layer()
                .with_thread_names(true)
                .with_filter(env_filter(&config.log_level)?);
            (Some(layer), None)
        }
    };

    Registry::default()
        .with(otel_layer)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    info!(level = %config.log_level, otel = config.otel_endpoint.is_some(), "logging initialised");
    Ok(telemetry)
}

/// Per-message counters and latency.
#[derive(Clone)]
pub struct ProxyMetrics {
    requests_started: Counter<u64>,
    requests_succeeded: Counter<u64>,
    requests_failed: Counter<u64>,
    request_latency_ms: Histogram<f64>,
}

impl Default for ProxyMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ProxyMetrics {
    /// Builds the instruments on the global meter. Without an exporter they
    /// record into the no-op provider.
    pub fn new() -> Self {
        let meter = global::meter(SERVICE_NAME);
        Self {
            requests_started: meter
                .u64_counter("proxy_requests_started")
                .with_description("Messages received from the library")
                .build(),
            requests_succeeded: meter.u64_counter("proxy_requests_succeeded").build(),
            requests_failed: meter.u64_counter("proxy_requests_failed").build(),
            request_latency_ms: meter
                .f64_histogram("proxy_request_latency_ms")
                .with_description("Time to produce a reply")
                .with_unit("ms")
                .build(),
        }
    }

    /// Runs `handler`, recording its latency and outcome under `name`.
    ///
    /// Emits one `target: "request"` event per call.
    pub async fn instrument<F, Fut, T, E>(&self, name: &str, handler: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.requests_started.add(1, &[]);
        let start = Instant::now();

        let result = handler().await;

        let elapsed = start.elapsed().as_secs_f64() * 1_000.0;
        self.request_latency_ms.record(elapsed, &[]);
        match &result {
            Ok(_) => self.requests_succeeded.add(1, &[]),
            Err(err) => {
                self.requests_failed.add(1, &[]);
                error!(error = %err, "`{name}` failed after {elapsed:.2} ms");
            }
        }

        tracing::event!(
            target: "request",
            Level::INFO,
            request = name,
            latency_ms = elapsed,
            status = if result.is_ok() { "ok" } else { "error" },
        );
        result
    }
}
