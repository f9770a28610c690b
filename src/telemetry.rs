//! Observability sink abstraction.
//!
//! Metrics/tracing backends are out of scope as a feature, but the
//! orchestrator still needs somewhere to report iteration/retry/completion
//! counters regardless — ambient observability, same as logging. Follows
//! the plain `tracing` usage pattern of `main.rs`/`supervisor/mod.rs`
//! (`tracing::info!`/`debug!` at call sites, no metrics crate); the `otlp`
//! feature adds a real `tracing-opentelemetry` layer for deployments that
//! want a collector, following the pattern from `jdsingh122918-forge`'s
//! reqwest/thiserror crate choices of "keep the default path dependency-free,
//! gate the heavier integration behind a feature".

use tracing::info;

/// A counter-oriented telemetry sink. Kept deliberately narrow: the
/// orchestrator reports a handful of named events, and sinks decide how
/// (or whether) to aggregate them.
pub trait TelemetrySink: Send + Sync {
    fn record_iteration(&self, session_id: &str, iteration: u64);
    fn record_retry(&self, session_id: &str, kind: &str, attempt: u32);
    fn record_completion(&self, session_id: &str, success: bool, iterations: u64);
}

/// Discards everything. Used in tests where telemetry noise isn't useful.
pub struct NullTelemetrySink;

impl TelemetrySink for NullTelemetrySink {
    fn record_iteration(&self, _session_id: &str, _iteration: u64) {}
    fn record_retry(&self, _session_id: &str, _kind: &str, _attempt: u32) {}
    fn record_completion(&self, _session_id: &str, _success: bool, _iterations: u64) {}
}

/// Emits `tracing` events; the default sink for the CLI binary. Anything
/// that forwards `tracing` spans to OTLP (the `otlp` feature) rides on top
/// of this for free since it's just another subscriber layer.
pub struct TracingTelemetrySink;

impl TelemetrySink for TracingTelemetrySink {
    fn record_iteration(&self, session_id: &str, iteration: u64) {
        info!(session_id, iteration, "iteration completed");
    }

    fn record_retry(&self, session_id: &str, kind: &str, attempt: u32) {
        info!(session_id, kind, attempt, "retrying after failure");
    }

    fn record_completion(&self, session_id: &str, success: bool, iterations: u64) {
        info!(session_id, success, iterations, "run completed");
    }
}

#[cfg(feature = "otlp")]
pub mod otlp {
    //! Real OpenTelemetry export, built only with `--features otlp`.
    //!
    //! Installs a `tracing-opentelemetry` layer on top of the normal
    //! `fmt` layer so OTLP export is additive rather than a replacement
    //! for local logging.

    use anyhow::{Context, Result};
    use opentelemetry::global;
    use opentelemetry_sdk::trace::SdkTracerProvider;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    /// Initialize a process-wide tracer that exports spans over OTLP and
    /// layers it alongside the usual `tracing_subscriber::fmt` output.
    pub fn init(service_name: &str, env_filter: &str) -> Result<SdkTracerProvider> {
        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .build()
            .context("failed to build OTLP span exporter")?;

        let provider = SdkTracerProvider::builder()
            .with_batch_exporter(exporter)
            .build();
        global::set_tracer_provider(provider.clone());

        let tracer = provider.tracer(service_name.to_string());
        let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);

        tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::new(env_filter))
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .with(otel_layer)
            .try_init()
            .context("failed to install OTLP tracing subscriber")?;

        Ok(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_sink_never_panics() {
        let sink = NullTelemetrySink;
        sink.record_iteration("s1", 1);
        sink.record_retry("s1", "transient", 2);
        sink.record_completion("s1", true, 3);
    }

    #[test]
    fn tracing_sink_never_panics_without_a_subscriber_installed() {
        let sink = TracingTelemetrySink;
        sink.record_iteration("s1", 1);
        sink.record_completion("s1", false, 1);
    }
}
