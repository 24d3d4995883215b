/*!
Observability for the Phoenix engine.

- Structured logging through `tracing`, with a subscriber installer for
  applications that do not set up their own
- Prometheus counters and histograms behind the `metrics` feature
*/

#[cfg(feature = "metrics")]
use prometheus::{Counter, Encoder, Histogram, HistogramOpts, Registry, TextEncoder};
#[cfg(feature = "metrics")]
use std::sync::OnceLock;
use tracing::subscriber::set_global_default;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{EnvFilter, Registry as TracingRegistry};

use crate::{PhoenixError, Result};

/// Global metrics instance
#[cfg(feature = "metrics")]
static METRICS: OnceLock<PhoenixMetrics> = OnceLock::new();

/// Metrics collection for persist and rehydrate operations
#[cfg(feature = "metrics")]
#[derive(Debug)]
pub struct PhoenixMetrics {
    pub rehydrations_total: Counter,
    pub expired_total: Counter,
    pub migration_steps_total: Counter,
    pub saves_total: Counter,
    pub save_errors_total: Counter,
    pub envelope_size_bytes: Histogram,

    // Prometheus registry for scraping
    registry: Registry,
}

#[cfg(feature = "metrics")]
fn counter(registry: &Registry, name: &str, help: &str) -> Result<Counter> {
    let counter = Counter::new(name, help)
        .map_err(|e| PhoenixError::validation(format!("Failed to create {name} metric: {e}")))?;
    registry
        .register(Box::new(counter.clone()))
        .map_err(|e| PhoenixError::validation(format!("Failed to register {name}: {e}")))?;
    Ok(counter)
}

#[cfg(feature = "metrics")]
impl PhoenixMetrics {
    /// Initialize new metrics instance
    fn new() -> Result<Self> {
        let registry = Registry::new();

        let rehydrations_total = counter(
            &registry,
            "phoenix_rehydrations_total",
            "Total rehydration actions dispatched",
        )?;
        let expired_total = counter(
            &registry,
            "phoenix_expired_total",
            "Persisted snapshots discarded as expired",
        )?;
        let migration_steps_total = counter(
            &registry,
            "phoenix_migration_steps_total",
            "Migration steps applied during rehydration",
        )?;
        let saves_total = counter(
            &registry,
            "phoenix_saves_total",
            "Envelopes written to storage",
        )?;
        let save_errors_total = counter(
            &registry,
            "phoenix_save_errors_total",
            "Envelopes that failed to encode or write",
        )?;

        let envelope_size_bytes = Histogram::with_opts(HistogramOpts::new(
            "phoenix_envelope_size_bytes",
            "Size of encoded envelopes in bytes",
        ))
        .map_err(|e| {
            PhoenixError::validation(format!("Failed to create envelope_size_bytes metric: {e}"))
        })?;
        registry
            .register(Box::new(envelope_size_bytes.clone()))
            .map_err(|e| {
                PhoenixError::validation(format!("Failed to register envelope_size_bytes: {e}"))
            })?;

        Ok(Self {
            rehydrations_total,
            expired_total,
            migration_steps_total,
            saves_total,
            save_errors_total,
            envelope_size_bytes,
            registry,
        })
    }

    /// Get or initialize global metrics instance
    pub fn global() -> &'static PhoenixMetrics {
        METRICS.get_or_init(|| Self::new().expect("Failed to initialize Phoenix metrics"))
    }

    pub fn record_rehydration(&self) {
        self.rehydrations_total.inc();
    }

    pub fn record_expired(&self) {
        self.expired_total.inc();
    }

    pub fn record_migration_steps(&self, steps: usize) {
        self.migration_steps_total.inc_by(steps as f64);
    }

    /// Record a successful write of `size_bytes`
    pub fn record_save(&self, size_bytes: usize) {
        self.saves_total.inc();
        self.envelope_size_bytes.observe(size_bytes as f64);
    }

    pub fn record_save_error(&self) {
        self.save_errors_total.inc();
    }

    /// Gather metrics in Prometheus format
    pub fn gather_metrics(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| PhoenixError::validation(format!("Failed to encode metrics: {e}")))?;

        String::from_utf8(buffer).map_err(|e| {
            PhoenixError::validation(format!("Failed to convert metrics to string: {e}"))
        })
    }
}

/// Install a global tracing subscriber
///
/// Filtering follows `RUST_LOG`, with `phoenix_core=info` added as the default
/// directive. `json` switches the fmt layer to JSON lines.
pub fn init_observability(json: bool) -> Result<()> {
    #[cfg(feature = "metrics")]
    PhoenixMetrics::global();

    let directive: Directive = "phoenix_core=info"
        .parse()
        .map_err(|e| PhoenixError::validation(format!("Invalid log directive: {e}")))?;
    let filter = EnvFilter::from_default_env().add_directive(directive);

    let result = if json {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(false)
            .with_current_span(false);
        set_global_default(TracingRegistry::default().with(filter).with(fmt_layer))
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
        set_global_default(TracingRegistry::default().with(filter).with(fmt_layer))
    };
    result.map_err(|e| {
        PhoenixError::validation(format!("Failed to set global tracing subscriber: {e}"))
    })?;

    tracing::info!("Phoenix observability initialized");
    Ok(())
}

/// Initialize observability with default settings (plain text output)
pub fn init_default_observability() -> Result<()> {
    init_observability(false)
}
