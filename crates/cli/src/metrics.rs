//! Prometheus textfile export.
//!
//! The binary is short-lived, so instead of serving `/metrics` it writes the
//! text exposition format to a file picked up by node-exporter's textfile
//! collector.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use prometheus::{Encoder, Registry, TextEncoder};
use std::path::Path;

/// Registry holding the core collectors.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

fn register_metrics(registry: &Registry) {
    for collector in migrator_core::metrics::all_metrics() {
        if let Err(e) = registry.register(collector) {
            tracing::warn!(error = %e, "Failed to register metric");
        }
    }
}

/// Encode all metrics in Prometheus text format.
pub fn encode_metrics() -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .context("Failed to encode metrics")?;
    String::from_utf8(buffer).context("Metrics output is not valid UTF-8")
}

/// Writes the metrics to `path`, replacing it atomically.
pub fn write_textfile(path: &Path) -> Result<()> {
    let body = encode_metrics()?;
    let tmp = path.with_extension("prom.tmp");
    std::fs::write(&tmp, body)
        .with_context(|| format!("Failed to write metrics to {:?}", tmp))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move metrics file into place at {:?}", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_metrics_includes_core_collectors() {
        migrator_core::metrics::COUNTRY_CODE_MISSING.inc();
        let text = encode_metrics().unwrap();
        assert!(text.contains("migrator_country_code_missing_total"));
    }

    #[test]
    fn test_write_textfile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("migrator.prom");
        migrator_core::metrics::INVOCATIONS_IN_FLIGHT.set(0);

        write_textfile(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("migrator_invocations_in_flight"));
        assert!(!dir.path().join("migrator.prom.tmp").exists());
    }
}
