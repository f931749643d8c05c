//! Prometheus counters for redaction traffic
//!
//! Exposed on `GET /metrics` (see `api.rs`):
//!   rdx_redactions_total{outcome}
//!   rdx_restores_total{outcome}
//!   rdx_unmatched_fields_total

use prometheus_client::{
    encoding::text::encode,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};
use rdx_core::error::ErrorKind;
use rdx_core::RdxResult;

type Labels = Vec<(String, String)>;

#[derive(Clone, Default)]
pub struct RdxMetrics {
    redactions: Family<Labels, Counter>,
    restores: Family<Labels, Counter>,
    unmatched_fields: Counter,
}

impl RdxMetrics {
    pub fn new(registry: &mut Registry) -> Self {
        let metrics = Self::default();

        // Counters get the `_total` suffix from the encoder.
        registry.register(
            "rdx_redactions",
            "Redaction requests by outcome",
            metrics.redactions.clone(),
        );
        registry.register(
            "rdx_restores",
            "Restore requests by outcome",
            metrics.restores.clone(),
        );
        registry.register(
            "rdx_unmatched_fields",
            "Fields with no occurrence in the document during substitution",
            metrics.unmatched_fields.clone(),
        );
        metrics
    }

    pub fn redaction<T>(&self, result: &RdxResult<T>) {
        self.redactions.get_or_create(&outcome_labels(result)).inc();
    }

    pub fn restore<T>(&self, result: &RdxResult<T>) {
        self.restores.get_or_create(&outcome_labels(result)).inc();
    }

    pub fn unmatched(&self, count: usize) {
        self.unmatched_fields.inc_by(count as u64);
    }
}

fn outcome_labels<T>(result: &RdxResult<T>) -> Labels {
    let outcome = match result {
        Ok(_) => "success",
        Err(e) => match e.kind() {
            ErrorKind::Validation => "invalid",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Authentication => "unauthorized",
            ErrorKind::Internal => "error",
        },
    };
    vec![("outcome".to_string(), outcome.to_string())]
}

/// Prometheus text exposition of `registry`.
pub fn render(registry: &Registry) -> Result<String, std::fmt::Error> {
    let mut body = String::new();
    encode(&mut body, registry)?;
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdx_core::RdxError;

    #[test]
    fn test_counters_rendered() {
        let mut registry = Registry::default();
        let metrics = RdxMetrics::new(&mut registry);

        metrics.redaction(&Ok::<(), RdxError>(()));
        metrics.redaction(&Err::<(), _>(RdxError::Validation("weak".into())));
        metrics.restore(&Err::<(), _>(RdxError::InvalidPasskeyOrCorruptedData));
        metrics.unmatched(2);

        let body = render(&registry).unwrap();
        assert!(body.contains("rdx_redactions_total{outcome=\"success\"} 1"));
        assert!(body.contains("rdx_redactions_total{outcome=\"invalid\"} 1"));
        assert!(body.contains("rdx_restores_total{outcome=\"unauthorized\"} 1"));
        assert!(body.contains("rdx_unmatched_fields_total 2"));
    }
}
