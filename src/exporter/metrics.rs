use chrono::{DateTime, Utc};
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};

use crate::core::ratelimit::{CheckResult, UNKNOWN_IDENTITY};

const NAMESPACE: &str = "dockerhub";
const SUBSYSTEM: &str = "imagepull";
const IDENTITY_LABEL: &str = "identity";

/// Value exported by `dockerhub_imagepull_checkstatus`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Startup,
    Error,
    Running,
}

impl CheckStatus {
    pub fn value(&self) -> f64 {
        match self {
            CheckStatus::Running => 1.0,
            CheckStatus::Startup | CheckStatus::Error => 0.0,
        }
    }
}

/// Gauges published on `/metrics`, kept in a private registry
pub struct ExporterMetrics {
    registry: Registry,
    limit: GaugeVec,
    remaining: GaugeVec,
    check_status: GaugeVec,
    check_time: GaugeVec,
}

impl ExporterMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let limit = gauge(&registry, "limit", "Image pulls allowed per window")?;
        let remaining = gauge(&registry, "remaining", "Image pulls left in the current window")?;
        let check_status = gauge(
            &registry,
            "checkstatus",
            "1 when the last check succeeded, 0 at startup or after a failure",
        )?;
        let check_time = gauge(
            &registry,
            "checktime",
            "Unix time of the last check attempt",
        )?;

        Ok(Self {
            registry,
            limit,
            remaining,
            check_status,
            check_time,
        })
    }

    /// Nothing is recorded while the identity is still unknown
    pub fn set_status(&self, identity: &str, status: CheckStatus) {
        if identity == UNKNOWN_IDENTITY {
            return;
        }
        self.check_status
            .with_label_values(&[identity])
            .set(status.value());
    }

    pub fn record_check_time(&self, identity: &str, at: DateTime<Utc>) {
        self.check_time
            .with_label_values(&[identity])
            .set(at.timestamp() as f64);
    }

    pub fn record_result(&self, identity: &str, result: &CheckResult) {
        self.limit
            .with_label_values(&[identity])
            .set(result.limit() as f64);
        self.remaining
            .with_label_values(&[identity])
            .set(result.remaining() as f64);
    }

    /// Prometheus text exposition of every gauge
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }
}

fn gauge(registry: &Registry, name: &str, help: &str) -> Result<GaugeVec, prometheus::Error> {
    let opts = Opts::new(name, help)
        .namespace(NAMESPACE)
        .subsystem(SUBSYSTEM);
    let gauge = GaugeVec::new(opts, &[IDENTITY_LABEL])?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}
