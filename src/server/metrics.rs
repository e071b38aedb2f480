//! Request metrics in Prometheus text format

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::OnceLock;
use std::time::Duration;

/// Counters per protocol operation plus resolver and forwarding totals
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    inner: Mutex<RegistryInner>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    operations: BTreeMap<String, OperationMetrics>,
    resolver_calls: u64,
    forwarded: u64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct OperationMetrics {
    pub requests: u64,
    pub errors: u64,
    pub latency_seconds: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub operations: BTreeMap<String, OperationMetrics>,
    pub resolver_calls: u64,
    pub forwarded: u64,
}

impl MetricsRegistry {
    pub fn global() -> &'static MetricsRegistry {
        static GLOBAL: OnceLock<MetricsRegistry> = OnceLock::new();
        GLOBAL.get_or_init(MetricsRegistry::default)
    }

    /// Record one finished request for `operation`
    pub fn record_request(&self, operation: &str, duration: Duration, failed: bool) {
        let mut inner = self.inner.lock();
        let metrics = inner.operations.entry(operation.to_owned()).or_default();
        metrics.requests = metrics.requests.saturating_add(1);
        if failed {
            metrics.errors = metrics.errors.saturating_add(1);
        }
        metrics.latency_seconds += duration.as_secs_f64();
    }

    pub fn record_resolver_call(&self) {
        let mut inner = self.inner.lock();
        inner.resolver_calls = inner.resolver_calls.saturating_add(1);
    }

    pub fn record_forward(&self) {
        let mut inner = self.inner.lock();
        inner.forwarded = inner.forwarded.saturating_add(1);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.lock();
        MetricsSnapshot {
            operations: inner.operations.clone(),
            resolver_calls: inner.resolver_calls,
            forwarded: inner.forwarded,
        }
    }

    /// Render the registry in the Prometheus text exposition format
    pub fn render(&self) -> String {
        let snapshot = self.snapshot();
        let mut out = String::new();

        let families: [(&str, &str, fn(&OperationMetrics) -> String); 3] = [
            ("modproxy_requests_total", "Protocol requests served", |m: &OperationMetrics| {
                m.requests.to_string()
            }),
            (
                "modproxy_request_errors_total",
                "Protocol requests answered with an error",
                |m: &OperationMetrics| m.errors.to_string(),
            ),
            ("modproxy_request_seconds_total", "Cumulative request latency", |m: &OperationMetrics| {
                format!("{:.6}", m.latency_seconds)
            }),
        ];
        for (name, help, value) in families {
            let _ = writeln!(out, "# HELP {} {}", name, help);
            let _ = writeln!(out, "# TYPE {} counter", name);
            for (op, metrics) in &snapshot.operations {
                let _ = writeln!(out, "{}{{op=\"{}\"}} {}", name, op, value(metrics));
            }
        }

        let _ = writeln!(out, "# HELP modproxy_resolver_calls_total go command invocations");
        let _ = writeln!(out, "# TYPE modproxy_resolver_calls_total counter");
        let _ = writeln!(out, "modproxy_resolver_calls_total {}", snapshot.resolver_calls);
        let _ = writeln!(out, "# HELP modproxy_forwarded_total Requests relayed to the upstream proxy");
        let _ = writeln!(out, "# TYPE modproxy_forwarded_total counter");
        let _ = writeln!(out, "modproxy_forwarded_total {}", snapshot.forwarded);
        out
    }
}
