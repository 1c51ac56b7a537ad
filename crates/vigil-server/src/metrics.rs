//! Prometheus-compatible metrics for the Vigil control surface.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Global metrics registry.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    /// Total HTTP requests served.
    http_requests_total: AtomicU64,
    /// Actions that passed the governor and reached the device.
    actions_executed_total: AtomicU64,
    /// Actions rejected by safety policy.
    actions_vetoed_total: AtomicU64,
    /// Actions that failed at the device or capture layer.
    actions_failed_total: AtomicU64,
    /// Emergency-stop triggers received.
    emergency_stops_total: AtomicU64,
    /// Server start time for uptime calculation.
    started_at: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                http_requests_total: AtomicU64::new(0),
                actions_executed_total: AtomicU64::new(0),
                actions_vetoed_total: AtomicU64::new(0),
                actions_failed_total: AtomicU64::new(0),
                emergency_stops_total: AtomicU64::new(0),
                started_at: Instant::now(),
            }),
        }
    }

    pub fn inc_http_requests(&self) {
        self.inner
            .http_requests_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_actions_executed(&self) {
        self.inner
            .actions_executed_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_actions_vetoed(&self) {
        self.inner
            .actions_vetoed_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_actions_failed(&self) {
        self.inner
            .actions_failed_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_emergency_stops(&self) {
        self.inner
            .emergency_stops_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime_secs(&self) -> u64 {
        self.inner.started_at.elapsed().as_secs()
    }

    /// Render metrics in Prometheus text exposition format.
    pub fn render_prometheus(&self) -> String {
        let m = &self.inner;
        format!(
            r#"# HELP vigil_uptime_seconds Time since the server started.
# TYPE vigil_uptime_seconds gauge
vigil_uptime_seconds {}

# HELP vigil_http_requests_total Total HTTP requests served.
# TYPE vigil_http_requests_total counter
vigil_http_requests_total {}

# HELP vigil_actions_executed_total Actions that passed policy and reached the device.
# TYPE vigil_actions_executed_total counter
vigil_actions_executed_total {}

# HELP vigil_actions_vetoed_total Actions rejected by safety policy.
# TYPE vigil_actions_vetoed_total counter
vigil_actions_vetoed_total {}

# HELP vigil_actions_failed_total Actions that failed at the device or capture layer.
# TYPE vigil_actions_failed_total counter
vigil_actions_failed_total {}

# HELP vigil_emergency_stops_total Emergency-stop triggers received.
# TYPE vigil_emergency_stops_total counter
vigil_emergency_stops_total {}
"#,
            m.started_at.elapsed().as_secs(),
            m.http_requests_total.load(Ordering::Relaxed),
            m.actions_executed_total.load(Ordering::Relaxed),
            m.actions_vetoed_total.load(Ordering::Relaxed),
            m.actions_failed_total.load(Ordering::Relaxed),
            m.emergency_stops_total.load(Ordering::Relaxed),
        )
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_increments() {
        let m = Metrics::new();
        m.inc_http_requests();
        m.inc_http_requests();
        m.inc_actions_vetoed();
        let output = m.render_prometheus();
        assert!(output.contains("vigil_http_requests_total 2"));
        assert!(output.contains("vigil_actions_vetoed_total 1"));
    }

    #[test]
    fn test_prometheus_format() {
        let m = Metrics::new();
        let output = m.render_prometheus();
        assert!(output.contains("# HELP vigil_uptime_seconds"));
        assert!(output.contains("# TYPE vigil_uptime_seconds gauge"));
        assert!(output.contains("# TYPE vigil_actions_executed_total counter"));
    }
}
