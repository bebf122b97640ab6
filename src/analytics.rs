use serde_json::Value;
use tracing::info;

/// Fire-and-forget event sink. Recording must never block or fail the
/// operation that emits the event.
pub trait Analytics: Send + Sync {
    fn record(&self, event: &str, fields: Value);
}

/// Default sink: structured log lines under the `analytics` target. A real
/// shipper can replace this behind the same trait.
pub struct TracingAnalytics;

impl Analytics for TracingAnalytics {
    fn record(&self, event: &str, fields: Value) {
        info!(target: "analytics", event, fields = %fields, "event recorded");
    }
}
