//! Metrics module
//!
//! Prometheus counters and histograms for the upload pipeline, registered
//! in the default registry.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec,
    Encoder, HistogramVec, TextEncoder,
};

lazy_static! {
    pub static ref UPLOADS_TOTAL: CounterVec = register_counter_vec!(
        "hakobi_uploads_total",
        "Total number of uploaded files",
        &["policy", "status"]
    ).unwrap();

    pub static ref UPLOAD_BYTES_TOTAL: Counter = register_counter!(
        "hakobi_upload_bytes_total",
        "Total bytes stored"
    ).unwrap();

    pub static ref UPLOAD_DURATION: HistogramVec = register_histogram_vec!(
        "hakobi_upload_duration_seconds",
        "Per-file upload duration in seconds",
        &["policy"],
        vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]
    ).unwrap();

    pub static ref UPLOAD_REJECTIONS: CounterVec = register_counter_vec!(
        "hakobi_upload_rejections_total",
        "Rejected files by error kind",
        &["kind"]
    ).unwrap();

    pub static ref TRANSFERS_TOTAL: CounterVec = register_counter_vec!(
        "hakobi_transfers_total",
        "Number of stored files by transfer mode",
        &["mode"]  // "rename" or "copy"
    ).unwrap();
}

/// Record a stored file
pub fn record_upload_success(policy: &str, bytes: u64) {
    UPLOADS_TOTAL.with_label_values(&[policy, "success"]).inc();
    UPLOAD_BYTES_TOTAL.inc_by(bytes as f64);
}

/// Record a rejected or failed file
pub fn record_upload_failure(policy: &str, kind: &str) {
    UPLOADS_TOTAL.with_label_values(&[policy, "failure"]).inc();
    UPLOAD_REJECTIONS.with_label_values(&[kind]).inc();
}

/// Record upload duration
pub fn record_upload_duration(policy: &str, duration_secs: f64) {
    UPLOAD_DURATION
        .with_label_values(&[policy])
        .observe(duration_secs);
}

/// Record how the persister moved the bytes
pub fn record_transfer(mode: &str) {
    TRANSFERS_TOTAL.with_label_values(&[mode]).inc();
}

/// Render every registered metric in the Prometheus text format.
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }

    String::from_utf8_lossy(&buffer).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_upload_success() {
        record_upload_success("test-policy", 1024);
        // Just verify it doesn't panic
    }

    #[test]
    fn test_record_upload_failure() {
        record_upload_failure("test-policy", "min_file_size");
        assert!(UPLOAD_REJECTIONS.with_label_values(&["min_file_size"]).get() >= 1.0);
    }

    #[test]
    fn test_record_transfer() {
        record_transfer("rename");
        record_transfer("copy");
        // Just verify it doesn't panic
    }

    #[test]
    fn test_render_contains_registered_metrics() {
        record_upload_success("render-policy", 1);
        record_upload_duration("render-policy", 0.002);

        let text = render();
        assert!(text.contains("hakobi_uploads_total"));
        assert!(text.contains("hakobi_upload_duration_seconds"));
    }
}
