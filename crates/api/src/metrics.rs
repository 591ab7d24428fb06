use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};

/// Service instruments. Recording is a no-op until a meter provider is
/// installed by the telemetry guard.
#[derive(Clone)]
pub struct ApiMetrics {
    detect_duration: Histogram<f64>,
    detect_requests: Counter<u64>,
    detect_failures: Counter<u64>,
    detections: Counter<u64>,
    config_reloads: Counter<u64>,
}

impl ApiMetrics {
    pub fn new(meter_name: &'static str) -> Self {
        let meter = global::meter(meter_name);
        let latency_buckets = [
            0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.15, 0.2, 0.3, 0.5, 0.75, 1.0, 2.0, 5.0,
        ];

        Self {
            detect_duration: meter
                .f64_histogram("detect_duration_seconds")
                .with_description("Time to serve a detection request (decode + predict + render)")
                .with_unit("s")
                .with_boundaries(latency_buckets.to_vec())
                .build(),
            detect_requests: meter
                .u64_counter("detect_requests_total")
                .with_description("Total detection requests")
                .build(),
            detect_failures: meter
                .u64_counter("detect_failures_total")
                .with_description("Detection requests that ended in a server error")
                .build(),
            detections: meter
                .u64_counter("detections_total")
                .with_description("Total detections returned")
                .build(),
            config_reloads: meter
                .u64_counter("config_reloads_total")
                .with_description("Configuration reloads, labelled by resolved predictor")
                .build(),
        }
    }

    pub fn record_detect(&self, elapsed_secs: f64, detections: usize, rendered: bool) {
        let attrs = [KeyValue::new("return_image", rendered)];
        self.detect_requests.add(1, &attrs);
        self.detect_duration.record(elapsed_secs, &attrs);
        self.detections.add(detections as u64, &[]);
    }

    pub fn record_detect_failure(&self) {
        self.detect_requests.add(1, &[]);
        self.detect_failures.add(1, &[]);
    }

    pub fn record_reload(&self, placeholder: bool) {
        let predictor = if placeholder { "placeholder" } else { "model" };
        self.config_reloads
            .add(1, &[KeyValue::new("predictor", predictor)]);
    }
}
