use super::pre::Letterbox;
use crate::detection::Detection;
use ndarray::ArrayViewD;

pub struct TransformParams {
    pub orig_width: u32,
    pub orig_height: u32,
    pub letterbox: Letterbox,
}

/// Candidate box in original-image coordinates, before rounding.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    confidence: f32,
}

impl Candidate {
    fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    fn iou(&self, other: &Candidate) -> f32 {
        let ix = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let iy = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let intersection = ix * iy;
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }
}

pub struct PostProcessor {
    pub iou_threshold: f32,
}

impl PostProcessor {
    pub fn new(iou_threshold: f32) -> Self {
        Self { iou_threshold }
    }

    /// Decode a YOLO head (`[1, 4 + classes, candidates]`, cxcywh in network
    /// pixels) into detections on the original image, best first.
    #[tracing::instrument(skip(self, predictions, transform))]
    pub fn parse_detections(
        &self,
        predictions: &ArrayViewD<f32>,
        confidence_threshold: f32,
        transform: &TransformParams,
    ) -> anyhow::Result<Vec<Detection>> {
        let shape = predictions.shape();
        if shape.len() != 3 || shape[0] != 1 || shape[1] < 5 {
            anyhow::bail!(
                "unexpected detector output shape {:?}, expected [1, 4 + classes, candidates]",
                shape
            );
        }

        let num_attributes = shape[1];
        let num_candidates = shape[2];

        let mut candidates = Vec::new();

        for i in 0..num_candidates {
            let mut confidence = f32::NEG_INFINITY;
            for c in 4..num_attributes {
                confidence = confidence.max(predictions[[0, c, i]]);
            }

            if confidence.is_nan() || confidence < confidence_threshold {
                continue;
            }

            let (x1, y1, x2, y2) = cxcywh_to_xyxy(
                predictions[[0, 0, i]],
                predictions[[0, 1, i]],
                predictions[[0, 2, i]],
                predictions[[0, 3, i]],
            );

            let lb = &transform.letterbox;
            let max_x = transform.orig_width as f32;
            let max_y = transform.orig_height as f32;

            candidates.push(Candidate {
                x1: ((x1 - lb.offset_x) / lb.scale).clamp(0.0, max_x),
                y1: ((y1 - lb.offset_y) / lb.scale).clamp(0.0, max_y),
                x2: ((x2 - lb.offset_x) / lb.scale).clamp(0.0, max_x),
                y2: ((y2 - lb.offset_y) / lb.scale).clamp(0.0, max_y),
                confidence,
            });
        }

        let kept = non_max_suppression(candidates, self.iou_threshold);

        tracing::trace!(kept = kept.len(), "Detections after NMS");

        Ok(kept.into_iter().filter_map(to_detection).collect())
    }
}

/// Greedy class-agnostic NMS. Returns survivors sorted by confidence, descending.
fn non_max_suppression(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<Candidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if kept.iter().all(|k| k.iou(&candidate) <= iou_threshold) {
            kept.push(candidate);
        }
    }
    kept
}

/// Round to integer pixels; boxes that collapse are dropped.
fn to_detection(candidate: Candidate) -> Option<Detection> {
    let x_min = candidate.x1.round() as u32;
    let y_min = candidate.y1.round() as u32;
    let x_max = candidate.x2.round() as u32;
    let y_max = candidate.y2.round() as u32;

    (x_min < x_max && y_min < y_max).then_some(Detection {
        x_min,
        y_min,
        x_max,
        y_max,
        confidence: candidate.confidence.clamp(0.0, 1.0),
    })
}

/// Convert bounding box from center-width-height format to corner format
#[inline]
fn cxcywh_to_xyxy(cx: f32, cy: f32, w: f32, h: f32) -> (f32, f32, f32, f32) {
    let x1 = cx - w / 2.0;
    let y1 = cy - h / 2.0;
    let x2 = cx + w / 2.0;
    let y2 = cy + h / 2.0;
    (x1, y1, x2, y2)
}
