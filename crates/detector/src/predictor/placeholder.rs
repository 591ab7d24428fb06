use super::{PLACEHOLDER_NAME, Predict};
use crate::{config::ModelSection, detection::Detection};
use image::RgbImage;
use std::sync::{Mutex, PoisonError};

const MAX_DETECTIONS: usize = 5;
const JITTER_PX: i64 = 50;
const MIN_CONFIDENCE: f32 = 0.3;
const MAX_CONFIDENCE: f32 = 0.9;

/// Stand-in detector producing random boxes around the image centre.
///
/// Lets the service run without a trained model. Output is reproducible when
/// built with [`PlaceholderPredictor::with_seed`].
pub struct PlaceholderPredictor {
    rng: Mutex<fastrand::Rng>,
}

impl PlaceholderPredictor {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::new()),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::with_seed(seed)),
        }
    }

    pub fn from_section(section: &ModelSection) -> Self {
        section.seed.map_or_else(Self::new, Self::with_seed)
    }
}

impl Default for PlaceholderPredictor {
    fn default() -> Self {
        Self::new()
    }
}

impl Predict for PlaceholderPredictor {
    #[tracing::instrument(name = "placeholder_predict", skip(self, image))]
    fn predict(
        &self,
        image: &RgbImage,
        confidence_threshold: f32,
    ) -> anyhow::Result<Vec<Detection>> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Ok(Vec::new());
        }

        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);

        let width = i64::from(width);
        let height = i64::from(height);
        let box_size = (width.min(height) / 4).max(1);

        let count = rng.usize(0..=MAX_DETECTIONS);
        let mut detections = Vec::with_capacity(count);

        for _ in 0..count {
            let (x_min, x_max) = jittered_span(&mut rng, width, box_size);
            let (y_min, y_max) = jittered_span(&mut rng, height, box_size);
            let confidence = MIN_CONFIDENCE + rng.f32() * (MAX_CONFIDENCE - MIN_CONFIDENCE);

            if confidence >= confidence_threshold {
                detections.push(Detection {
                    x_min,
                    y_min,
                    x_max,
                    y_max,
                    confidence,
                });
            }
        }

        tracing::trace!(candidates = count, kept = detections.len(), "Placeholder detections");

        Ok(detections)
    }

    fn name(&self) -> &str {
        PLACEHOLDER_NAME
    }
}

/// Centre a `box_size` span on an axis of `extent` pixels, shift it by up to
/// ±50 px, and clamp it to a non-empty span inside `[0, extent]`.
fn jittered_span(rng: &mut fastrand::Rng, extent: i64, box_size: i64) -> (u32, u32) {
    let start = (extent - box_size) / 2 + rng.i64(-JITTER_PX..=JITTER_PX);
    let end = start + box_size;

    let start = start.clamp(0, extent - 1);
    let end = end.clamp(start + 1, extent);

    (start as u32, end as u32)
}
