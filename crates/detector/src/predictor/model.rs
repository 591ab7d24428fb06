use super::Predict;
use crate::{
    backend::{self, InferenceBackend, InferenceOutput},
    config::ModelSection,
    detection::Detection,
    processing::{
        post::{PostProcessor, TransformParams},
        pre::PreProcessor,
    },
};
use image::RgbImage;
use std::sync::{Mutex, PoisonError};

struct Pipeline {
    backend: Box<dyn InferenceBackend>,
    preprocessor: PreProcessor,
}

/// Adapter around a trained detector.
///
/// Inference needs exclusive access to the session and the preprocessing
/// buffers, so concurrent requests are serialized on one lock.
pub struct ModelPredictor {
    model_path: String,
    pipeline: Mutex<Pipeline>,
    postprocessor: PostProcessor,
}

impl ModelPredictor {
    /// Load the model named by the section with the backend compiled into this build.
    ///
    /// The section is validated before the model file is touched.
    pub fn load(section: &ModelSection) -> anyhow::Result<Self> {
        let model_path = section.model_path().to_string();
        let preprocessor = PreProcessor::new(section.input_size, section.channel_order)?;
        tracing::info!(model_path = %model_path, "Loading detector model");

        let backend = backend::load_default(&model_path)?;
        Ok(Self::from_parts(model_path, backend, preprocessor, section))
    }

    pub fn with_backend(
        model_path: String,
        backend: Box<dyn InferenceBackend>,
        section: &ModelSection,
    ) -> anyhow::Result<Self> {
        let preprocessor = PreProcessor::new(section.input_size, section.channel_order)?;
        Ok(Self::from_parts(model_path, backend, preprocessor, section))
    }

    fn from_parts(
        model_path: String,
        backend: Box<dyn InferenceBackend>,
        preprocessor: PreProcessor,
        section: &ModelSection,
    ) -> Self {
        Self {
            model_path,
            pipeline: Mutex::new(Pipeline {
                backend,
                preprocessor,
            }),
            postprocessor: PostProcessor::new(section.iou_threshold),
        }
    }
}

impl Predict for ModelPredictor {
    #[tracing::instrument(name = "model_predict", skip(self, image), fields(model = %self.model_path))]
    fn predict(
        &self,
        image: &RgbImage,
        confidence_threshold: f32,
    ) -> anyhow::Result<Vec<Detection>> {
        let (width, height) = image.dimensions();

        let (InferenceOutput { predictions }, letterbox) = {
            let mut pipeline = self.pipeline.lock().unwrap_or_else(PoisonError::into_inner);
            let (input, letterbox) = pipeline.preprocessor.preprocess(image)?;

            let _infer_span = tracing::info_span!("model_inference").entered();
            (pipeline.backend.infer(&input)?, letterbox)
        };

        let transform = TransformParams {
            orig_width: width,
            orig_height: height,
            letterbox,
        };

        self.postprocessor
            .parse_detections(&predictions.view(), confidence_threshold, &transform)
    }

    fn name(&self) -> &str {
        &self.model_path
    }
}
