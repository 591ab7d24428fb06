pub mod model;
pub mod placeholder;

use crate::{config::Configuration, detection::Detection};
use image::RgbImage;

pub use model::ModelPredictor;
pub use placeholder::PlaceholderPredictor;

/// Identity reported for the placeholder strategy.
pub const PLACEHOLDER_NAME: &str = "plug";

/// A detection strategy.
pub trait Predict: Send + Sync {
    fn predict(
        &self,
        image: &RgbImage,
        confidence_threshold: f32,
    ) -> anyhow::Result<Vec<Detection>>;

    /// Human-readable identity, used in logs and API summaries.
    fn name(&self) -> &str;
}

/// The strategies a configuration can resolve to.
pub enum Predictor {
    Placeholder(PlaceholderPredictor),
    Model(ModelPredictor),
}

impl Predictor {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Predictor::Placeholder(_))
    }
}

impl Predict for Predictor {
    fn predict(
        &self,
        image: &RgbImage,
        confidence_threshold: f32,
    ) -> anyhow::Result<Vec<Detection>> {
        match self {
            Predictor::Placeholder(p) => p.predict(image, confidence_threshold),
            Predictor::Model(p) => p.predict(image, confidence_threshold),
        }
    }

    fn name(&self) -> &str {
        match self {
            Predictor::Placeholder(p) => p.name(),
            Predictor::Model(p) => p.name(),
        }
    }
}

impl std::fmt::Debug for Predictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Predictor").field(&self.name()).finish()
    }
}

/// Resolve the strategy for a configuration.
///
/// Placeholder when there is no configuration, no `model` section, or
/// `use_plug` is set. Otherwise the model at `model.path`; if it cannot be
/// constructed the failure is logged and the placeholder is used instead.
pub fn select(config: Option<&Configuration>) -> Predictor {
    let Some(config) = config else {
        tracing::info!("No configuration loaded, using placeholder predictor");
        return Predictor::Placeholder(PlaceholderPredictor::new());
    };

    let Some(model) = config.model.as_ref() else {
        tracing::info!("Configuration has no model section, using placeholder predictor");
        return Predictor::Placeholder(PlaceholderPredictor::new());
    };

    if model.use_plug {
        tracing::info!("use_plug is set, using placeholder predictor");
        return Predictor::Placeholder(PlaceholderPredictor::from_section(model));
    }

    match ModelPredictor::load(model) {
        Ok(predictor) => {
            tracing::info!(model_path = %predictor.name(), "Using model predictor");
            Predictor::Model(predictor)
        }
        Err(e) => {
            tracing::warn!(
                model_path = %model.model_path(),
                error = %e,
                "Failed to load detector model, falling back to placeholder predictor"
            );
            Predictor::Placeholder(PlaceholderPredictor::from_section(model))
        }
    }
}
