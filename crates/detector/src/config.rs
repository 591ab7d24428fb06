use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
pub const DEFAULT_MODEL_PATH: &str = "models/best.onnx";
pub const DEFAULT_INPUT_SIZE: u32 = 640;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.7;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    NotFound(String),

    #[error("invalid configuration: {0}")]
    Invalid(#[from] config::ConfigError),
}

/// Colour order of the tensor fed to the detector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    #[default]
    Rgb,
    Bgr,
}

/// The `model` section of a configuration document.
///
/// Every key is optional in the document. Accessors on [`Configuration`]
/// resolve the defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelSection {
    #[serde(default = "default_use_plug")]
    pub use_plug: bool,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    #[serde(default = "default_input_size")]
    pub input_size: u32,
    #[serde(default = "default_iou_threshold")]
    pub iou_threshold: f32,
    #[serde(default)]
    pub channel_order: ChannelOrder,
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_use_plug() -> bool {
    true
}

fn default_confidence_threshold() -> f32 {
    DEFAULT_CONFIDENCE_THRESHOLD
}

fn default_input_size() -> u32 {
    DEFAULT_INPUT_SIZE
}

fn default_iou_threshold() -> f32 {
    DEFAULT_IOU_THRESHOLD
}

impl Default for ModelSection {
    fn default() -> Self {
        Self {
            use_plug: default_use_plug(),
            path: None,
            confidence_threshold: default_confidence_threshold(),
            input_size: default_input_size(),
            iou_threshold: default_iou_threshold(),
            channel_order: ChannelOrder::default(),
            seed: None,
        }
    }
}

impl ModelSection {
    pub fn model_path(&self) -> &str {
        self.path.as_deref().unwrap_or(DEFAULT_MODEL_PATH)
    }
}

/// A loaded configuration document. Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub model: Option<ModelSection>,
}

impl Configuration {
    /// The configuration used whenever a document cannot be loaded:
    /// placeholder predictor, threshold 0.5.
    pub fn fallback() -> Self {
        Self {
            model: Some(ModelSection::default()),
        }
    }

    /// Load a YAML document, substituting [`Configuration::fallback`] on any failure.
    ///
    /// Never fails. The failure is logged.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::try_load(path) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "Loaded configuration");
                tracing::debug!(config = ?config, "Configuration content");
                config
            }
            Err(e) => {
                tracing::error!(
                    path = %path.display(),
                    error = %e,
                    "Failed to load configuration, using built-in default"
                );
                Self::fallback()
            }
        }
    }

    pub fn try_load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let config = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Yaml))
            .build()?;

        Ok(config.try_deserialize::<Configuration>()?)
    }

    pub fn has_model_section(&self) -> bool {
        self.model.is_some()
    }

    pub fn use_plug(&self) -> bool {
        self.model.as_ref().is_none_or(|model| model.use_plug)
    }

    pub fn model_path(&self) -> &str {
        self.model
            .as_ref()
            .map_or(DEFAULT_MODEL_PATH, ModelSection::model_path)
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.model
            .as_ref()
            .map_or(DEFAULT_CONFIDENCE_THRESHOLD, |model| model.confidence_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn yaml_file(content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_full_model_section() {
        let file = yaml_file(
            "model:\n  use_plug: false\n  path: models/logo.onnx\n  confidence_threshold: 0.35\n",
        );

        let config = Configuration::try_load(file.path()).unwrap();

        assert!(!config.use_plug());
        assert_eq!(config.model_path(), "models/logo.onnx");
        assert!((config.confidence_threshold() - 0.35).abs() < 1e-6);
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let file = yaml_file("model:\n  path: models/logo.onnx\n");

        let config = Configuration::try_load(file.path()).unwrap();
        let model = config.model.as_ref().unwrap();

        assert!(model.use_plug, "use_plug defaults to true");
        assert_eq!(model.confidence_threshold, DEFAULT_CONFIDENCE_THRESHOLD);
        assert_eq!(model.input_size, DEFAULT_INPUT_SIZE);
        assert_eq!(model.channel_order, ChannelOrder::Rgb);
        assert_eq!(model.seed, None);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let file = yaml_file(
            "model:\n  use_plug: true\n  vendor: acme\nserver:\n  workers: 4\n",
        );

        let config = Configuration::try_load(file.path()).unwrap();
        assert!(config.use_plug());
    }

    #[test]
    fn document_without_model_section_loads_without_it() {
        let file = yaml_file("logging:\n  level: debug\n");

        let config = Configuration::try_load(file.path()).unwrap();

        assert!(!config.has_model_section());
        assert!(config.use_plug());
        assert_eq!(config.confidence_threshold(), DEFAULT_CONFIDENCE_THRESHOLD);
    }

    #[test]
    fn missing_file_falls_back_to_default() {
        let config = Configuration::load("/definitely/not/here.yaml");

        assert_eq!(config, Configuration::fallback());
        assert!(config.use_plug());
        assert_eq!(config.confidence_threshold(), 0.5);
    }

    #[test]
    fn malformed_document_falls_back_to_default() {
        let file = yaml_file("model: [use_plug: false\n  : : :\n");

        let config = Configuration::load(file.path());

        assert_eq!(config, Configuration::fallback());
    }

    #[test]
    fn wrongly_typed_value_falls_back_to_default() {
        let file = yaml_file("model:\n  use_plug: false\n  confidence_threshold: high\n");

        assert!(Configuration::try_load(file.path()).is_err());
        assert_eq!(Configuration::load(file.path()), Configuration::fallback());
    }

    #[test]
    fn try_load_reports_missing_file() {
        let err = Configuration::try_load("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn bgr_channel_order_is_parsed() {
        let file = yaml_file("model:\n  channel_order: bgr\n  seed: 7\n");

        let config = Configuration::try_load(file.path()).unwrap();
        let model = config.model.unwrap();

        assert_eq!(model.channel_order, ChannelOrder::Bgr);
        assert_eq!(model.seed, Some(7));
    }
}
