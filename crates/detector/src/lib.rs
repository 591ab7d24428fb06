pub mod backend;
pub mod config;
pub mod detection;
pub mod predictor;
pub mod processing;

// Re-export commonly used types for convenience
pub use config::{ChannelOrder, ConfigError, Configuration, ModelSection};
pub use detection::Detection;
pub use predictor::{Predict, Predictor, select};
