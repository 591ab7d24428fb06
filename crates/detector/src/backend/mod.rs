use ndarray::{Array, ArrayD, IxDyn};

#[cfg(feature = "ort-backend")]
pub mod ort;

pub trait InferenceBackend: Send {
    fn load_model(path: &str) -> anyhow::Result<Self>
    where
        Self: Sized;

    /// Run inference on a `[1, 3, H, W]` tensor scaled to `[0, 1]`.
    fn infer(&mut self, images: &Array<f32, IxDyn>) -> anyhow::Result<InferenceOutput>;
}

pub struct InferenceOutput {
    /// `[1, 4 + num_classes, num_candidates]`, boxes as cxcywh in input pixels.
    pub predictions: ArrayD<f32>,
}

/// Load the backend compiled into this build.
pub fn load_default(path: &str) -> anyhow::Result<Box<dyn InferenceBackend>> {
    #[cfg(feature = "ort-backend")]
    {
        Ok(Box::new(ort::OrtBackend::load_model(path)?))
    }

    #[cfg(not(feature = "ort-backend"))]
    {
        anyhow::bail!(
            "no inference backend compiled in (enable the `ort-backend` feature) to load {}",
            path
        )
    }
}
