use crate::{config::ServiceConfig, metrics::ApiMetrics};
use detector::{Configuration, Predict, Predictor};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

/// The configuration and the predictor derived from it. Swapped as one unit.
#[derive(Debug, Clone)]
pub struct ActiveModel {
    pub config: Arc<Configuration>,
    pub predictor: Arc<Predictor>,
}

impl ActiveModel {
    pub fn from_config(config: Configuration) -> Self {
        let predictor = detector::select(Some(&config));
        Self {
            config: Arc::new(config),
            predictor: Arc::new(predictor),
        }
    }

    /// `"plug"` when the placeholder is active, otherwise the model path.
    pub fn identity(&self) -> &str {
        self.predictor.name()
    }
}

/// Shared service context. Empty until the first reload.
#[derive(Debug, Default)]
pub struct ServiceContext {
    active: RwLock<Option<ActiveModel>>,
}

impl ServiceContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `path`, derive its predictor and install the pair.
    ///
    /// Blocking: model construction may read large files. The new pair is
    /// built before the write lock is taken.
    pub fn reload(&self, path: &Path) -> ActiveModel {
        let active = ActiveModel::from_config(Configuration::load(path));
        self.install(active.clone());
        active
    }

    pub fn install(&self, active: ActiveModel) {
        let mut guard = self.active.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(active);
    }

    /// Clone of the current pair. The lock is released on return.
    pub fn snapshot(&self) -> Option<ActiveModel> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub context: Arc<ServiceContext>,
    pub settings: Arc<ServiceConfig>,
    pub metrics: ApiMetrics,
}

impl AppState {
    pub fn new(settings: ServiceConfig) -> Self {
        Self {
            context: Arc::new(ServiceContext::new()),
            settings: Arc::new(settings),
            metrics: ApiMetrics::new("logo-api"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_until_first_reload() {
        let context = ServiceContext::new();
        assert!(context.snapshot().is_none());
    }

    #[test]
    fn reload_of_missing_file_installs_fallback() {
        let context = ServiceContext::new();
        let active = context.reload(Path::new("/nonexistent/config.yaml"));

        assert!(active.config.use_plug());
        assert_eq!(active.identity(), "plug");

        let snapshot = context.snapshot().unwrap();
        assert!(Arc::ptr_eq(&snapshot.predictor, &active.predictor));
        assert!(Arc::ptr_eq(&snapshot.config, &active.config));
    }

    #[test]
    fn reload_replaces_pair_wholesale() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(b"model:\n  use_plug: true\n  confidence_threshold: 0.8\n")
            .unwrap();

        let context = ServiceContext::new();
        let first = context.reload(Path::new("/nonexistent/config.yaml"));
        let second = context.reload(file.path());

        assert!(!Arc::ptr_eq(&first.predictor, &second.predictor));
        let snapshot = context.snapshot().unwrap();
        assert!((snapshot.config.confidence_threshold() - 0.8).abs() < 1e-6);
    }

    #[test]
    fn snapshot_survives_later_swap() {
        let context = ServiceContext::new();
        context.install(ActiveModel::from_config(Configuration::fallback()));
        let held = context.snapshot().unwrap();

        context.install(ActiveModel::from_config(Configuration { model: None }));

        assert!(held.config.has_model_section());
        assert!(!context.snapshot().unwrap().config.has_model_section());
    }
}
