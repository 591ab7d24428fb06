use crate::{
    error::ApiError,
    render,
    state::{ActiveModel, AppState},
};
use anyhow::Context;
use axum::{
    Json,
    body::Bytes,
    extract::{
        Multipart, Query, State,
        multipart::MultipartRejection,
        rejection::QueryRejection,
    },
    http::header,
    response::{IntoResponse, Response},
};
use detector::{Detection, Predict};
use serde::{Deserialize, Serialize};
use std::time::Instant;

pub const SUPPORTED_IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/bmp", "image/webp"];

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub model: String,
    pub confidence: f32,
    pub use_plug: bool,
    pub config_file: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: u32,
    pub y_min: u32,
    pub x_max: u32,
    pub y_max: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DetectionItem {
    pub bbox: BoundingBox,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DetectionResponse {
    pub detections: Vec<DetectionItem>,
}

impl From<&[Detection]> for DetectionResponse {
    fn from(detections: &[Detection]) -> Self {
        Self {
            detections: detections
                .iter()
                .map(|d| DetectionItem {
                    bbox: BoundingBox {
                        x_min: d.x_min,
                        y_min: d.y_min,
                        x_max: d.x_max,
                        y_max: d.y_max,
                    },
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub config_loaded: bool,
    pub predictor_loaded: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct DetectQuery {
    #[serde(default, deserialize_with = "query_flag")]
    pub return_image: bool,
    pub confidence: Option<f32>,
}

/// Accepts `true/false`, `1/0`, `yes/no` and `on/off`, case-insensitively.
fn query_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(serde::de::Error::invalid_value(
            serde::de::Unexpected::Str(&raw),
            &"a boolean flag",
        )),
    }
}

struct Upload {
    file_name: Option<String>,
    data: Bytes,
}

/// Read the first multipart field called `name`. When `accepted` is given,
/// the field's content type is checked before its body is read.
async fn read_upload(
    multipart: &mut Multipart,
    name: &'static str,
    accepted: Option<&[&str]>,
) -> Result<Upload, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(name) {
            continue;
        }

        if let Some(accepted) = accepted {
            let content_type = field.content_type();
            if !content_type.is_some_and(|ct| accepted.contains(&ct)) {
                return Err(ApiError::UnsupportedMediaType {
                    content_type: content_type.map(str::to_owned),
                });
            }
        }

        let file_name = field.file_name().map(str::to_owned);
        let data = field.bytes().await?;
        return Ok(Upload { file_name, data });
    }

    Err(ApiError::MissingField(name))
}

#[tracing::instrument(name = "set_config", skip_all)]
pub async fn set_config(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ConfigResponse>, ApiError> {
    let mut multipart = multipart?;
    let upload = read_upload(&mut multipart, "config_file", None).await?;
    let path = state.settings.upload_config.clone();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    tokio::fs::write(&path, &upload.data)
        .await
        .with_context(|| format!("writing {}", path.display()))?;

    tracing::info!(
        path = %path.display(),
        file_name = ?upload.file_name,
        bytes = upload.data.len(),
        "Stored uploaded configuration"
    );

    let context = state.context.clone();
    let active = tokio::task::spawn_blocking(move || context.reload(&path))
        .await
        .context("configuration reload task failed")?;

    state.metrics.record_reload(active.predictor.is_placeholder());
    tracing::info!(predictor = %active.identity(), "Configuration reloaded");

    if !active.config.has_model_section() {
        return Err(ApiError::ConfigIncomplete);
    }

    Ok(Json(ConfigResponse {
        model: active.identity().to_string(),
        confidence: active.config.confidence_threshold(),
        use_plug: active.config.use_plug(),
        config_file: upload.file_name,
    }))
}

enum DetectOutcome {
    Boxes(Vec<Detection>),
    Jpeg { bytes: Vec<u8>, detections: usize },
}

fn run_detection(
    active: &ActiveModel,
    data: &[u8],
    confidence: f32,
    return_image: bool,
) -> anyhow::Result<DetectOutcome> {
    let image = {
        let _span = common::span_debug!("decode_image");
        image::load_from_memory(data)
            .context("decoding uploaded image")?
            .to_rgb8()
    };

    let detections = active.predictor.predict(&image, confidence)?;

    if return_image {
        let _span = common::span!("render_image");
        let bytes = render::render_jpeg(&image, &detections)?;
        Ok(DetectOutcome::Jpeg {
            bytes,
            detections: detections.len(),
        })
    } else {
        Ok(DetectOutcome::Boxes(detections))
    }
}

#[tracing::instrument(name = "detect", skip_all)]
pub async fn detect(
    State(state): State<AppState>,
    query: Result<Query<DetectQuery>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let mut multipart = multipart?;
    let upload = read_upload(&mut multipart, "file", Some(SUPPORTED_IMAGE_TYPES.as_slice())).await?;

    let started = Instant::now();
    let result = detect_upload(&state, upload.data, &query).await;

    match result {
        Ok(outcome) => {
            let elapsed = started.elapsed().as_secs_f64();
            Ok(match outcome {
                DetectOutcome::Boxes(detections) => {
                    state
                        .metrics
                        .record_detect(elapsed, detections.len(), false);
                    Json(DetectionResponse::from(detections.as_slice())).into_response()
                }
                DetectOutcome::Jpeg { bytes, detections } => {
                    state.metrics.record_detect(elapsed, detections, true);
                    ([(header::CONTENT_TYPE, "image/jpeg")], bytes).into_response()
                }
            })
        }
        Err(e) => {
            state.metrics.record_detect_failure();
            Err(e)
        }
    }
}

async fn detect_upload(
    state: &AppState,
    data: Bytes,
    query: &DetectQuery,
) -> Result<DetectOutcome, ApiError> {
    let active = state.context.snapshot().ok_or(ApiError::NotLoaded)?;
    let confidence = query
        .confidence
        .unwrap_or_else(|| active.config.confidence_threshold());
    let return_image = query.return_image;

    tracing::debug!(
        confidence,
        predictor = %active.identity(),
        bytes = data.len(),
        "Running detection"
    );

    let outcome = tokio::task::spawn_blocking(move || {
        run_detection(&active, &data, confidence, return_image)
    })
    .await
    .context("detection task failed")??;

    Ok(outcome)
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let active = state.context.snapshot();
    Json(HealthResponse {
        status: "healthy".to_string(),
        config_loaded: active.is_some(),
        predictor_loaded: active.is_some(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(query: &str) -> Result<DetectQuery, QueryRejection> {
        let uri: axum::http::Uri = format!("/detect?{query}").parse().unwrap();
        Query::<DetectQuery>::try_from_uri(&uri).map(|Query(query)| query)
    }

    #[test]
    fn return_image_accepts_common_flag_spellings() {
        for raw in ["true", "True", "1", "yes", "ON"] {
            assert!(parse(&format!("return_image={raw}")).unwrap().return_image, "{raw}");
        }
        for raw in ["false", "0", "no", "Off"] {
            assert!(!parse(&format!("return_image={raw}")).unwrap().return_image, "{raw}");
        }
    }

    #[test]
    fn return_image_defaults_to_false() {
        let query = parse("confidence=0.25").unwrap();
        assert!(!query.return_image);
        assert_eq!(query.confidence, Some(0.25));
    }

    #[test]
    fn unknown_flag_is_rejected() {
        assert!(parse("return_image=maybe").is_err());
    }
}
