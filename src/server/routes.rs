use std::time::Duration;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use tracing::{debug, info};

use super::error::ApiError;
use super::state::ServerState;
use crate::downloader::format_selector::{FormatSelector, BEST_AUDIO_ID};
use crate::downloader::models::{AudioAnalysis, DownloadSelection, MediaKind, ProbeResult};
use crate::downloader::quality;
use crate::downloader::tools::ToolInfo;
use crate::downloader::utils::content_disposition;

const SERVICE_NAME: &str = "ytdlp-relay";

#[derive(Serialize)]
pub struct ServiceStatus {
    service: &'static str,
    version: &'static str,
    started_at: String,
    uptime: String,
    tools: Vec<ToolInfo>,
}

#[derive(Deserialize, Debug)]
pub struct FormatsBody {
    pub url: String,
    #[serde(rename = "type")]
    pub media_kind: MediaKind,
}

#[derive(Deserialize, Debug)]
pub struct DownloadBody {
    pub url: String,
    pub format_id: String,
    #[serde(rename = "type")]
    pub media_kind: MediaKind,
}

#[derive(Deserialize, Debug)]
pub struct AnalyzeAudioBody {
    pub url: String,
    pub format_id: String,
}

#[derive(Serialize)]
pub struct AnalyzeAudioResponse {
    analysis: AudioAnalysis,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

fn required<'a>(name: &str, value: &'a str) -> Result<&'a str, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::bad_request(format!("{} is required", name)));
    }
    Ok(value)
}

pub async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let started_at = state
        .started_at
        .format(&Rfc3339)
        .unwrap_or_default();

    Json(ServiceStatus {
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        started_at,
        uptime: format_uptime(state.start_time.elapsed()),
        tools: state.tools.as_ref().clone(),
    })
}

pub async fn formats(
    State(state): State<ServerState>,
    body: Result<Json<FormatsBody>, JsonRejection>,
) -> Result<Json<ProbeResult>, ApiError> {
    let Json(body) = body?;
    let url = required("url", &body.url)?;

    let info = state
        .extractor
        .extract(url, &state.extractor_config)
        .await
        .map_err(ApiError::from_probe)?;

    let result = FormatSelector::build_probe_result(body.media_kind, &info);
    info!(
        "Listed {} {} variants for '{}'",
        result.variants.len(),
        body.media_kind,
        result.title
    );
    Ok(Json(result))
}

pub async fn download(
    State(state): State<ServerState>,
    body: Result<Json<DownloadBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    let selection = DownloadSelection {
        url: required("url", &body.url)?.to_string(),
        variant_id: required("format_id", &body.format_id)?.to_string(),
        media_kind: body.media_kind,
    };

    let relay = state
        .relay
        .open(&selection)
        .await
        .map_err(ApiError::from_relay)?;

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, relay.content_type);

    if let Some(file_name) = &relay.file_name {
        match HeaderValue::from_str(&content_disposition(file_name)) {
            Ok(value) => response = response.header(header::CONTENT_DISPOSITION, value),
            Err(e) => debug!("Skipping Content-Disposition for '{}': {}", file_name, e),
        }
    }

    response
        .body(Body::from_stream(relay.body))
        .map_err(|e| ApiError::internal(e.to_string()))
}

pub async fn analyze_audio(
    State(state): State<ServerState>,
    body: Result<Json<AnalyzeAudioBody>, JsonRejection>,
) -> Result<Json<AnalyzeAudioResponse>, ApiError> {
    let Json(body) = body?;
    let url = required("url", &body.url)?;
    let format_id = required("format_id", &body.format_id)?;

    // Fresh probe; earlier listings are not remembered
    let info = state
        .extractor
        .extract(url, &state.extractor_config)
        .await
        .map_err(ApiError::from_probe)?;

    // The synthetic entry stands for the top ranked real variant
    let target_id = if format_id == BEST_AUDIO_ID {
        FormatSelector::build_probe_result(MediaKind::Audio, &info)
            .variants
            .get(1)
            .map(|v| v.id.clone())
            .unwrap_or_default()
    } else {
        format_id.to_string()
    };

    let format = info
        .find_format(&target_id)
        .ok_or_else(|| ApiError::not_found("Format not found"))?;

    let codec = format
        .acodec
        .clone()
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| "unknown".to_string());
    let reported = format.abr.filter(|b| b.is_finite() && *b > 0.0).unwrap_or(0.0);
    let estimate = quality::classify(format.abr, &codec);

    let note = estimate.estimated.then(|| {
        format!(
            "{} did not report a bitrate; {} kbps was assumed",
            codec, estimate.effective_bitrate
        )
    });

    Ok(Json(AnalyzeAudioResponse {
        analysis: AudioAnalysis {
            quality: estimate.tier,
            bitrate: reported,
            sample_rate: format.asr.unwrap_or(0),
            codec,
            bitrate_estimated: estimate.estimated,
            note,
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uptime_is_human_readable() {
        assert_eq!(format_uptime(Duration::from_secs(0)), "0d 00:00:00");
        assert_eq!(format_uptime(Duration::from_secs(90_061)), "1d 01:01:01");
    }

    #[test]
    fn blank_fields_are_rejected() {
        assert!(required("url", "  ").is_err());
        assert_eq!(required("url", " https://x ").unwrap(), "https://x");
    }
}
