use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use super::routes::{analyze_audio, download, formats, home};
use super::state::ServerState;
use crate::config::RelayConfig;
use crate::downloader::extractors::{CliInfoExtractor, InfoExtractor};
use crate::downloader::relay::{StreamingRelay, YtDlpFetcher};
use crate::downloader::tools::ToolManager;

/// Any origin when `allowed_origins` is empty, otherwise exactly those
pub fn build_cors_layer(allowed_origins: &[String]) -> Result<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .expose_headers([header::CONTENT_DISPOSITION]);

    let origins = allowed_origins
        .iter()
        .map(|o| o.trim())
        .filter(|o| !o.is_empty())
        .map(|o| HeaderValue::from_str(o).with_context(|| format!("Invalid CORS origin: {}", o)))
        .collect::<Result<Vec<_>>>()?;

    if origins.is_empty() {
        return Ok(layer.allow_origin(Any));
    }

    Ok(layer.allow_origin(AllowOrigin::list(origins)))
}

pub fn make_app(state: ServerState) -> Result<Router> {
    let cors = build_cors_layer(&state.config.allowed_origins)?;

    Ok(Router::new()
        .route("/", get(home))
        .route("/formats", post(formats))
        .route("/download", post(download))
        .route("/analyze-audio", post(analyze_audio))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state))
}

pub async fn run_server(config: RelayConfig) -> Result<()> {
    let command = config.ytdlp_command();
    let extractor_config = config.extractor_config();

    let tools = ToolManager::with_paths(command.clone(), config.ffmpeg_location.clone())
        .get_all_tools()
        .await;
    if tools.iter().any(|t| !t.is_available) {
        warn!("Some external tools are missing; affected requests will fail");
    }

    let extractor: Arc<dyn InfoExtractor> = Arc::new(CliInfoExtractor::new(command.clone()));
    let fetcher = YtDlpFetcher::new(command, extractor_config)
        .with_audio_format(config.audio_format.clone(), config.audio_quality.clone())
        .with_ffmpeg_location(config.ffmpeg_location.clone());
    let relay = StreamingRelay::new(Arc::new(fetcher))
        .with_chunk_size(config.chunk_size)
        .with_audio_mode(config.audio_relay_mode)
        .with_temp_root(config.temp_dir.clone());

    let address = config.bind_address();
    info!(
        "Extractor: {} ({}), audio relay: {}, chunk size: {} bytes",
        extractor.name(),
        config.extractor_mode,
        config.audio_relay_mode,
        relay.chunk_size()
    );

    let state = ServerState::new(config, extractor, relay, tools);
    let app = make_app(state)?;

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("Listening on {}", address);

    Ok(axum::serve(listener, app).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_accepts_valid_origins() {
        assert!(build_cors_layer(&[]).is_ok());
        assert!(build_cors_layer(&["https://app.example".to_string()]).is_ok());
    }

    #[test]
    fn cors_rejects_garbage_origins() {
        assert!(build_cors_layer(&["bad\norigin".to_string()]).is_err());
    }
}
