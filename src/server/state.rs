use std::sync::Arc;
use std::time::Instant;

use time::OffsetDateTime;

use crate::config::RelayConfig;
use crate::downloader::extractors::{ExtractorConfig, InfoExtractor};
use crate::downloader::relay::StreamingRelay;
use crate::downloader::tools::ToolInfo;

/// Shared, read-only state handed to every handler
#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<RelayConfig>,
    pub extractor_config: Arc<ExtractorConfig>,
    pub extractor: Arc<dyn InfoExtractor>,
    pub relay: Arc<StreamingRelay>,
    pub tools: Arc<Vec<ToolInfo>>,
    pub start_time: Instant,
    pub started_at: OffsetDateTime,
}

impl ServerState {
    pub fn new(
        config: RelayConfig,
        extractor: Arc<dyn InfoExtractor>,
        relay: StreamingRelay,
        tools: Vec<ToolInfo>,
    ) -> Self {
        Self {
            extractor_config: Arc::new(config.extractor_config()),
            config: Arc::new(config),
            extractor,
            relay: Arc::new(relay),
            tools: Arc::new(tools),
            start_time: Instant::now(),
            started_at: OffsetDateTime::now_utc(),
        }
    }
}
