// Downloader module - probing, grading and relaying through yt-dlp

pub mod errors;
pub mod extractors;
pub mod format_selector;
pub mod models;
pub mod quality;
pub mod relay;
pub mod tools;
pub mod utils;

pub use errors::DownloadError;
pub use format_selector::FormatSelector;
pub use models::{AudioAnalysis, DownloadSelection, MediaKind, NormalizedVariant, ProbeResult, QualityTier};
pub use relay::{RelayMode, RelayStream, StreamingRelay, YtDlpFetcher};
pub use tools::{ToolInfo, ToolManager, ToolType};
