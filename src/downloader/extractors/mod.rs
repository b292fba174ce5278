// InfoExtractor module - metadata probing through yt-dlp
//
// Two invocation styles share one implementation:
// - CLI mode: native `yt-dlp` binary
// - Python mode: `python3 -m yt_dlp`
//
// Nothing here caches; every call is a fresh probe of the origin site.

mod cli;
mod diagnostics;
mod traits;

pub use cli::{CliInfoExtractor, YtDlpCommand};
pub use diagnostics::{diagnose_error, BlockingReason};
pub use traits::{ExtendedFormat, ExtendedVideoInfo, ExtractorConfig, ExtractorMode, InfoExtractor};
