use clap::Parser;
use std::path::PathBuf;

use crate::downloader::extractors::{ExtractorConfig, ExtractorMode, YtDlpCommand};
use crate::downloader::relay::{RelayMode, DEFAULT_CHUNK_SIZE};

/// Runtime configuration, read once at startup from flags and environment.
#[derive(Parser, Debug, Clone)]
#[clap(name = "ytdlp-relay", version, about)]
pub struct RelayConfig {
    /// Address to bind.
    #[clap(long, env = "RELAY_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// The port to listen on.
    #[clap(short, long, env = "RELAY_PORT", default_value_t = 5000)]
    pub port: u16,

    /// yt-dlp executable, a path or a name looked up in PATH.
    #[clap(long, env = "YTDLP_PATH", default_value = "yt-dlp")]
    pub ytdlp_path: String,

    /// Run yt-dlp as a native binary or as a python module.
    #[clap(long, env = "EXTRACTOR_MODE", value_enum, default_value_t = ExtractorMode::Cli)]
    pub extractor_mode: ExtractorMode,

    /// Python interpreter used in python mode.
    #[clap(long, env = "RELAY_PYTHON", default_value = "python3")]
    pub python: String,

    /// ffmpeg binary or directory, passed to yt-dlp as --ffmpeg-location.
    #[clap(long, env = "FFMPEG_LOCATION")]
    pub ffmpeg_location: Option<String>,

    /// yt-dlp socket timeout in seconds.
    #[clap(long, env = "SOCKET_TIMEOUT", default_value_t = 30)]
    pub socket_timeout: u32,

    /// Overall limit for one metadata probe in seconds.
    #[clap(long, env = "PROBE_TIMEOUT", default_value_t = 60)]
    pub probe_timeout: u64,

    /// Force yt-dlp to use IPv4.
    #[clap(long, env = "PREFER_IPV4")]
    pub prefer_ipv4: bool,

    /// Proxy URL handed to yt-dlp.
    #[clap(long, env = "RELAY_PROXY")]
    pub proxy: Option<String>,

    /// How audio downloads are relayed. Video always pipes.
    #[clap(long, env = "AUDIO_RELAY_MODE", value_enum, default_value_t = RelayMode::Materialize)]
    pub audio_relay_mode: RelayMode,

    /// Target format of materialized audio.
    #[clap(long, env = "AUDIO_FORMAT", default_value = "mp3")]
    pub audio_format: String,

    /// Target quality of materialized audio.
    #[clap(long, env = "AUDIO_QUALITY", default_value = "320K")]
    pub audio_quality: String,

    /// Maximum size of one relayed chunk in bytes.
    #[clap(long, env = "RELAY_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Parent directory for temporary work dirs, system temp dir if unset.
    #[clap(long, env = "RELAY_TEMP_DIR")]
    pub temp_dir: Option<PathBuf>,

    /// Allowed CORS origins, comma separated. Any origin when empty.
    #[clap(long, env = "ALLOWED_ORIGINS", value_delimiter = ',')]
    pub allowed_origins: Vec<String>,
}

impl RelayConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn extractor_config(&self) -> ExtractorConfig {
        ExtractorConfig::default()
            .with_proxy(self.proxy.clone())
            .with_socket_timeout(self.socket_timeout)
            .with_probe_timeout(self.probe_timeout)
            .with_prefer_ipv4(self.prefer_ipv4)
    }

    pub fn ytdlp_command(&self) -> YtDlpCommand {
        YtDlpCommand::for_mode(self.extractor_mode, &self.ytdlp_path, &self.python)
    }
}
