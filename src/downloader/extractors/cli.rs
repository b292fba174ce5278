// yt-dlp metadata probe
//
// Runs `yt-dlp --dump-json` (or `python3 -m yt_dlp --dump-json`) once per
// request and parses the single JSON document it prints.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::diagnostics::diagnose_error;
use super::traits::{ExtendedFormat, ExtendedVideoInfo, ExtractorConfig, ExtractorMode, InfoExtractor};
use crate::downloader::errors::DownloadError;
use crate::downloader::utils::{concise_error, run_output_with_timeout};

/// How to start yt-dlp: program plus leading arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YtDlpCommand {
    pub program: String,
    pub leading_args: Vec<String>,
}

impl YtDlpCommand {
    pub fn binary(path: impl Into<String>) -> Self {
        Self {
            program: path.into(),
            leading_args: Vec::new(),
        }
    }

    pub fn python_module(python: impl Into<String>) -> Self {
        Self {
            program: python.into(),
            leading_args: vec!["-m".to_string(), "yt_dlp".to_string()],
        }
    }

    pub fn for_mode(mode: ExtractorMode, ytdlp_path: &str, python: &str) -> Self {
        match mode {
            ExtractorMode::Cli => Self::binary(ytdlp_path),
            ExtractorMode::Python => Self::python_module(python),
        }
    }

    /// Leading args followed by `args`
    pub fn args_with(&self, args: Vec<String>) -> Vec<String> {
        let mut all = self.leading_args.clone();
        all.extend(args);
        all
    }
}

/// CLI-based info extractor
pub struct CliInfoExtractor {
    command: YtDlpCommand,
}

impl CliInfoExtractor {
    pub fn new(command: YtDlpCommand) -> Self {
        Self { command }
    }

    /// Build command arguments
    fn build_args(&self, url: &str, config: &ExtractorConfig) -> Vec<String> {
        let mut args = vec![
            "--dump-json".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
        ];
        args.extend(config.network_args());
        args.push("--".to_string());
        args.push(url.to_string());

        self.command.args_with(args)
    }

    /// Parse the `--dump-json` document
    pub fn parse_json(stdout: &[u8]) -> Result<ExtendedVideoInfo, DownloadError> {
        let json: serde_json::Value = serde_json::from_slice(stdout)
            .map_err(|e| DownloadError::ParseError(format!("Invalid JSON: {}", e)))?;

        let formats = Self::parse_formats(&json)?;

        Ok(ExtendedVideoInfo {
            title: json["title"].as_str().unwrap_or("Video").to_string(),
            formats,
        })
    }

    fn parse_formats(json: &serde_json::Value) -> Result<Vec<ExtendedFormat>, DownloadError> {
        let formats_array = json["formats"]
            .as_array()
            .ok_or_else(|| DownloadError::ParseError("No formats array in JSON".to_string()))?;

        let formats = formats_array
            .iter()
            .filter_map(|f| {
                // Entries without an id cannot be selected later
                let format_id = f["format_id"].as_str()?.to_string();

                Some(ExtendedFormat {
                    format_id,
                    ext: f["ext"].as_str().map(|s| s.to_string()),
                    resolution: f["resolution"].as_str().map(|s| s.to_string()),
                    width: f["width"].as_f64().map(|w| w as u32),
                    height: f["height"].as_f64().map(|h| h as u32),
                    vcodec: f["vcodec"].as_str().map(|s| s.to_string()),
                    acodec: f["acodec"].as_str().map(|s| s.to_string()),
                    filesize: f["filesize"].as_f64().map(|s| s as u64),
                    filesize_approx: f["filesize_approx"].as_f64().map(|s| s as u64),
                    abr: f["abr"].as_f64(),
                    asr: f["asr"].as_f64().map(|a| a as u32),
                    format_note: f["format_note"].as_str().map(|s| s.to_string()),
                })
            })
            .collect();

        Ok(formats)
    }
}

#[async_trait]
impl InfoExtractor for CliInfoExtractor {
    fn name(&self) -> &'static str {
        "cli-yt-dlp"
    }

    async fn extract(
        &self,
        url: &str,
        config: &ExtractorConfig,
    ) -> Result<ExtendedVideoInfo, DownloadError> {
        let args = self.build_args(url, config);
        debug!("Probing {} with {} {}", url, self.command.program, args.join(" "));

        let output = run_output_with_timeout(&self.command.program, args, config.probe_timeout_seconds).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = concise_error(&stderr);
            warn!(
                "Probe of {} failed ({:?}): {}",
                url,
                diagnose_error(&stderr),
                message
            );
            return Err(DownloadError::from(message));
        }

        let info = Self::parse_json(&output.stdout)?;
        info!("Probed '{}': {} raw formats", info.title, info.formats.len());
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "id": "X",
        "title": "Sample clip",
        "formats": [
            {"format_id": "249", "ext": "webm", "vcodec": "none", "acodec": "opus",
             "abr": 0, "asr": 48000, "filesize": 1200000, "format_note": "low"},
            {"format_id": "140", "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.2",
             "abr": 129.5, "asr": 44100, "filesize_approx": 3400000.0},
            {"format_id": "137", "ext": "mp4", "vcodec": "avc1.640028", "acodec": "none",
             "width": 1920, "height": 1080, "resolution": "1920x1080", "tbr": 4400.1},
            {"ext": "mhtml", "vcodec": "none", "acodec": "none"}
        ]
    }"#;

    #[test]
    fn parses_dump_json() {
        let info = CliInfoExtractor::parse_json(SAMPLE.as_bytes()).unwrap();

        assert_eq!(info.title, "Sample clip");
        assert_eq!(info.formats.len(), 3);

        let opus = info.find_format("249").unwrap();
        assert_eq!(opus.abr, Some(0.0));
        assert_eq!(opus.asr, Some(48000));
        assert!(opus.is_audio_only());

        let aac = info.find_format("140").unwrap();
        assert_eq!(aac.effective_size(), Some(3_400_000));

        let video = info.find_format("137").unwrap();
        assert_eq!(video.height, Some(1080));
        assert!(video.has_video());
    }

    #[test]
    fn rejects_documents_without_formats() {
        let err = CliInfoExtractor::parse_json(br#"{"title": "x"}"#).unwrap_err();
        assert!(matches!(err, DownloadError::ParseError(_)));
    }

    #[test]
    fn rejects_garbage() {
        let err = CliInfoExtractor::parse_json(b"not json").unwrap_err();
        assert!(matches!(err, DownloadError::ParseError(_)));
    }

    #[test]
    fn python_mode_prefixes_module_args() {
        let extractor = CliInfoExtractor::new(YtDlpCommand::python_module("python3"));
        let config = ExtractorConfig::default().with_prefer_ipv4(true);
        let args = extractor.build_args("https://example.com/watch?v=X", &config);

        assert_eq!(&args[..3], &["-m", "yt_dlp", "--dump-json"]);
        assert!(args.contains(&"--force-ipv4".to_string()));
        assert_eq!(args.last().unwrap(), "https://example.com/watch?v=X");
    }

    #[tokio::test]
    async fn missing_binary_is_reported_as_tool_not_found() {
        let extractor = CliInfoExtractor::new(YtDlpCommand::binary("/nonexistent/yt-dlp"));
        let err = extractor
            .extract("https://example.com", &ExtractorConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::ToolNotFound(_)));
    }
}
