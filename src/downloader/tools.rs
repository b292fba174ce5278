use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

use super::extractors::YtDlpCommand;

const VERSION_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ToolType {
    YtDlp,
    Ffmpeg,
}

impl ToolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "yt-dlp",
            ToolType::Ffmpeg => "ffmpeg",
        }
    }

    fn version_args(&self) -> &'static [&'static str] {
        match self {
            ToolType::YtDlp => &["--version"],
            ToolType::Ffmpeg => &["-version"], // single dash
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub tool_type: ToolType,
    pub version: Option<String>,
    /// Resolved program, followed by leading arguments when yt-dlp runs as a
    /// python module
    pub path: Option<String>,
    pub is_available: bool,
}

/// Finds the external tools the relay shells out to
#[derive(Debug, Clone)]
pub struct ToolManager {
    ytdlp: YtDlpCommand,
    ffmpeg_path: Option<String>,
}

impl ToolManager {
    /// `ytdlp` is the same invocation the extractor and relay use, so the
    /// report matches what requests will actually run
    pub fn with_paths(ytdlp: YtDlpCommand, ffmpeg_path: Option<String>) -> Self {
        Self { ytdlp, ffmpeg_path }
    }

    pub async fn get_tool_info(&self, tool_type: ToolType) -> ToolInfo {
        let program = self.detect_tool(tool_type).await;
        let version = match &program {
            Some(p) => self.get_version(p, tool_type).await,
            None => None,
        };
        let path = program.map(|p| {
            let mut parts = vec![p];
            parts.extend(self.leading_args(tool_type).iter().cloned());
            parts.join(" ")
        });

        match (&path, &version) {
            (Some(p), Some(v)) => info!("Found {} {} at {}", tool_type.as_str(), v, p),
            (Some(p), None) => warn!("{} at {} did not report a version", tool_type.as_str(), p),
            (None, _) => warn!("{} not found", tool_type.as_str()),
        }

        ToolInfo {
            name: tool_type.as_str().to_string(),
            tool_type,
            // A program that can't print the version is not usable either
            is_available: version.is_some(),
            version,
            path,
        }
    }

    pub async fn get_all_tools(&self) -> Vec<ToolInfo> {
        vec![
            self.get_tool_info(ToolType::YtDlp).await,
            self.get_tool_info(ToolType::Ffmpeg).await,
        ]
    }

    fn configured(&self, tool_type: ToolType) -> Option<&str> {
        match tool_type {
            ToolType::YtDlp => Some(self.ytdlp.program.as_str()).filter(|p| !p.is_empty()),
            ToolType::Ffmpeg => self.ffmpeg_path.as_deref(),
        }
    }

    fn leading_args(&self, tool_type: ToolType) -> &[String] {
        match tool_type {
            ToolType::YtDlp => &self.ytdlp.leading_args,
            ToolType::Ffmpeg => &[],
        }
    }

    /// File name to look for: `yt-dlp`, the python interpreter, or `ffmpeg`
    fn binary_name(&self, tool_type: ToolType) -> String {
        match tool_type {
            ToolType::YtDlp => Path::new(&self.ytdlp.program)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| tool_type.as_str().to_string()),
            ToolType::Ffmpeg => tool_type.as_str().to_string(),
        }
    }

    /// Candidate locations in lookup order, excluding `PATH`
    fn candidates(&self, tool_type: ToolType) -> Vec<PathBuf> {
        let binary_name = self.binary_name(tool_type);
        let mut candidates = Vec::new();

        if let Some(configured) = self.configured(tool_type) {
            let configured = PathBuf::from(configured);
            // ffmpeg location may name the directory holding the binary
            if configured.is_dir() {
                candidates.push(configured.join(&binary_name));
            } else if configured.components().count() > 1 {
                candidates.push(configured);
            }
        }

        for dir in ["/opt/homebrew/bin", "/usr/local/bin", "/usr/bin"] {
            candidates.push(Path::new(dir).join(&binary_name));
        }

        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join(".local").join("bin").join(&binary_name));
        }

        candidates
    }

    async fn detect_tool(&self, tool_type: ToolType) -> Option<String> {
        for path in self.candidates(tool_type) {
            if path.is_file() {
                return Some(path.to_string_lossy().into_owned());
            }
        }

        let lookup = self.binary_name(tool_type);
        let output = Command::new("which")
            .arg(&lookup)
            .stdin(Stdio::null())
            .output()
            .await
            .ok()?;

        if !output.status.success() {
            debug!("`which {}` found nothing", lookup);
            return None;
        }

        let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if path.is_empty() {
            None
        } else {
            Some(path)
        }
    }

    async fn get_version(&self, program: &str, tool_type: ToolType) -> Option<String> {
        let run = Command::new(program)
            .args(self.leading_args(tool_type))
            .args(tool_type.version_args())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        match timeout(Duration::from_secs(VERSION_TIMEOUT_SECS), run).await {
            Ok(Ok(output)) if output.status.success() => {
                let out = String::from_utf8_lossy(&output.stdout);
                parse_version(tool_type, &out)
            }
            _ => None,
        }
    }
}

/// First meaningful token of a tool's version banner
fn parse_version(tool_type: ToolType, output: &str) -> Option<String> {
    let first_line = output.lines().map(str::trim).find(|l| !l.is_empty())?;

    match tool_type {
        ToolType::YtDlp => Some(first_line.to_string()),
        // "ffmpeg version 6.1.1-3ubuntu5 Copyright (c) ..."
        ToolType::Ffmpeg => first_line
            .strip_prefix("ffmpeg version ")
            .and_then(|rest| rest.split_whitespace().next())
            .map(str::to_string)
            .or_else(|| Some(first_line.to_string())),
    }
}
