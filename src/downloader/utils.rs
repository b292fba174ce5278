// Helper functions shared by the extractor and the relay

use lazy_static::lazy_static;
use regex::Regex;
use std::io::ErrorKind;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command as TokioCommand;
use tokio::time::{timeout, Duration};
use tracing::warn;

use crate::downloader::errors::DownloadError;

lazy_static! {
    static ref ERROR_LINE_RE: Regex = Regex::new(r"(?m)^ERROR:\s*(.+)$").unwrap();
    static ref UNSAFE_FILENAME_RE: Regex = Regex::new(r#"[^A-Za-z0-9 ._\-()\[\]]+"#).unwrap();
}

/// Upper bound on captured stderr kept for error messages
const STDERR_TAIL_BYTES: usize = 8 * 1024;

/// Map a spawn failure to the matching error kind
pub fn spawn_error(program: &str, e: std::io::Error) -> DownloadError {
    if e.kind() == ErrorKind::NotFound {
        DownloadError::ToolNotFound(program.to_string())
    } else {
        DownloadError::ExecutionError(format!("Failed to start {}: {}", program, e))
    }
}

/// Run command with timeout, collecting stdout and stderr
pub async fn run_output_with_timeout(
    program: &str,
    args: Vec<String>,
    timeout_secs: u64,
) -> Result<std::process::Output, DownloadError> {
    let mut child = TokioCommand::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| spawn_error(program, e))?;

    let mut stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| DownloadError::Io(format!("Failed to capture stdout from {}", program)))?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| DownloadError::Io(format!("Failed to capture stderr from {}", program)))?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });

    match timeout(Duration::from_secs(timeout_secs), child.wait()).await {
        Ok(status_res) => {
            let status = status_res?;
            let stdout = stdout_task
                .await
                .map_err(|e| DownloadError::Io(format!("stdout task failed: {}", e)))??;
            let stderr = stderr_task
                .await
                .map_err(|e| DownloadError::Io(format!("stderr task failed: {}", e)))??;
            Ok(std::process::Output { status, stdout, stderr })
        }
        Err(_) => {
            warn!("{} timed out after {}s, killing it", program, timeout_secs);
            let _ = child.kill().await;
            stdout_task.abort();
            stderr_task.abort();
            Err(DownloadError::NetworkTimeout)
        }
    }
}

/// Drain a pipe, keeping only the last `STDERR_TAIL_BYTES`
pub async fn read_tail<R: AsyncRead + Unpin>(mut reader: R) -> String {
    let mut tail: Vec<u8> = Vec::new();
    let mut buf = [0u8; 4096];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                tail.extend_from_slice(&buf[..n]);
                if tail.len() > STDERR_TAIL_BYTES {
                    let excess = tail.len() - STDERR_TAIL_BYTES;
                    tail.drain(..excess);
                }
            }
        }
    }

    String::from_utf8_lossy(&tail).into_owned()
}

/// Pick the `ERROR:` lines out of yt-dlp stderr, or the last non-empty line
pub fn concise_error(stderr: &str) -> String {
    let errors: Vec<&str> = ERROR_LINE_RE
        .captures_iter(stderr)
        .filter_map(|c| c.get(1).map(|m| m.as_str().trim()))
        .collect();

    if !errors.is_empty() {
        return errors.join("; ");
    }

    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("external tool failed without output")
        .to_string()
}

/// ASCII-only file name usable inside a quoted header parameter
pub fn ascii_filename(name: &str) -> String {
    let cleaned = UNSAFE_FILENAME_RE.replace_all(name, "_");
    let trimmed = cleaned.trim_matches(|c: char| c == '_' || c.is_whitespace());

    if trimmed.is_empty() {
        "download".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `Content-Disposition` value with an ASCII fallback and an RFC 5987 name
pub fn content_disposition(file_name: &str) -> String {
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii_filename(file_name),
        urlencoding::encode(file_name)
    )
}

/// Guess a MIME type from the produced file's extension
pub fn content_type_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "mp3" => "audio/mpeg",
        "m4a" | "aac" => "audio/mp4",
        "opus" | "ogg" | "oga" => "audio/ogg",
        "flac" => "audio/flac",
        "wav" => "audio/wav",
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concise_error_prefers_error_lines() {
        let stderr = "[youtube] X: Downloading webpage\nERROR: [youtube] X: Video unavailable\n";
        assert_eq!(concise_error(stderr), "[youtube] X: Video unavailable");
    }

    #[test]
    fn concise_error_falls_back_to_last_line() {
        assert_eq!(concise_error("first\nsecond\n\n"), "second");
        assert_eq!(concise_error(""), "external tool failed without output");
    }

    #[test]
    fn content_disposition_escapes_names() {
        let value = content_disposition("Café \"live\".mp3");
        assert_eq!(
            value,
            "attachment; filename=\"Caf_ _live_.mp3\"; filename*=UTF-8''Caf%C3%A9%20%22live%22.mp3"
        );
    }

    #[test]
    fn content_type_from_extension() {
        assert_eq!(content_type_for("song.MP3"), "audio/mpeg");
        assert_eq!(content_type_for("clip.webm"), "video/webm");
        assert_eq!(content_type_for("noext"), "application/octet-stream");
    }

    #[tokio::test]
    async fn read_tail_keeps_the_end() {
        let data = vec![b'a'; STDERR_TAIL_BYTES * 2];
        let mut input = data.clone();
        input.extend_from_slice(b"END");
        let tail = read_tail(&input[..]).await;
        assert_eq!(tail.len(), STDERR_TAIL_BYTES);
        assert!(tail.ends_with("END"));
    }

    #[tokio::test]
    async fn timed_out_commands_are_killed() {
        let err = run_output_with_timeout("sleep", vec!["5".to_string()], 1)
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::NetworkTimeout));
    }
}
