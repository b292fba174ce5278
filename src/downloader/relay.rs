// Streaming relay
//
// Forwards the bytes of a yt-dlp fetch to the HTTP response in bounded chunks.
//
// - Pipe mode: yt-dlp writes to stdout (`-o -`) and stdout is relayed as read.
// - Materialize mode: yt-dlp downloads and transcodes into a private temp dir,
//   the finished file is then relayed and the dir removed when the stream is
//   dropped, whether it completed, failed or the client went away.
//
// Both modes start the fetch in its own process group. Dropping the response
// body (or the pending open) kills that whole group, so helpers yt-dlp spawned
// itself, like ffmpeg during a transcode, stop together with it.

use axum::body::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::fs::File;
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use super::errors::DownloadError;
use super::extractors::{ExtractorConfig, YtDlpCommand};
use super::format_selector::FormatSelector;
use super::models::{DownloadSelection, MediaKind};
use super::utils::{concise_error, content_type_for, read_tail, spawn_error};

/// Default relay chunk size
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

const TEMP_DIR_PREFIX: &str = "ytdlp-relay-";

/// Relay strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RelayMode {
    /// Stream the fetch tool's stdout, no local file
    Pipe,
    /// Produce one transcoded local file, then stream it
    Materialize,
}

impl fmt::Display for RelayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pipe => write!(f, "pipe"),
            Self::Materialize => write!(f, "materialize"),
        }
    }
}

/// Builds the external fetch commands. Stdio and lifetime handling are the
/// relay's job; implementors only choose the program and arguments.
pub trait FetchCommandBuilder: Send + Sync {
    /// Command writing the selected variant to stdout
    fn pipe_command(&self, selection: &DownloadSelection) -> Command;

    /// Command writing exactly one finished file into `work_dir`
    fn materialize_command(&self, selection: &DownloadSelection, work_dir: &Path) -> Command;
}

/// yt-dlp backed fetcher
pub struct YtDlpFetcher {
    command: YtDlpCommand,
    network: ExtractorConfig,
    audio_format: String,
    audio_quality: String,
    ffmpeg_location: Option<String>,
}

impl YtDlpFetcher {
    pub fn new(command: YtDlpCommand, network: ExtractorConfig) -> Self {
        Self {
            command,
            network,
            audio_format: "mp3".to_string(),
            audio_quality: "320K".to_string(),
            ffmpeg_location: None,
        }
    }

    pub fn with_audio_format(mut self, format: impl Into<String>, quality: impl Into<String>) -> Self {
        self.audio_format = format.into();
        self.audio_quality = quality.into();
        self
    }

    pub fn with_ffmpeg_location(mut self, location: Option<String>) -> Self {
        self.ffmpeg_location = location;
        self
    }

    fn command_with(&self, args: Vec<String>) -> Command {
        let mut cmd = Command::new(&self.command.program);
        cmd.args(self.command.args_with(args));
        cmd
    }

    fn common_args(&self, selection: &DownloadSelection) -> Vec<String> {
        let mut args = vec![
            "-f".to_string(),
            FormatSelector::format_spec(&selection.variant_id),
            "--no-playlist".to_string(),
            "--no-progress".to_string(),
            "--quiet".to_string(),
            "--no-warnings".to_string(),
        ];
        args.extend(self.network.network_args());
        args
    }
}

impl FetchCommandBuilder for YtDlpFetcher {
    fn pipe_command(&self, selection: &DownloadSelection) -> Command {
        let mut args = self.common_args(selection);
        args.extend(["-o".to_string(), "-".to_string(), "--no-part".to_string()]);
        // URL after `--` so it is never parsed as an option
        args.extend(["--".to_string(), selection.url.clone()]);
        self.command_with(args)
    }

    fn materialize_command(&self, selection: &DownloadSelection, work_dir: &Path) -> Command {
        let mut args = self.common_args(selection);
        args.extend([
            "-x".to_string(),
            "--audio-format".to_string(),
            self.audio_format.clone(),
            "--audio-quality".to_string(),
            self.audio_quality.clone(),
            "-o".to_string(),
            work_dir.join("%(title)s.%(ext)s").to_string_lossy().into_owned(),
        ]);
        if let Some(location) = &self.ffmpeg_location {
            args.push("--ffmpeg-location".to_string());
            args.push(location.clone());
        }
        args.extend(["--".to_string(), selection.url.clone()]);
        self.command_with(args)
    }
}

/// An opened relay, ready to become a response body
pub struct RelayStream {
    /// File name when known (materialize mode)
    pub file_name: Option<String>,
    pub content_type: &'static str,
    pub body: BoxStream<'static, io::Result<Bytes>>,
}

/// Opens downloads in the mode matching their media kind
#[derive(Clone)]
pub struct StreamingRelay {
    fetcher: Arc<dyn FetchCommandBuilder>,
    chunk_size: usize,
    audio_mode: RelayMode,
    temp_root: Option<PathBuf>,
}

impl StreamingRelay {
    pub fn new(fetcher: Arc<dyn FetchCommandBuilder>) -> Self {
        Self {
            fetcher,
            chunk_size: DEFAULT_CHUNK_SIZE,
            audio_mode: RelayMode::Materialize,
            temp_root: None,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_audio_mode(mut self, mode: RelayMode) -> Self {
        self.audio_mode = mode;
        self
    }

    /// Parent directory for materialize work dirs, system temp when `None`
    pub fn with_temp_root(mut self, root: Option<PathBuf>) -> Self {
        self.temp_root = root;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Video always pipes; audio follows the configured mode
    pub fn mode_for(&self, kind: MediaKind) -> RelayMode {
        match kind {
            MediaKind::Video => RelayMode::Pipe,
            MediaKind::Audio => self.audio_mode,
        }
    }

    /// Start the fetch and return the body once the first bytes (or the
    /// finished file) are available. Failures before that point are
    /// returned as errors; later ones abort the body stream.
    pub async fn open(&self, selection: &DownloadSelection) -> Result<RelayStream, DownloadError> {
        let mode = self.mode_for(selection.media_kind);
        info!(
            "Relaying {} variant '{}' of {} in {} mode",
            selection.media_kind, selection.variant_id, selection.url, mode
        );

        match mode {
            RelayMode::Pipe => self.open_pipe(selection).await,
            RelayMode::Materialize => self.open_materialized(selection).await,
        }
    }

    async fn open_pipe(&self, selection: &DownloadSelection) -> Result<RelayStream, DownloadError> {
        let mut cmd = self.fetcher.pipe_command(selection);
        let program = program_name(&cmd);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|e| spawn_error(&program, e))?;
        let group = ProcessGroupGuard::new(&child);
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DownloadError::Io(format!("Failed to capture stdout from {}", program)))?;
        let stderr = child.stderr.take().map(|s| tokio::spawn(read_tail(s)));

        let mut state = PipeState {
            reader: ReaderStream::with_capacity(stdout, self.chunk_size),
            group,
            child,
            stderr,
            program,
            pending: None,
            relayed: 0,
            finished: false,
        };

        // Hold the response until there is something to send
        match state.reader.next().await {
            Some(Ok(first)) => state.pending = Some(first),
            Some(Err(e)) => {
                state.finished = true;
                return Err(e.into());
            }
            None => {
                state.finished = true;
                state.wait_for_exit().await?;
                return Err(DownloadError::EmptyOutput);
            }
        }

        Ok(RelayStream {
            file_name: None,
            content_type: "application/octet-stream",
            body: stream::unfold(state, PipeState::next_chunk).boxed(),
        })
    }

    async fn open_materialized(
        &self,
        selection: &DownloadSelection,
    ) -> Result<RelayStream, DownloadError> {
        let work_dir = self.create_work_dir()?;
        debug!("Materializing into {}", work_dir.path().display());

        let mut cmd = self.fetcher.materialize_command(selection, work_dir.path());
        let program = program_name(&cmd);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|e| spawn_error(&program, e))?;
        // Declared after `child` so it drops first if this future is cancelled
        let mut group = ProcessGroupGuard::new(&child);
        let stderr = child.stderr.take().map(|s| tokio::spawn(read_tail(s)));
        let status = child.wait().await?;
        group.release(status.success());

        if !status.success() {
            let stderr = join_stderr(stderr).await;
            warn!("{} exited with {}: {}", program, status, concise_error(&stderr));
            return Err(DownloadError::ExecutionError(concise_error(&stderr)));
        }

        let path = find_output_file(work_dir.path())
            .await?
            .ok_or(DownloadError::EmptyOutput)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "download".to_string());
        let file = File::open(&path).await?;
        info!("Materialized '{}', streaming it", file_name);

        let state = MaterializedState {
            reader: ReaderStream::with_capacity(file, self.chunk_size),
            work_dir: Some(work_dir),
        };

        Ok(RelayStream {
            content_type: content_type_for(&file_name),
            file_name: Some(file_name),
            body: stream::unfold(state, MaterializedState::next_chunk).boxed(),
        })
    }

    fn create_work_dir(&self) -> Result<TempDir, DownloadError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(TEMP_DIR_PREFIX);

        let dir = match &self.temp_root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        Ok(dir)
    }
}

fn program_name(cmd: &Command) -> String {
    cmd.as_std().get_program().to_string_lossy().into_owned()
}

async fn join_stderr(handle: Option<JoinHandle<String>>) -> String {
    match handle {
        Some(handle) => handle.await.unwrap_or_default(),
        None => String::new(),
    }
}

/// First finished file in `dir`, ignoring yt-dlp partial/temp files
async fn find_output_file(dir: &Path) -> Result<Option<PathBuf>, DownloadError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(".part") || name.ends_with(".ytdl") || name.ends_with(".temp") {
            continue;
        }
        if entry.file_type().await?.is_file() {
            files.push(entry.path());
        }
    }

    files.sort();
    Ok(files.into_iter().next())
}

/// Kills the process group led by a fetch child when dropped while armed.
/// Owners drop it before the `Child`, so an unreaped leader still holds the
/// group id.
struct ProcessGroupGuard {
    pgid: Option<i32>,
}

impl ProcessGroupGuard {
    fn new(child: &Child) -> Self {
        Self {
            pgid: child.id().and_then(|id| i32::try_from(id).ok()),
        }
    }

    /// Call once the leader has exited. A clean exit means yt-dlp already
    /// waited for its helpers; otherwise stragglers are killed now.
    fn release(&mut self, clean_exit: bool) {
        if clean_exit {
            self.pgid = None;
        } else {
            self.kill();
        }
    }

    fn kill(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            #[cfg(unix)]
            // SAFETY: killpg takes plain integers and only sends a signal
            unsafe {
                libc::killpg(pgid, libc::SIGKILL);
            }
            #[cfg(not(unix))]
            let _ = pgid;
        }
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        if self.pgid.is_some() {
            debug!("Killing process group {:?}", self.pgid);
        }
        self.kill();
    }
}

struct PipeState {
    reader: ReaderStream<ChildStdout>,
    // Before `child`, see ProcessGroupGuard
    group: ProcessGroupGuard,
    child: Child,
    stderr: Option<JoinHandle<String>>,
    program: String,
    pending: Option<Bytes>,
    relayed: u64,
    finished: bool,
}

impl PipeState {
    async fn next_chunk(mut self) -> Option<(io::Result<Bytes>, Self)> {
        if self.finished {
            return None;
        }

        let next = match self.pending.take() {
            Some(chunk) => Some(Ok(chunk)),
            None => self.reader.next().await,
        };

        match next {
            Some(Ok(chunk)) => {
                self.relayed += chunk.len() as u64;
                Some((Ok(chunk), self))
            }
            Some(Err(e)) => {
                self.finished = true;
                Some((Err(e), self))
            }
            None => {
                self.finished = true;
                match self.wait_for_exit().await {
                    Ok(()) => {
                        debug!("{} finished, relayed {} bytes", self.program, self.relayed);
                        None
                    }
                    Err(e) => Some((Err(io::Error::new(io::ErrorKind::Other, e.to_string())), self)),
                }
            }
        }
    }

    async fn wait_for_exit(&mut self) -> Result<(), DownloadError> {
        let status = self.child.wait().await?;
        self.group.release(status.success());
        if status.success() {
            return Ok(());
        }

        let stderr = join_stderr(self.stderr.take()).await;
        warn!(
            "{} exited with {} after {} bytes: {}",
            self.program,
            status,
            self.relayed,
            concise_error(&stderr)
        );
        Err(DownloadError::ExecutionError(concise_error(&stderr)))
    }
}

impl Drop for PipeState {
    fn drop(&mut self) {
        if !self.finished {
            // The group guard and kill_on_drop stop the processes
            debug!(
                "Client went away after {} bytes, stopping {}",
                self.relayed, self.program
            );
        }
    }
}

struct MaterializedState {
    reader: ReaderStream<File>,
    // Dropped after `reader`, removing the directory
    work_dir: Option<TempDir>,
}

impl MaterializedState {
    async fn next_chunk(mut self) -> Option<(io::Result<Bytes>, Self)> {
        match self.reader.next().await {
            Some(Ok(chunk)) => Some((Ok(chunk), self)),
            Some(Err(e)) => {
                self.cleanup();
                Some((Err(e), self))
            }
            None => {
                self.cleanup();
                None
            }
        }
    }

    fn cleanup(&mut self) {
        if let Some(dir) = self.work_dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                warn!("Failed to remove {}: {}", path.display(), e);
            }
        }
    }
}
