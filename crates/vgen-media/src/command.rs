//! FFmpeg command builder and piped process runner.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Stdout is read in chunks of this size.
pub const OUTPUT_CHUNK_SIZE: usize = 1024 * 1024;

/// Stderr is drained in chunks of this size.
const DIAGNOSTIC_CHUNK_SIZE: usize = 1024;

/// Only the tail of stderr is retained for error reports.
const MAX_DIAGNOSTIC_BYTES: usize = 64 * 1024;

/// Protocols the concat demuxer may open.
pub const CONCAT_PROTOCOLS: &[&str] = &["fd", "pipe", "http", "https", "tcp", "tls", "crypto"];

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input (`-` for stdin)
    input: String,
    /// Output (`-` for stdout)
    output: String,
    /// Input arguments (before -i)
    input_args: Vec<String>,
    /// Output arguments (after -i)
    output_args: Vec<String>,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            input_args: Vec::new(),
            output_args: Vec::new(),
        }
    }

    /// Concatenate a manifest read from stdin into fragmented MP4 on stdout,
    /// without re-encoding.
    pub fn concat_stream() -> Self {
        Self::new("-", "-")
            .protocol_whitelist(CONCAT_PROTOCOLS)
            .input_args(["-f", "concat", "-safe", "0"])
            .stream_copy()
            .output_args(["-f", "mp4"])
            .movflags("frag_keyframe+empty_moov")
    }

    /// Add input arguments (before -i).
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    /// Add multiple input arguments.
    pub fn input_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Restrict which protocols inputs may use.
    pub fn protocol_whitelist(self, protocols: &[&str]) -> Self {
        self.input_arg("-protocol_whitelist")
            .input_arg(protocols.join(","))
    }

    /// Copy all streams without re-encoding.
    pub fn stream_copy(self) -> Self {
        self.output_arg("-c").output_arg("copy")
    }

    /// Set MP4 muxer flags.
    pub fn movflags(self, flags: impl Into<String>) -> Self {
        self.output_arg("-movflags").output_arg(flags)
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
        ];

        args.extend(self.input_args.iter().cloned());
        args.push("-i".to_string());
        args.push(self.input.clone());

        args.extend(self.output_args.iter().cloned());
        args.push(self.output.clone());

        args
    }
}

/// A program plus arguments to run as the muxer.
#[derive(Debug, Clone)]
pub struct MuxerCommand {
    program: PathBuf,
    args: Vec<String>,
}

impl MuxerCommand {
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
        }
    }

    /// FFmpeg at `path`, configured for streaming concat.
    pub fn ffmpeg(path: impl AsRef<Path>) -> Self {
        Self::new(path).args(FfmpegCommand::concat_stream().build_args())
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    fn spawn(&self) -> MediaResult<Child> {
        debug!(
            "Running muxer: {} {}",
            self.program.display(),
            self.args.join(" ")
        );

        Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => {
                    MediaError::FfmpegNotFound(self.program.display().to_string())
                }
                _ => MediaError::Io(e),
            })
    }
}

/// Runs a process with stdin, stdout and stderr all piped.
pub struct PipeRunner {
    /// Timeout for the whole exchange
    timeout: Option<Duration>,
}

impl Default for PipeRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl PipeRunner {
    pub fn new() -> Self {
        Self { timeout: None }
    }

    /// Set timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Feed `input` to the process and collect everything it writes to stdout.
    ///
    /// The stdin writer, stdout reader and stderr drain run concurrently, so a
    /// process that produces output before consuming its input cannot deadlock
    /// against us. On any pump error or timeout the process is killed.
    pub async fn run(&self, command: &MuxerCommand, input: Vec<u8>) -> MediaResult<Vec<u8>> {
        let deadline = self.timeout.map(|t| Instant::now() + t);
        let mut child = command.spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| MediaError::internal("stdin not captured"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::internal("stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("stderr not captured"))?;

        let pumps = async {
            tokio::try_join!(
                write_input(stdin, input),
                read_output(stdout),
                drain_diagnostics(stderr),
            )
        };

        let pumped = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, pumps).await {
                Ok(result) => result,
                Err(_) => return Err(self.expire(&mut child).await),
            },
            None => pumps.await,
        };

        let ((), output, diagnostics) = match pumped {
            Ok(streams) => streams,
            Err(e) => {
                warn!("Muxer pipe failed, killing process: {}", e);
                let _ = child.kill().await;
                return Err(e);
            }
        };

        let status = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, child.wait()).await {
                Ok(status) => status?,
                Err(_) => return Err(self.expire(&mut child).await),
            },
            None => child.wait().await?,
        };

        if !status.success() {
            let code = status.code();
            let stderr = diagnostics.trim().to_string();
            let message = match code {
                Some(code) => format!("exited with status {}: {}", code, stderr),
                None => format!("terminated by signal: {}", stderr),
            };
            return Err(MediaError::ffmpeg_failed(message, Some(stderr), code));
        }

        debug!(bytes = output.len(), "Muxer finished");
        Ok(output)
    }

    async fn expire(&self, child: &mut Child) -> MediaError {
        let secs = self.timeout.map(|t| t.as_secs()).unwrap_or_default();
        warn!("Muxer timed out after {} seconds, killing process", secs);
        let _ = child.kill().await;
        MediaError::Timeout(secs)
    }
}

async fn write_input(mut stdin: ChildStdin, input: Vec<u8>) -> MediaResult<()> {
    match stdin.write_all(&input).await {
        Ok(()) => {}
        // The process stopped reading; its exit status decides the outcome
        Err(e) if e.kind() == ErrorKind::BrokenPipe => {
            debug!("Muxer closed stdin early");
        }
        Err(e) => return Err(e.into()),
    }
    // Dropping closes the pipe, signalling end of input
    drop(stdin);
    Ok(())
}

async fn read_output(mut stdout: ChildStdout) -> MediaResult<Vec<u8>> {
    let mut output = Vec::new();
    let mut chunk = vec![0u8; OUTPUT_CHUNK_SIZE];
    loop {
        let n = stdout.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        output.extend_from_slice(&chunk[..n]);
    }
    Ok(output)
}

async fn drain_diagnostics(mut stderr: ChildStderr) -> MediaResult<String> {
    let mut diagnostics = Vec::new();
    let mut chunk = [0u8; DIAGNOSTIC_CHUNK_SIZE];
    loop {
        let n = stderr.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        debug!("muxer: {}", String::from_utf8_lossy(&chunk[..n]).trim_end());
        diagnostics.extend_from_slice(&chunk[..n]);
        if diagnostics.len() > MAX_DIAGNOSTIC_BYTES {
            let excess = diagnostics.len() - MAX_DIAGNOSTIC_BYTES;
            diagnostics.drain(..excess);
        }
    }
    Ok(String::from_utf8_lossy(&diagnostics).into_owned())
}

/// Check that the muxer binary can be found.
pub fn check_ffmpeg(path: impl AsRef<Path>) -> MediaResult<PathBuf> {
    let path = path.as_ref();
    which::which(path).map_err(|_| MediaError::FfmpegNotFound(path.display().to_string()))
}
