//! Video frame sources.
//!
//! A [`VideoDecoder`] opens a URL and yields a [`FrameSource`] that
//! streams decoded RGB24 frames one at a time. The production decoder
//! shells out to ffmpeg/ffprobe; [`VecFrameSource`] backs tests.

use std::process::ExitStatus;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tracing::debug;

use framesight_core::{Error, Result};
use framesight_detect::Frame;

/// A stream of decoded frames from one video.
#[async_trait]
pub trait FrameSource: Send + std::fmt::Debug {
    /// Yield the next frame, or `None` when the video is exhausted.
    async fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Opens videos by URL and produces frame sources.
#[async_trait]
pub trait VideoDecoder: Send + Sync {
    async fn open(&self, url: &str) -> Result<Box<dyn FrameSource>>;
}

/// ffmpeg-based decoder.
///
/// Probes the stream dimensions with ffprobe, then spawns ffmpeg writing
/// raw RGB24 frames to stdout. ffmpeg handles both local paths and
/// network URLs, so video fetching needs no extra plumbing.
#[derive(Debug, Default, Clone)]
pub struct FfmpegDecoder;

impl FfmpegDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Check that ffmpeg is on the PATH.
    pub async fn is_available() -> bool {
        match Command::new("ffmpeg").arg("-version").output().await {
            Ok(output) => output.status.success(),
            Err(_) => false,
        }
    }
}

/// Probe video dimensions of the first video stream.
async fn probe_dimensions(url: &str) -> Result<(u32, u32)> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height",
            "-of",
            "csv=p=0",
            url,
        ])
        .output()
        .await
        .map_err(|e| Error::Video(format!("Failed to execute ffprobe: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Video(format!(
            "ffprobe failed for {}: {}",
            url,
            stderr.trim()
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = stdout.trim().lines().next().unwrap_or_default();
    let mut parts = line.split(',');
    let width = parts
        .next()
        .and_then(|v| v.trim().parse::<u32>().ok())
        .ok_or_else(|| Error::Video(format!("ffprobe returned no width for {}", url)))?;
    let height = parts
        .next()
        .and_then(|v| v.trim().parse::<u32>().ok())
        .ok_or_else(|| Error::Video(format!("ffprobe returned no height for {}", url)))?;

    if width == 0 || height == 0 {
        return Err(Error::Video(format!(
            "Video {} has degenerate dimensions {}x{}",
            url, width, height
        )));
    }

    Ok((width, height))
}

#[async_trait]
impl VideoDecoder for FfmpegDecoder {
    async fn open(&self, url: &str) -> Result<Box<dyn FrameSource>> {
        let (width, height) = probe_dimensions(url).await?;

        debug!(
            subsystem = "jobs",
            component = "ffmpeg_decoder",
            op = "open",
            width,
            height,
            "Opening video stream"
        );

        let mut child = Command::new("ffmpeg")
            .args([
                "-v", "error", "-i", url, "-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1",
            ])
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Video(format!("Failed to spawn ffmpeg: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Video("ffmpeg stdout was not captured".to_string()))?;
        let stderr = child.stderr.take();

        Ok(Box::new(FfmpegFrameSource {
            child,
            stdout,
            stderr,
            width,
            height,
            next_index: 1,
            done: false,
        }))
    }
}

/// Frame source reading raw RGB24 frames from a running ffmpeg process.
#[derive(Debug)]
struct FfmpegFrameSource {
    child: Child,
    stdout: ChildStdout,
    stderr: Option<ChildStderr>,
    width: u32,
    height: u32,
    next_index: i64,
    done: bool,
}

impl FfmpegFrameSource {
    /// Fill `buf` from ffmpeg stdout. Returns the number of bytes read,
    /// stopping early only at end of stream.
    async fn read_frame_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self
                .stdout
                .read(&mut buf[filled..])
                .await
                .map_err(|e| Error::Video(format!("Failed to read frame data: {}", e)))?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    /// Reap ffmpeg after stdout hits EOF.
    ///
    /// EOF on a frame boundary is only a clean end of stream when ffmpeg
    /// also exited cleanly; a crashed decoder flushes whole frames and
    /// then dies, which must fail the job rather than complete it.
    async fn check_exit(&mut self) -> Result<()> {
        let mut diagnostics = String::new();
        if let Some(mut stderr) = self.stderr.take() {
            let _ = stderr.read_to_string(&mut diagnostics).await;
        }
        let status = self
            .child
            .wait()
            .await
            .map_err(|e| Error::Video(format!("Failed to reap ffmpeg: {}", e)))?;
        exit_result(status, self.next_index - 1, diagnostics.trim())
    }
}

/// Map an ffmpeg exit status at end of stream to a decode outcome.
fn exit_result(status: ExitStatus, frames_decoded: i64, stderr: &str) -> Result<()> {
    if status.success() {
        return Ok(());
    }
    let detail = if stderr.is_empty() {
        "no diagnostic output"
    } else {
        stderr
    };
    Err(Error::Video(format!(
        "ffmpeg exited with {} after {} frames: {}",
        status, frames_decoded, detail
    )))
}

#[async_trait]
impl FrameSource for FfmpegFrameSource {
    async fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.done {
            return Ok(None);
        }

        let frame_len = Frame::expected_len(self.width, self.height);
        let mut data = vec![0u8; frame_len];

        let filled = self.read_frame_bytes(&mut data).await?;
        if filled == 0 {
            self.done = true;
            self.check_exit().await?;
            return Ok(None);
        }
        if filled < frame_len {
            self.done = true;
            return Err(Error::Video(format!(
                "Truncated frame {}: got {} of {} bytes",
                self.next_index, filled, frame_len
            )));
        }

        let frame = Frame {
            index: self.next_index,
            width: self.width,
            height: self.height,
            data,
        };
        self.next_index += 1;
        Ok(Some(frame))
    }
}

/// In-memory frame source for tests.
#[derive(Debug)]
pub struct VecFrameSource {
    frames: std::vec::IntoIter<Frame>,
    /// Fail instead of yielding the frame with this index.
    fail_at: Option<i64>,
}

impl VecFrameSource {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames: frames.into_iter(),
            fail_at: None,
        }
    }

    /// Generate `count` uniform frames of the given dimensions.
    pub fn with_frame_count(count: i64, width: u32, height: u32) -> Self {
        let frames = (1..=count)
            .map(|index| Frame {
                index,
                width,
                height,
                data: vec![0u8; Frame::expected_len(width, height)],
            })
            .collect();
        Self::new(frames)
    }

    /// Return an error when the frame with this index would be yielded.
    pub fn failing_at(mut self, index: i64) -> Self {
        self.fail_at = Some(index);
        self
    }
}

#[async_trait]
impl FrameSource for VecFrameSource {
    async fn next_frame(&mut self) -> Result<Option<Frame>> {
        match self.frames.next() {
            Some(frame) => {
                if self.fail_at == Some(frame.index) {
                    return Err(Error::Video(format!(
                        "Simulated decode failure at frame {}",
                        frame.index
                    )));
                }
                Ok(Some(frame))
            }
            None => Ok(None),
        }
    }
}

/// Decoder wrapping pre-built frame sources, for tests.
pub struct VecDecoder {
    sources: std::sync::Mutex<Vec<VecFrameSource>>,
    /// Fail `open` entirely when set.
    open_error: Option<String>,
}

impl VecDecoder {
    pub fn new(sources: Vec<VecFrameSource>) -> Self {
        Self {
            sources: std::sync::Mutex::new(sources),
            open_error: None,
        }
    }

    /// A decoder whose `open` always fails with the given message.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            sources: std::sync::Mutex::new(Vec::new()),
            open_error: Some(message.into()),
        }
    }
}

#[async_trait]
impl VideoDecoder for VecDecoder {
    async fn open(&self, url: &str) -> Result<Box<dyn FrameSource>> {
        if let Some(ref message) = self.open_error {
            return Err(Error::Video(format!("{}: {}", message, url)));
        }
        let mut sources = self.sources.lock().unwrap();
        if sources.is_empty() {
            return Err(Error::Video(format!("No frame source queued for {}", url)));
        }
        Ok(Box::new(sources.remove(0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_exit_result_distinguishes_crash_from_clean_eof() {
        use std::os::unix::process::ExitStatusExt;

        assert!(exit_result(ExitStatus::from_raw(0), 10, "").is_ok());

        // Exit code 1 (wait status 256 on unix).
        let err = exit_result(ExitStatus::from_raw(256), 7, "corrupt input stream").unwrap_err();
        assert!(matches!(err, Error::Video(_)));
        let msg = err.to_string();
        assert!(msg.contains("after 7 frames"));
        assert!(msg.contains("corrupt input stream"));
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_result_without_diagnostics() {
        use std::os::unix::process::ExitStatusExt;

        let err = exit_result(ExitStatus::from_raw(256), 0, "").unwrap_err();
        assert!(err.to_string().contains("no diagnostic output"));
    }

    #[tokio::test]
    async fn test_vec_frame_source_yields_in_order() {
        let mut source = VecFrameSource::with_frame_count(3, 2, 2);

        let first = source.next_frame().await.unwrap().unwrap();
        assert_eq!(first.index, 1);
        assert!(first.is_well_formed());

        assert_eq!(source.next_frame().await.unwrap().unwrap().index, 2);
        assert_eq!(source.next_frame().await.unwrap().unwrap().index, 3);
        assert!(source.next_frame().await.unwrap().is_none());
        // Stays exhausted.
        assert!(source.next_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_vec_frame_source_failure_injection() {
        let mut source = VecFrameSource::with_frame_count(3, 2, 2).failing_at(2);

        assert!(source.next_frame().await.unwrap().is_some());
        let err = source.next_frame().await.unwrap_err();
        assert!(matches!(err, Error::Video(_)));
    }

    #[tokio::test]
    async fn test_vec_decoder_open_failure() {
        let decoder = VecDecoder::failing("Cannot open video");
        let err = decoder.open("https://example.com/x.mp4").await.unwrap_err();
        assert!(matches!(err, Error::Video(_)));
        assert!(err.to_string().contains("Cannot open video"));
    }

    #[tokio::test]
    async fn test_vec_decoder_dispenses_sources() {
        let decoder = VecDecoder::new(vec![VecFrameSource::with_frame_count(1, 2, 2)]);

        let mut source = decoder.open("a").await.unwrap();
        assert!(source.next_frame().await.unwrap().is_some());

        // Second open has nothing queued.
        assert!(decoder.open("b").await.is_err());
    }
}
