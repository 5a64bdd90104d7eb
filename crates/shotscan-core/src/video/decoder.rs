use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use anyhow::{bail, Context, Result};
use image::RgbImage;
use tracing::{debug, error, info, warn};

use super::frame::Frame;
use super::FrameSource;

/// A target this close ahead of the running pipe is reached by decoding and
/// discarding frames instead of respawning ffmpeg with a new seek.
const SEQUENTIAL_READ_WINDOW: u32 = 300;

/// Video metadata obtained by probing with ffprobe.
#[derive(Debug, PartialEq)]
struct ProbeResult {
    width: u32,
    height: u32,
    fps: f64,
    frame_count: u32,
}

fn probe(path: &Path) -> Result<ProbeResult> {
    info!(?path, "probing video metadata with ffprobe");

    let output = Command::new("ffprobe")
        .args([
            "-v", "error",
            "-select_streams", "v:0",
            "-show_entries", "stream=width,height,r_frame_rate,nb_frames:format=duration",
            "-of", "default=noprint_wrappers=1",
        ])
        .arg(path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .context("failed to run ffprobe (is ffmpeg installed?)")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!(%stderr, ?path, "ffprobe failed");
        bail!("ffprobe failed: {stderr}");
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let result = parse_probe_output(&stdout)?;
    info!(
        width = result.width,
        height = result.height,
        fps = result.fps,
        frame_count = result.frame_count,
        "probe completed"
    );
    Ok(result)
}

/// Parse ffprobe `key=value` lines. The frame count comes from `nb_frames` when the
/// container records it, otherwise from `duration × fps`.
fn parse_probe_output(stdout: &str) -> Result<ProbeResult> {
    let mut width = None;
    let mut height = None;
    let mut fps = None;
    let mut nb_frames = None;
    let mut duration = None;

    for line in stdout.lines() {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        match key {
            "width" => width = Some(value.parse::<u32>().context("failed to parse width")?),
            "height" => height = Some(value.parse::<u32>().context("failed to parse height")?),
            "r_frame_rate" => fps = Some(parse_frame_rate(value)?),
            "nb_frames" => nb_frames = value.parse::<u32>().ok(),
            "duration" => duration = value.parse::<f64>().ok(),
            _ => {}
        }
    }

    let (Some(width), Some(height), Some(fps)) = (width, height, fps) else {
        error!(%stdout, "unexpected ffprobe output, expected width, height and r_frame_rate");
        bail!("unexpected ffprobe output: {stdout}");
    };
    if width == 0 || height == 0 {
        bail!("invalid video dimensions: {width}x{height}");
    }
    if fps <= 0.0 {
        bail!("video has non-positive fps: {fps}");
    }

    let frame_count = match (nb_frames, duration) {
        (Some(n), _) if n > 0 => n,
        (_, Some(d)) if d > 0.0 => {
            warn!(duration = d, fps, "nb_frames unavailable, estimating from duration");
            (d * fps).floor() as u32
        }
        _ => bail!("ffprobe reported neither a frame count nor a duration"),
    };

    Ok(ProbeResult {
        width,
        height,
        fps,
        frame_count,
    })
}

fn parse_frame_rate(value: &str) -> Result<f64> {
    if let Some((num, den)) = value.split_once('/') {
        let num: f64 = num.parse().context("failed to parse fps numerator")?;
        let den: f64 = den.parse().context("failed to parse fps denominator")?;
        Ok(if den > 0.0 { num / den } else { 0.0 })
    } else {
        value.parse().context("failed to parse fps")
    }
}

/// A running ffmpeg process emitting raw RGB24 frames from `next_index` onward.
struct FrameStream {
    child: Child,
    next_index: u32,
}

impl Drop for FrameStream {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Random-access frame reader over the ffmpeg CLI.
///
/// Each read either continues the current raw-video pipe (skipping forward if
/// needed) or restarts ffmpeg with an input seek to the requested frame.
pub struct VideoDecoder {
    path: PathBuf,
    width: u32,
    height: u32,
    fps: f64,
    frame_count: u32,
    frame_bytes: usize,
    stream: Option<FrameStream>,
    respawns: u32,
}

impl VideoDecoder {
    /// Probe a video file and prepare it for decoding.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!("video file does not exist: {}", path.display());
        }

        let info = probe(path)?;
        let frame_bytes = (info.width as usize) * (info.height as usize) * 3;

        info!(
            ?path,
            width = info.width,
            height = info.height,
            fps = info.fps,
            frame_count = info.frame_count,
            frame_bytes,
            "video decoder opened"
        );

        Ok(Self {
            path: path.to_path_buf(),
            width: info.width,
            height: info.height,
            fps: info.fps,
            frame_count: info.frame_count,
            frame_bytes,
            stream: None,
            respawns: 0,
        })
    }

    fn spawn_stream(&mut self, index: u32) -> Result<()> {
        // Half a frame early so timestamp rounding cannot skip the target frame.
        let seek_seconds = ((index as f64 - 0.5) / self.fps).max(0.0);
        debug!(index, seek_seconds, "spawning ffmpeg decoder process");

        let child = Command::new("ffmpeg")
            .args(["-v", "error", "-nostdin"])
            .args(["-ss", &format!("{seek_seconds:.6}")])
            .arg("-i")
            .arg(&self.path)
            .args(["-an", "-sn", "-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .context("failed to spawn ffmpeg (is ffmpeg installed?)")?;

        self.respawns += 1;
        self.stream = Some(FrameStream {
            child,
            next_index: index,
        });
        Ok(())
    }

    fn stream_reaches(&self, index: u32) -> bool {
        self.stream.as_ref().is_some_and(|s| {
            s.next_index <= index && index - s.next_index <= SEQUENTIAL_READ_WINDOW
        })
    }
}

impl FrameSource for VideoDecoder {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn frame_count(&self) -> u32 {
        self.frame_count
    }

    fn frame_at(&mut self, index: u32) -> Result<Frame> {
        if index >= self.frame_count {
            bail!("frame {index} is past the end of the video ({} frames)", self.frame_count);
        }

        if !self.stream_reaches(index) {
            self.spawn_stream(index)?;
        }

        let frame_bytes = self.frame_bytes;
        let mut buf = vec![0u8; frame_bytes];
        let stream = self.stream.as_mut().context("ffmpeg stream not available")?;
        let stdout = stream
            .child
            .stdout
            .as_mut()
            .context("ffmpeg stdout not available")?;

        while stream.next_index <= index {
            let complete = read_raw_frame(stdout, &mut buf, stream.next_index);
            match complete {
                Ok(true) => stream.next_index += 1,
                Ok(false) => {
                    self.stream = None;
                    bail!("ffmpeg stream ended before frame {index}");
                }
                Err(e) => {
                    self.stream = None;
                    return Err(e);
                }
            }
        }

        let image = RgbImage::from_raw(self.width, self.height, buf)
            .context("failed to create RgbImage from raw frame data")?;
        let timestamp_seconds = index as f64 / self.fps;

        debug!(index, timestamp_seconds, "decoded frame");

        Ok(Frame {
            image,
            index,
            timestamp_seconds,
        })
    }
}

impl Drop for VideoDecoder {
    fn drop(&mut self) {
        info!(respawns = self.respawns, "closing video decoder");
    }
}

/// Fill `buf` with one raw frame. Returns `Ok(false)` on a clean end of stream.
fn read_raw_frame(stdout: &mut ChildStdout, buf: &mut [u8], index: u32) -> Result<bool> {
    let mut read = 0;
    while read < buf.len() {
        match stdout.read(&mut buf[read..]) {
            Ok(0) => {
                if read == 0 {
                    info!(index, "video stream ended");
                    return Ok(false);
                }
                error!(
                    read_bytes = read,
                    expected_bytes = buf.len(),
                    index,
                    "ffmpeg stream ended mid-frame"
                );
                bail!("ffmpeg stream ended mid-frame (read {read}/{} bytes)", buf.len());
            }
            Ok(n) => read += n,
            Err(e) => {
                error!(index, %e, "failed to read from ffmpeg pipe");
                return Err(e).context("failed to read from ffmpeg pipe");
            }
        }
    }
    Ok(true)
}
