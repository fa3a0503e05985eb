use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use tracing::{debug, info, warn};

use crate::config::CodecConfig;
use crate::error::{PipelineError, Result};
use crate::frames::{self, FrameRef};

/// Video stream information reported by ffprobe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoInfo {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub frame_count: Option<u64>,
    /// Display rotation in degrees from the stream's side data or tags
    pub rotation: i32,
}

impl VideoInfo {
    /// Size of the frames ffmpeg actually emits
    ///
    /// ffmpeg applies the display rotation while decoding, so a quarter turn
    /// swaps the stored width and height.
    pub fn decoded_dimensions(&self) -> (u32, u32) {
        if self.rotation.rem_euclid(180) == 90 {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }
}

/// Frame codec backed by the system `ffmpeg`/`ffprobe` binaries
///
/// Decoding streams raw RGB frames out of ffmpeg and writes each one as an
/// independent JPEG; encoding streams raw RGB frames into ffmpeg's stdin.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    config: CodecConfig,
}

impl FrameCodec {
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    /// Whether the configured ffmpeg binary can be executed
    pub fn is_available(&self) -> bool {
        binary_on_path(&self.config.ffmpeg_bin) && binary_on_path(&self.config.ffprobe_bin)
    }

    /// Read the first video stream's geometry and rate
    pub fn probe(&self, video_path: &Path) -> Result<VideoInfo> {
        if !video_path.is_file() {
            return Err(PipelineError::NotReadable(format!(
                "{} does not exist",
                video_path.display()
            )));
        }

        let output = Command::new(&self.config.ffprobe_bin)
            .args([
                "-v", "error",
                "-select_streams", "v:0",
                "-show_entries",
                "stream=width,height,r_frame_rate,nb_frames:stream_tags=rotate:stream_side_data=rotation",
                "-of", "json",
            ])
            .arg(video_path)
            .output()
            .map_err(|e| PipelineError::internal(format!("failed to run ffprobe: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::NotReadable(format!(
                "ffprobe failed for {}: {}",
                video_path.display(),
                stderr.trim()
            )));
        }

        let probe: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| PipelineError::NotReadable(format!("unparseable ffprobe output: {e}")))?;

        let stream = probe["streams"]
            .as_array()
            .and_then(|streams| streams.first())
            .ok_or_else(|| {
                PipelineError::NotReadable(format!("no video stream in {}", video_path.display()))
            })?;

        let width = stream["width"].as_u64().unwrap_or(0) as u32;
        let height = stream["height"].as_u64().unwrap_or(0) as u32;
        if width == 0 || height == 0 {
            return Err(PipelineError::NotReadable(format!(
                "video stream in {} has no dimensions",
                video_path.display()
            )));
        }

        let info = VideoInfo {
            path: video_path.to_path_buf(),
            width,
            height,
            fps: stream["r_frame_rate"].as_str().and_then(parse_rate).unwrap_or(0.0),
            frame_count: stream["nb_frames"].as_str().and_then(|s| s.parse().ok()),
            rotation: stream_rotation(stream),
        };

        debug!("📹 Probed video: {} ({}x{}, {:.1}fps, rotation {})",
               video_path.display(), info.width, info.height, info.fps, info.rotation);

        Ok(info)
    }

    /// Decode every frame of `video_path` into `output_dir/frame_NNNNN.jpg`
    ///
    /// End of stream terminates the read loop normally; an empty video yields
    /// a count of zero.
    pub fn decode_to_frames(&self, video_path: &Path, output_dir: &Path) -> Result<usize> {
        let info = self.probe(video_path)?;
        std::fs::create_dir_all(output_dir)?;

        let mut child = Command::new(&self.config.ffmpeg_bin)
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(video_path)
            .args(["-map", "0:v:0", "-an", "-sn", "-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| PipelineError::internal(format!("failed to spawn ffmpeg: {e}")))?;

        let stderr_reader = child.stderr.take().map(|mut stderr| {
            std::thread::spawn(move || {
                let mut text = String::new();
                let _ = stderr.read_to_string(&mut text);
                text
            })
        });

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| PipelineError::internal("failed to open ffmpeg stdout"))?;

        let (width, height) = info.decoded_dimensions();
        let frame_len = width as usize * height as usize * 3;
        let mut buffer = vec![0u8; frame_len];
        let mut count: usize = 0;

        let read_result: Result<()> = (|| {
            loop {
                let filled = read_full(&mut stdout, &mut buffer)?;
                if filled == 0 {
                    break;
                }
                if filled < frame_len {
                    warn!("Discarding truncated trailing frame ({} of {} bytes)", filled, frame_len);
                    break;
                }

                let frame = image::RgbImage::from_raw(width, height, buffer.clone())
                    .ok_or_else(|| PipelineError::internal("decoded frame has unexpected size"))?;
                let frame_path = output_dir.join(frames::frame_file_name(count as u32));
                frames::save_frame(&frame, &frame_path, self.config.jpeg_quality)?;
                count += 1;
            }
            Ok(())
        })();

        if read_result.is_err() {
            let _ = child.kill();
        }
        drop(stdout);

        let status = child
            .wait()
            .map_err(|e| PipelineError::internal(format!("failed to wait for ffmpeg: {e}")))?;
        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        read_result?;

        if !status.success() {
            return Err(PipelineError::NotReadable(format!(
                "ffmpeg exited with status {} for {}: {}",
                status,
                video_path.display(),
                stderr.trim()
            )));
        }

        info!("🎞️ Extracted {} frames from {}", count, video_path.display());
        Ok(count)
    }

    /// Encode `sequence` (already in playback order) into a single video
    ///
    /// The first frame fixes the output resolution; later frames with other
    /// dimensions fail with `DimensionMismatch` and the partial output is
    /// removed. yuv420p needs even sizes, so an odd width or height is padded
    /// by one black pixel (see [`EncodeConfig::output_dimensions`]).
    pub fn encode_frames(&self, sequence: &[FrameRef], fps: u32, out_path: &Path) -> Result<PathBuf> {
        let first = sequence
            .first()
            .ok_or_else(|| PipelineError::NoFrames(format!("nothing to encode into {}", out_path.display())))?;

        let first_frame = frames::load_frame(&first.path)?;
        let cfg = EncodeConfig {
            width: first_frame.width(),
            height: first_frame.height(),
            fps,
            video_codec: self.config.video_codec.clone(),
            ffmpeg_bin: self.config.ffmpeg_bin.clone(),
            out_path: out_path.to_path_buf(),
        };

        let result: Result<()> = (|| {
            let mut encoder = FfmpegEncoder::new(cfg)?;
            encoder.encode_frame(&first_frame)?;
            for frame_ref in &sequence[1..] {
                let frame = frames::load_frame(&frame_ref.path)?;
                encoder.encode_frame(&frame).map_err(|e| match e {
                    PipelineError::DimensionMismatch(msg) => PipelineError::DimensionMismatch(
                        format!("{}: {}", frame_ref.file_name(), msg),
                    ),
                    other => other,
                })?;
            }
            encoder.finish()
        })();

        if let Err(e) = result {
            if out_path.exists() {
                if let Err(remove_err) = std::fs::remove_file(out_path) {
                    warn!("Failed to remove partial video {}: {}", out_path.display(), remove_err);
                }
            }
            return Err(e);
        }

        info!("🎬 Encoded {} frames into {}", sequence.len(), out_path.display());
        Ok(out_path.to_path_buf())
    }

    /// Count decodable frames with ffprobe
    pub fn count_frames(&self, video_path: &Path) -> Result<u64> {
        let output = Command::new(&self.config.ffprobe_bin)
            .args([
                "-v", "error",
                "-select_streams", "v:0",
                "-count_frames",
                "-show_entries", "stream=nb_read_frames",
                "-of", "csv=p=0",
            ])
            .arg(video_path)
            .output()
            .map_err(|e| PipelineError::internal(format!("failed to run ffprobe: {e}")))?;

        if !output.status.success() {
            return Err(PipelineError::NotReadable(format!(
                "ffprobe could not count frames in {}",
                video_path.display()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout);
        text.trim()
            .trim_end_matches(',')
            .parse()
            .map_err(|_| PipelineError::NotReadable(format!("unexpected frame count '{}'", text.trim())))
    }
}

/// Settings for one ffmpeg encode
#[derive(Clone, Debug)]
pub struct EncodeConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub video_codec: String,
    pub ffmpeg_bin: String,
    pub out_path: PathBuf,
}

impl EncodeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(PipelineError::InvalidInput("encode width/height must be non-zero".into()));
        }
        if self.fps == 0 {
            return Err(PipelineError::InvalidInput("encode fps must be non-zero".into()));
        }
        Ok(())
    }

    /// Size of the encoded video: the frame size rounded up to even
    pub fn output_dimensions(&self) -> (u32, u32) {
        (self.width + self.width % 2, self.height + self.height % 2)
    }
}

/// Streaming encoder writing rgb24 frames into an ffmpeg child process
pub struct FfmpegEncoder {
    cfg: EncodeConfig,
    child: Child,
    stdin: Option<ChildStdin>,
}

impl FfmpegEncoder {
    pub fn new(cfg: EncodeConfig) -> Result<Self> {
        cfg.validate()?;
        if let Some(parent) = cfg.out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut cmd = Command::new(&cfg.ffmpeg_bin);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let (out_width, out_height) = cfg.output_dimensions();
        if (out_width, out_height) != (cfg.width, cfg.height) {
            debug!("Padding {}x{} frames to {}x{} for yuv420p", cfg.width, cfg.height, out_width, out_height);
        }
        cmd.args([
            "-y",
            "-loglevel", "error",
            "-f", "rawvideo",
            "-pix_fmt", "rgb24",
            "-s", &format!("{}x{}", cfg.width, cfg.height),
            "-r", &cfg.fps.to_string(),
            "-i", "pipe:0",
            "-an",
            "-vf", &format!("pad={}:{}", out_width, out_height),
            "-c:v", &cfg.video_codec,
            "-pix_fmt", "yuv420p",
            "-movflags", "+faststart",
        ])
        .arg(&cfg.out_path);

        let mut child = cmd
            .spawn()
            .map_err(|e| PipelineError::internal(format!("failed to spawn ffmpeg: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| PipelineError::internal("failed to open ffmpeg stdin"))?;

        Ok(Self {
            cfg,
            child,
            stdin: Some(stdin),
        })
    }

    pub fn encode_frame(&mut self, frame: &image::RgbImage) -> Result<()> {
        if frame.width() != self.cfg.width || frame.height() != self.cfg.height {
            return Err(PipelineError::DimensionMismatch(format!(
                "got {}x{}, expected {}x{}",
                frame.width(),
                frame.height(),
                self.cfg.width,
                self.cfg.height
            )));
        }

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(PipelineError::internal("ffmpeg encoder is already finalized"));
        };

        stdin
            .write_all(frame.as_raw())
            .map_err(|e| PipelineError::internal(format!("failed to write frame to ffmpeg: {e}")))
    }

    pub fn finish(mut self) -> Result<()> {
        drop(self.stdin.take());

        let mut stderr = String::new();
        if let Some(mut pipe) = self.child.stderr.take() {
            let _ = pipe.read_to_string(&mut stderr);
        }

        let status = self
            .child
            .wait()
            .map_err(|e| PipelineError::internal(format!("failed to wait for ffmpeg: {e}")))?;

        if !status.success() {
            return Err(PipelineError::internal(format!(
                "ffmpeg exited with status {}: {}",
                status,
                stderr.trim()
            )));
        }

        Ok(())
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        // Abandoned before finish(): stop the child instead of leaving it blocked on stdin
        if self.stdin.take().is_some() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Rotation of a probed stream; side data wins over the legacy `rotate` tag
fn stream_rotation(stream: &serde_json::Value) -> i32 {
    let side_data = stream["side_data_list"]
        .as_array()
        .and_then(|list| list.iter().find_map(|entry| entry["rotation"].as_f64()));
    let tag = stream["tags"]["rotate"].as_str().and_then(|r| r.trim().parse::<f64>().ok());
    side_data.or(tag).map(|deg| deg.round() as i32).unwrap_or(0)
}

fn binary_on_path(bin: &str) -> bool {
    Command::new(bin)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn parse_rate(rate: &str) -> Option<f64> {
    match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            if den == 0.0 {
                None
            } else {
                Some(num / den)
            }
        }
        None => rate.parse().ok(),
    }
}

/// Fill `buf` from `reader`, returning fewer bytes only at end of stream
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
