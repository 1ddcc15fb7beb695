use crate::video::{VideoFrames, DEFAULT_FPS};
use crate::Image;
use anyhow::{bail, ensure, Context, Result};
use log::{info, warn};
use rayon::prelude::*;
use serde::Deserialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

const FRAME_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: u32,
    height: u32,
    #[serde(default)]
    r_frame_rate: Option<String>,
}

impl VideoFrames {
    /// Decodes a video file with `ffmpeg`, or loads a directory of frame images in name order.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.is_dir() {
            Self::open_frame_dir(path)
        } else {
            Self::open_video_file(path)
        }
    }

    pub fn open_frame_dir(dir: &Path) -> Result<Self> {
        let mut paths = std::fs::read_dir(dir)
            .with_context(|| format!("Cannot read frame directory {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| is_frame_file(path))
            .collect::<Vec<PathBuf>>();
        paths.sort();

        let frames = paths
            .iter()
            .map(Image::open_file)
            .collect::<Result<Vec<_>>>()?;
        ensure!(!frames.is_empty(), "No frames found in {}", dir.display());

        let size = frames[0].get_size();
        ensure!(
            frames.iter().all(|frame| frame.get_size() == size),
            "Frames in {} do not share one size",
            dir.display()
        );
        info!("Loaded {} frames from {}", frames.len(), dir.display());

        Ok(VideoFrames::new(frames, DEFAULT_FPS))
    }

    pub fn open_video_file(path: &Path) -> Result<Self> {
        ensure!(path.exists(), "Video file not found: {}", path.display());
        let stream = probe(path)?;
        let fps = stream
            .r_frame_rate
            .as_deref()
            .and_then(parse_frame_rate)
            .unwrap_or(DEFAULT_FPS);

        let output = Command::new("ffmpeg")
            .args(decode_args(path))
            .output()
            .context("Failed to execute ffmpeg - is it installed?")?;
        if !output.status.success() {
            bail!("ffmpeg failed: {}", String::from_utf8_lossy(&output.stderr));
        }

        let frames = split_frames(&output.stdout, (stream.width, stream.height))?;
        ensure!(!frames.is_empty(), "No frames decoded from {}", path.display());
        info!("Decoded {} frames at {:.2} FPS from {}", frames.len(), fps, path.display());

        Ok(VideoFrames::new(frames, fps))
    }
}

/// Rotation metadata is ignored so frames keep the probed width and height.
fn decode_args(path: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-v", "error", "-noautorotate", "-i"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(path.as_os_str().to_owned());
    args.extend(["-f", "rawvideo", "-pix_fmt", "rgb24", "-"].map(OsString::from));
    args
}

/// Cuts raw `rgb24` output into frames of `size`.
fn split_frames(raw: &[u8], size: (u32, u32)) -> Result<Vec<Image>> {
    let frame_len = (size.0 as usize) * (size.1 as usize) * 3;
    ensure!(frame_len > 0, "Video stream reports an empty frame size");
    let trailing = raw.len() % frame_len;
    if trailing != 0 {
        warn!("Dropping {} trailing bytes of a partial frame", trailing);
    }

    raw.par_chunks_exact(frame_len)
        .map(|chunk| Image::from_raw(size, chunk.to_vec()))
        .collect()
}

fn probe(path: &Path) -> Result<ProbeStream> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,r_frame_rate",
            "-of",
            "json",
        ])
        .arg(path)
        .output()
        .context("Failed to execute ffprobe - is it installed?")?;
    if !output.status.success() {
        bail!("ffprobe failed: {}", String::from_utf8_lossy(&output.stderr));
    }

    parse_probe(&output.stdout)
}

fn parse_probe(stdout: &[u8]) -> Result<ProbeStream> {
    let probe: ProbeOutput = serde_json::from_slice(stdout).context("Unexpected ffprobe output")?;
    match probe.streams.into_iter().next() {
        Some(stream) => Ok(stream),
        None => bail!("No video stream found"),
    }
}

/// `"30000/1001"` or `"25"` to frames per second.
fn parse_frame_rate(rate: &str) -> Option<f32> {
    let fps = match rate.split_once('/') {
        Some((num, den)) => {
            let den = den.trim().parse::<f32>().ok()?;
            if den == 0.0 {
                return None;
            }
            num.trim().parse::<f32>().ok()? / den
        }
        None => rate.trim().parse::<f32>().ok()?,
    };

    (fps.is_finite() && fps > 0.0).then_some(fps)
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rates_parse() {
        assert_eq!(parse_frame_rate("30/1"), Some(30.0));
        assert_eq!(parse_frame_rate("25"), Some(25.0));
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("abc"), None);
    }

    #[test]
    fn probe_json_yields_first_stream() {
        let json = br#"{"streams":[{"width":640,"height":360,"r_frame_rate":"24/1"}]}"#;
        let stream = parse_probe(json).unwrap();
        assert_eq!((stream.width, stream.height), (640, 360));
        assert_eq!(stream.r_frame_rate.as_deref(), Some("24/1"));

        assert!(parse_probe(br#"{"streams":[]}"#).is_err());
    }

    #[test]
    fn decoding_keeps_the_stored_orientation() {
        let args = decode_args(Path::new("clip.mp4"));
        let position = |flag: &str| args.iter().position(|arg| arg == flag).unwrap();

        assert!(position("-noautorotate") < position("-i"));
        assert_eq!(args[position("-i") + 1], OsString::from("clip.mp4"));
        assert_eq!(args.last(), Some(&OsString::from("-")));
    }

    #[test]
    fn raw_output_splits_into_ordered_frames() {
        let mut raw = Vec::new();
        for shade in 0..5u8 {
            raw.extend(std::iter::repeat(shade).take(4 * 2 * 3));
        }
        raw.extend([9, 9, 9]);

        let frames = split_frames(&raw, (4, 2)).unwrap();

        assert_eq!(frames.len(), 5);
        for (shade, frame) in frames.iter().enumerate() {
            assert_eq!(frame.get_size(), (4, 2));
            assert!(frame.raw_data().iter().all(|v| *v == shade as u8));
        }
        assert!(split_frames(&raw, (0, 2)).is_err());
    }

    #[test]
    fn frame_files_are_recognized_by_extension() {
        assert!(is_frame_file(Path::new("a/00001.JPG")));
        assert!(is_frame_file(Path::new("a/00001.png")));
        assert!(!is_frame_file(Path::new("a/notes.txt")));
        assert!(!is_frame_file(Path::new("a/noext")));
    }
}
