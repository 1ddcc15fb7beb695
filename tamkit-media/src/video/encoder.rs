use crate::Image;
use anyhow::{bail, ensure, Context, Result};
use log::debug;
use std::io::{Read, Write};
use std::path::Path;
use std::process::{Child, ChildStderr, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;

/// Streams `rgb24` frames into an `ffmpeg` child that encodes an MP4 file.
pub struct VideoWriter {
    child: Child,
    stdin: Option<ChildStdin>,
    stderr: Option<JoinHandle<String>>,
    size: (u32, u32),
    written: usize,
}

impl VideoWriter {
    pub fn create(path: impl AsRef<Path>, size: (u32, u32), fps: f32) -> Result<Self> {
        let path = path.as_ref();
        let mut child = Command::new("ffmpeg")
            .args(["-y", "-v", "error", "-f", "rawvideo", "-pix_fmt", "rgb24"])
            .args(["-s", &format!("{}x{}", size.0, size.1)])
            .args(["-r", &format!("{fps}")])
            .args(["-i", "-"])
            .args(["-vf", "pad=ceil(iw/2)*2:ceil(ih/2)*2"])
            .args(["-c:v", "mpeg4", "-q:v", "3", "-pix_fmt", "yuv420p"])
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .context("Failed to execute ffmpeg - is it installed?")?;
        let stdin = child.stdin.take();
        let stderr = child.stderr.take().map(drain_stderr);
        debug!("Encoding {}x{} video to {}", size.0, size.1, path.display());

        Ok(Self {
            child,
            stdin,
            stderr,
            size,
            written: 0,
        })
    }

    pub fn write(&mut self, frame: &Image) -> Result<()> {
        ensure!(
            frame.get_size() == self.size,
            "Frame is {:?}, video is {:?}",
            frame.get_size(),
            self.size
        );
        let stdin = match self.stdin.as_mut() {
            Some(stdin) => stdin,
            None => bail!("Video writer already finished"),
        };
        stdin
            .write_all(frame.raw_data())
            .context("ffmpeg stopped accepting frames")?;
        self.written += 1;

        Ok(())
    }

    pub fn frames_written(&self) -> usize {
        self.written
    }

    /// Closes the stream and waits for `ffmpeg` to finish the file.
    pub fn finish(mut self) -> Result<()> {
        drop(self.stdin.take());

        let status = self.child.wait()?;
        let stderr = self
            .stderr
            .take()
            .and_then(|reader| reader.join().ok())
            .unwrap_or_default();
        if !status.success() {
            bail!("ffmpeg failed: {}", stderr);
        }
        debug!("Encoded {} frames", self.written);

        Ok(())
    }
}

/// Collects the child's stderr on its own thread while frames are written.
fn drain_stderr(mut pipe: ChildStderr) -> JoinHandle<String> {
    std::thread::spawn(move || {
        let mut text = String::new();
        let _ = pipe.read_to_string(&mut text);
        text
    })
}

impl Drop for VideoWriter {
    fn drop(&mut self) {
        if self.stdin.take().is_some() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn stderr_is_collected_while_the_child_runs() {
        let mut child = Command::new("sh")
            .args(["-c", "head -c 200000 /dev/zero | tr '\\0' x >&2; echo done >&2"])
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();
        let reader = drain_stderr(child.stderr.take().unwrap());

        assert!(child.wait().unwrap().success());
        let text = reader.join().unwrap();
        assert_eq!(text.len(), 200_005);
        assert!(text.ends_with("done\n"));
    }
}
