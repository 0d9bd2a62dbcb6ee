use std::fs;
use std::io::{ErrorKind, Read, Write};
use std::path::Path;
use std::process::{Child, ChildStderr, ChildStdin, Command, Stdio};

use crate::config::FRAMES_PER_SECOND;
use crate::error::{ChatReelError, ChatReelResult};
use crate::frame_renderer::Frame;

/// Destination for raw RGBA frames.
pub trait FrameSink {
    fn write_frame(&mut self, rgba: &[u8]) -> ChatReelResult<()>;
    /// Flushes and closes the destination. Called at most once.
    fn close(&mut self) -> ChatReelResult<()>;
}

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

pub fn ffmpeg_rawvideo_input_args(width: u32, height: u32, fps: u32) -> Vec<String> {
    vec![
        "-hide_banner".to_owned(),
        "-loglevel".to_owned(),
        "error".to_owned(),
        "-y".to_owned(),
        "-f".to_owned(),
        "rawvideo".to_owned(),
        "-pix_fmt".to_owned(),
        "rgba".to_owned(),
        "-s:v".to_owned(),
        format!("{width}x{height}"),
        "-r".to_owned(),
        fps.to_string(),
        "-i".to_owned(),
        "-".to_owned(),
        "-an".to_owned(),
    ]
}

pub fn ffmpeg_h264_output_args() -> Vec<String> {
    [
        "-c:v",
        "libx264",
        "-preset",
        "medium",
        "-crf",
        "18",
        "-pix_fmt",
        "yuv420p",
        "-movflags",
        "+faststart",
    ]
    .iter()
    .map(|arg| (*arg).to_owned())
    .collect()
}

pub fn ffmpeg_args(width: u32, height: u32, fps: u32, output_path: &Path) -> Vec<String> {
    let mut args = ffmpeg_rawvideo_input_args(width, height, fps);
    args.extend(ffmpeg_h264_output_args());
    args.push(output_path.to_string_lossy().into_owned());
    args
}

fn ensure_parent_dir(path: &Path) -> ChatReelResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)
            .map_err(|error| ChatReelError::resource(parent, error)),
        _ => Ok(()),
    }
}

/// Opens (and truncates) the output so a path ffmpeg could not write fails
/// here with the OS error instead of as a broken pipe mid-run.
fn ensure_writable(path: &Path) -> ChatReelResult<()> {
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map(drop)
        .map_err(|error| ChatReelError::resource(path, error))
}

/// `ffmpeg` child process reading raw RGBA from stdin.
pub struct FfmpegSink {
    child: Child,
    stdin: Option<ChildStdin>,
    stderr: Option<ChildStderr>,
    args: Vec<String>,
    /// Set once ffmpeg has exited with an error; later calls report it again.
    failure: Option<String>,
}

impl FfmpegSink {
    pub fn spawn(width: u32, height: u32, fps: u32, output_path: &Path) -> ChatReelResult<Self> {
        let path_str = output_path.to_string_lossy();
        if path_str.chars().any(|c| c.is_control()) {
            return Err(ChatReelError::config(
                "output path contains invalid control characters",
            ));
        }

        Self::spawn_program("ffmpeg", ffmpeg_args(width, height, fps, output_path))
    }

    fn spawn_program(program: &str, args: Vec<String>) -> ChatReelResult<Self> {
        let mut child = Command::new(program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|error| {
                if error.kind() == ErrorKind::NotFound {
                    ChatReelError::encoder(
                        "ffmpeg was not found on PATH. Install ffmpeg and verify `ffmpeg -version` works before rendering.",
                    )
                } else {
                    ChatReelError::encoder(format!("failed to spawn ffmpeg process: {error}"))
                }
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ChatReelError::encoder("failed to capture ffmpeg stdin"))?;
        let stderr = child.stderr.take();

        Ok(Self {
            child,
            stdin: Some(stdin),
            stderr,
            args,
            failure: None,
        })
    }

    /// ffmpeg closed its stdin early: reap it and report why it stopped.
    fn exit_failure(&mut self) -> ChatReelError {
        if let Some(failure) = &self.failure {
            return ChatReelError::encoder(failure.clone());
        }
        self.stdin = None;
        let status = match self.child.wait() {
            Ok(status) => status.to_string(),
            Err(error) => format!("unknown ({error})"),
        };
        let stderr_tail = read_stderr_tail(&mut self.stderr);
        let message = format!(
            "ffmpeg exited before reading all frames with status {status} (args='{}', stderr_tail='{}')",
            self.args.join(" "),
            stderr_tail
        );
        self.record_failure(message)
    }

    fn record_failure(&mut self, message: String) -> ChatReelError {
        self.failure = Some(message.clone());
        ChatReelError::encoder(message)
    }
}

impl FrameSink for FfmpegSink {
    fn write_frame(&mut self, rgba: &[u8]) -> ChatReelResult<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| ChatReelError::encoder("ffmpeg stdin is already closed"))?;
        match stdin.write_all(rgba) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::BrokenPipe => Err(self.exit_failure()),
            Err(error) => Err(ChatReelError::encoder(format!(
                "failed to write frame to ffmpeg stdin: {error}"
            ))),
        }
    }

    fn close(&mut self) -> ChatReelResult<()> {
        if let Some(mut stdin) = self.stdin.take() {
            // A broken pipe here means ffmpeg already exited; its status says why.
            let _ = stdin.flush();
        }

        if let Some(failure) = &self.failure {
            return Err(ChatReelError::encoder(failure.clone()));
        }
        let status = self
            .child
            .wait()
            .map_err(|error| ChatReelError::encoder(format!("failed waiting for ffmpeg: {error}")))?;
        let stderr_tail = read_stderr_tail(&mut self.stderr);
        if !status.success() {
            let message = format!(
                "ffmpeg failed with status {status} (args='{}', stderr_tail='{}')",
                self.args.join(" "),
                stderr_tail
            );
            return Err(self.record_failure(message));
        }
        Ok(())
    }
}

fn read_stderr_tail(stderr: &mut Option<ChildStderr>) -> String {
    let Some(mut pipe) = stderr.take() else {
        return String::new();
    };
    let mut buf = Vec::new();
    if pipe.read_to_end(&mut buf).is_err() {
        return String::new();
    }
    last_n_chars(&String::from_utf8_lossy(&buf), 500)
}

fn last_n_chars(s: &str, max_chars: usize) -> String {
    let count = s.chars().count();
    s.chars()
        .skip(count.saturating_sub(max_chars))
        .collect::<String>()
        .trim()
        .to_owned()
}

/// Appends fixed-size frames to one video stream and finalizes it exactly once.
///
/// Dropping an encoder that was never finalized finalizes it, so a run that
/// bails out early still leaves a closed container behind.
pub struct VideoEncoder<S: FrameSink = FfmpegSink> {
    sink: S,
    width: u32,
    height: u32,
    frames_written: u64,
    finalized: bool,
}

impl VideoEncoder<FfmpegSink> {
    pub fn open(output_path: &Path, width: u32, height: u32) -> ChatReelResult<Self> {
        if width == 0 || height == 0 {
            return Err(ChatReelError::config("encoder width/height must be non-zero"));
        }
        ensure_parent_dir(output_path)?;
        ensure_writable(output_path)?;
        let sink = FfmpegSink::spawn(width, height, FRAMES_PER_SECOND, output_path)?;
        tracing::debug!(
            output = %output_path.display(),
            width,
            height,
            fps = FRAMES_PER_SECOND,
            "opened ffmpeg encoder"
        );
        Ok(Self::with_sink(sink, width, height))
    }
}

impl<S: FrameSink> VideoEncoder<S> {
    pub fn with_sink(sink: S, width: u32, height: u32) -> Self {
        Self {
            sink,
            width,
            height,
            frames_written: 0,
            finalized: false,
        }
    }

    pub fn frame_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn append_frame(&mut self, frame: &Frame) -> ChatReelResult<()> {
        if self.finalized {
            return Err(ChatReelError::encoder("encoder has already been finalized"));
        }
        if frame.width != self.width || frame.height != self.height {
            return Err(ChatReelError::FrameSizeMismatch {
                expected_width: self.width,
                expected_height: self.height,
                width: frame.width,
                height: frame.height,
            });
        }
        let expected_len = self.width as usize * self.height as usize * 4;
        if frame.rgba.len() != expected_len {
            return Err(ChatReelError::encoder(format!(
                "frame buffer holds {} bytes, expected {expected_len}",
                frame.rgba.len()
            )));
        }

        self.sink.write_frame(&frame.rgba)?;
        self.frames_written += 1;
        Ok(())
    }

    /// Closes the stream and returns the number of frames written. Later
    /// calls return the same count without touching the sink again.
    pub fn finalize(&mut self) -> ChatReelResult<u64> {
        if self.finalized {
            return Ok(self.frames_written);
        }
        self.finalized = true;
        self.sink.close()?;
        tracing::debug!(frames = self.frames_written, "encoder finalized");
        Ok(self.frames_written)
    }
}

impl<S: FrameSink> Drop for VideoEncoder<S> {
    fn drop(&mut self) {
        if self.finalized {
            return;
        }
        tracing::warn!(
            frames = self.frames_written,
            "encoder dropped without finalize; closing partial output"
        );
        if let Err(error) = self.finalize() {
            tracing::warn!(%error, "failed to finalize partial output");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[derive(Default)]
    struct Recorded {
        frames: Vec<Vec<u8>>,
        closes: usize,
    }

    #[derive(Clone, Default)]
    struct RecordingSink(Rc<RefCell<Recorded>>);

    impl FrameSink for RecordingSink {
        fn write_frame(&mut self, rgba: &[u8]) -> ChatReelResult<()> {
            self.0.borrow_mut().frames.push(rgba.to_vec());
            Ok(())
        }

        fn close(&mut self) -> ChatReelResult<()> {
            self.0.borrow_mut().closes += 1;
            Ok(())
        }
    }

    #[test]
    fn finalize_reports_every_appended_frame_once() {
        let sink = RecordingSink::default();
        let mut encoder = VideoEncoder::with_sink(sink.clone(), 4, 2);
        for shade in 0..3u8 {
            encoder
                .append_frame(&Frame::solid(4, 2, [shade, shade, shade, 255]))
                .unwrap();
        }
        assert_eq!(encoder.finalize().unwrap(), 3);
        assert_eq!(encoder.finalize().unwrap(), 3);
        drop(encoder);

        let recorded = sink.0.borrow();
        assert_eq!(recorded.frames.len(), 3);
        assert_eq!(recorded.frames[2][0], 2);
        assert_eq!(recorded.closes, 1);
    }

    #[test]
    fn wrong_sized_frame_is_rejected_without_writing() {
        let sink = RecordingSink::default();
        let mut encoder = VideoEncoder::with_sink(sink.clone(), 4, 2);
        let err = encoder
            .append_frame(&Frame::solid(2, 4, [0, 0, 0, 255]))
            .unwrap_err();
        assert!(matches!(
            err,
            ChatReelError::FrameSizeMismatch {
                expected_width: 4,
                expected_height: 2,
                width: 2,
                height: 4,
            }
        ));

        let truncated = Frame {
            width: 4,
            height: 2,
            rgba: vec![0; 8],
        };
        assert!(encoder.append_frame(&truncated).is_err());
        assert_eq!(encoder.frames_written(), 0);
        assert!(sink.0.borrow().frames.is_empty());
    }

    #[test]
    fn append_after_finalize_fails() {
        let mut encoder = VideoEncoder::with_sink(RecordingSink::default(), 2, 2);
        encoder.finalize().unwrap();
        assert!(encoder.is_finalized());
        let err = encoder
            .append_frame(&Frame::solid(2, 2, [0, 0, 0, 255]))
            .unwrap_err();
        assert!(matches!(err, ChatReelError::Encoder(_)), "{err}");
    }

    #[test]
    fn drop_finalizes_partial_output() {
        let sink = RecordingSink::default();
        {
            let mut encoder = VideoEncoder::with_sink(sink.clone(), 2, 2);
            encoder
                .append_frame(&Frame::solid(2, 2, [9, 9, 9, 255]))
                .unwrap();
        }
        let recorded = sink.0.borrow();
        assert_eq!(recorded.frames.len(), 1);
        assert_eq!(recorded.closes, 1);
    }

    #[test]
    fn ffmpeg_args_declare_one_fps_rawvideo_input() {
        let args = ffmpeg_args(400, 1080, FRAMES_PER_SECOND, Path::new("out/chat.mp4"));
        let joined = args.join(" ");
        assert!(joined.contains("-f rawvideo -pix_fmt rgba -s:v 400x1080 -r 1 -i -"), "{joined}");
        assert!(joined.contains("-c:v libx264"), "{joined}");
        assert_eq!(args.last().map(String::as_str), Some("out/chat.mp4"));
    }

    #[test]
    fn unwritable_output_is_a_resource_error_before_spawning() {
        let dir = tempfile::tempdir().unwrap();
        let err = match VideoEncoder::open(dir.path(), 2, 2) {
            Ok(_) => panic!("a directory is not a writable output file"),
            Err(err) => err,
        };
        match err {
            ChatReelError::Resource { path, .. } => assert_eq!(path, dir.path()),
            other => panic!("expected resource error, got {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn early_ffmpeg_exit_reports_its_stderr() {
        let script = "echo 'out.mp4: Permission denied' >&2; exit 1";
        let mut sink =
            FfmpegSink::spawn_program("sh", vec!["-c".to_owned(), script.to_owned()]).unwrap();

        // Larger than a pipe buffer, so the write cannot finish before `sh` exits.
        let err = sink.write_frame(&vec![0u8; 1 << 20]).unwrap_err();
        let text = err.to_string();
        assert!(matches!(err, ChatReelError::Encoder(_)), "{text}");
        assert!(text.contains("Permission denied"), "{text}");
        assert!(!text.contains("Broken pipe"), "{text}");

        let close_err = sink.close().unwrap_err();
        assert_eq!(close_err.to_string(), text);
    }

    #[test]
    fn stderr_tail_keeps_last_chars() {
        assert_eq!(last_n_chars("  abcdef  ", 4), "ef");
        assert_eq!(last_n_chars("abc", 10), "abc");
    }
}
