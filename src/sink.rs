//! Per-frame outputs: overlay, track log, encoded video and live preview.

use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::NaiveTime;
use tracing::debug;

use crate::error::TrackError;
use crate::state::TrackState;

/// One line of the track log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogEntry {
    pub timestamp: NaiveTime,
    pub state: TrackState,
}

impl LogEntry {
    pub fn new(timestamp: NaiveTime, state: TrackState) -> Self {
        Self { timestamp, state }
    }

    /// Stamp `state` with the local wall-clock time.
    pub fn now(state: TrackState) -> Self {
        Self::new(chrono::Local::now().time(), state)
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ", self.timestamp.format("%H:%M:%S"))?;
        match self.state {
            TrackState::Active(b) => write!(
                f,
                "status=ok box=[{},{},{},{}]",
                b.x, b.y, b.width, b.height
            ),
            TrackState::Lost => f.write_str("status=lost"),
        }
    }
}

/// Append-only text log, one line per processed frame.
pub struct TrackLog<W: Write> {
    writer: W,
    lines: u64,
}

/// Create (or truncate) the track log file, creating parent directories.
pub fn create_log_file<P: AsRef<Path>>(path: P) -> Result<BufWriter<File>, TrackError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    debug!(path = %path.display(), "track log opened");
    Ok(BufWriter::new(file))
}

impl<W: Write> TrackLog<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, lines: 0 }
    }

    pub fn append(&mut self, entry: &LogEntry) -> Result<(), TrackError> {
        writeln!(self.writer, "{entry}")?;
        self.lines += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), TrackError> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn lines(&self) -> u64 {
        self.lines
    }
}

/// Draws the track state onto a frame.
pub trait Annotator<I> {
    fn annotate(&mut self, image: &mut I, state: &TrackState) -> Result<(), TrackError>;
}

/// Encoded output video.
pub trait VideoSink<I> {
    fn write_frame(&mut self, image: &I) -> Result<(), TrackError>;

    /// Flush pending output at the end of a run. Resources themselves are
    /// released on drop.
    fn finish(&mut self) -> Result<(), TrackError> {
        Ok(())
    }
}

/// What the user asked for while a frame was on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Continue,
    Quit,
}

/// Live preview window.
pub trait LiveDisplay<I> {
    /// Show `image` and poll for a key press.
    fn show(&mut self, image: &I) -> Result<KeyAction, TrackError>;
}

/// Display for headless runs; never asks to quit.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDisplay;

impl<I> LiveDisplay<I> for NullDisplay {
    fn show(&mut self, _image: &I) -> Result<KeyAction, TrackError> {
        Ok(KeyAction::Continue)
    }
}

/// All per-frame outputs of a run, written by a single owner.
pub struct RenderSink<I> {
    annotator: Box<dyn Annotator<I>>,
    video: Box<dyn VideoSink<I>>,
    log: TrackLog<Box<dyn Write>>,
    display: Box<dyn LiveDisplay<I>>,
    frames_written: u64,
}

impl<I> RenderSink<I> {
    pub fn new(
        annotator: impl Annotator<I> + 'static,
        video: impl VideoSink<I> + 'static,
        log: impl Write + 'static,
        display: impl LiveDisplay<I> + 'static,
    ) -> Self {
        Self {
            annotator: Box::new(annotator),
            video: Box::new(video),
            log: TrackLog::new(Box::new(log)),
            display: Box::new(display),
            frames_written: 0,
        }
    }

    /// Emit one processed frame: annotate, log, encode, then display.
    pub fn consume(&mut self, image: &mut I, entry: &LogEntry) -> Result<KeyAction, TrackError> {
        self.annotator.annotate(image, &entry.state)?;
        self.log.append(entry)?;
        self.video.write_frame(image)?;
        self.frames_written += 1;
        self.display.show(image)
    }

    /// Flush the log and the video at the end of a run.
    pub fn finish(&mut self) -> Result<(), TrackError> {
        self.log.flush()?;
        self.video.finish()
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn log_lines(&self) -> u64 {
        self.log.lines()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::BBox;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn noon() -> NaiveTime {
        NaiveTime::from_hms_opt(12, 4, 9).unwrap()
    }

    #[test]
    fn test_active_line_format() {
        let entry = LogEntry::new(noon(), TrackState::Active(BBox::new(10, -2, 30, 40)));
        assert_eq!(entry.to_string(), "[12:04:09] status=ok box=[10,-2,30,40]");
    }

    #[test]
    fn test_lost_line_format() {
        let entry = LogEntry::new(noon(), TrackState::Lost);
        assert_eq!(entry.to_string(), "[12:04:09] status=lost");
    }

    #[test]
    fn test_track_log_counts_lines() {
        let mut log = TrackLog::new(Vec::new());
        log.append(&LogEntry::new(noon(), TrackState::Lost)).unwrap();
        log.append(&LogEntry::new(noon(), TrackState::Lost)).unwrap();
        assert_eq!(log.lines(), 2);
        let text = String::from_utf8(log.writer.clone()).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[derive(Clone, Default)]
    struct Calls(Rc<RefCell<Vec<&'static str>>>);

    struct StepAnnotator(Calls);
    struct StepVideo(Calls);
    struct StepDisplay(Calls);
    struct StepLog(Calls);

    impl Annotator<u8> for StepAnnotator {
        fn annotate(&mut self, image: &mut u8, _state: &TrackState) -> Result<(), TrackError> {
            *image += 1;
            self.0.0.borrow_mut().push("annotate");
            Ok(())
        }
    }

    impl VideoSink<u8> for StepVideo {
        fn write_frame(&mut self, image: &u8) -> Result<(), TrackError> {
            assert_eq!(*image, 1, "frame must be annotated before encoding");
            self.0.0.borrow_mut().push("write");
            Ok(())
        }
    }

    impl LiveDisplay<u8> for StepDisplay {
        fn show(&mut self, _image: &u8) -> Result<KeyAction, TrackError> {
            self.0.0.borrow_mut().push("display");
            Ok(KeyAction::Quit)
        }
    }

    impl Write for StepLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if buf.contains(&b'\n') {
                self.0.0.borrow_mut().push("log");
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_side_effect_order() {
        let calls = Calls::default();
        let mut sink = RenderSink::new(
            StepAnnotator(calls.clone()),
            StepVideo(calls.clone()),
            StepLog(calls.clone()),
            StepDisplay(calls.clone()),
        );

        let mut image = 0u8;
        let action = sink
            .consume(&mut image, &LogEntry::new(noon(), TrackState::Lost))
            .unwrap();

        assert_eq!(action, KeyAction::Quit);
        assert_eq!(
            *calls.0.borrow(),
            vec!["annotate", "log", "write", "display"]
        );
        assert_eq!(sink.frames_written(), 1);
        assert_eq!(sink.log_lines(), 1);
    }
}
