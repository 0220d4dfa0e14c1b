//! In-memory codec backend that records every call the trimmer makes.

#![allow(dead_code)]

use std::{cell::RefCell, path::Path, path::PathBuf, rc::Rc};
use video_trim::{Error, FrameSink, FrameSize, FrameSource, MediaBackend, Result, SinkConfig, VideoFrame};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Failure {
    Open,
    Seek,
    /// Fail the pull after this many frames were returned
    Decode(usize),
    CreateSink,
    /// Fail the encode after this many frames were accepted
    Encode(usize),
    Finish,
    Close,
}

#[derive(Debug, Default)]
pub struct CallLog {
    pub opens: usize,
    pub seeks: Vec<f64>,
    pub pulls: usize,
    pub closes: usize,
    pub sink_configs: Vec<(PathBuf, SinkConfig)>,
    pub encoded: Vec<MockFrame>,
    pub finishes: usize,
    pub sink_drops: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MockFrame {
    pub index: usize,
    pub timestamp: f64,
    pub size: FrameSize,
}

impl VideoFrame for MockFrame {
    fn size(&self) -> FrameSize {
        self.size
    }

    fn timestamp(&self) -> f64 {
        self.timestamp
    }
}

/// A constant-rate source of `duration` seconds at `fps`.
#[derive(Clone)]
pub struct MockBackend {
    pub duration: f64,
    pub fps: f64,
    pub native_rate: Option<f64>,
    pub size: FrameSize,
    pub failures: Vec<Failure>,
    pub log: Rc<RefCell<CallLog>>,
}

impl MockBackend {
    pub fn new(duration: f64, fps: f64) -> Self {
        Self {
            duration,
            fps,
            native_rate: Some(fps),
            size: FrameSize::new(640, 360),
            failures: vec![],
            log: Rc::new(RefCell::new(CallLog::default())),
        }
    }

    /// Inject `failure`; may be called more than once.
    pub fn failing(mut self, failure: Failure) -> Self {
        self.failures.push(failure);
        self
    }

    fn fails(&self, failure: Failure) -> bool {
        self.failures.contains(&failure)
    }

    pub fn without_native_rate(mut self) -> Self {
        self.native_rate = None;
        self
    }

    pub fn log(&self) -> std::cell::Ref<'_, CallLog> {
        self.log.borrow()
    }

    fn total_frames(&self) -> usize {
        (self.duration * self.fps + 1e-9).floor() as usize
    }
}

fn injected(what: &str) -> Error {
    Error::FFmpeg(format!("injected {what} failure"))
}

pub struct MockSource {
    backend: MockBackend,
    position: usize,
    returned: usize,
}

impl FrameSource for MockSource {
    type Frame = MockFrame;

    fn seek_precise(&mut self, seconds: f64) -> Result<()> {
        self.backend.log.borrow_mut().seeks.push(seconds);
        if self.backend.fails(Failure::Seek) {
            return Err(injected("seek"));
        }

        self.position = (seconds * self.backend.fps - 0.5).ceil().max(0.0) as usize;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<MockFrame>> {
        self.backend.log.borrow_mut().pulls += 1;
        if self.backend.fails(Failure::Decode(self.returned)) {
            return Err(injected("decode"));
        }

        if self.position >= self.backend.total_frames() {
            return Ok(None);
        }

        let frame = MockFrame {
            index: self.position,
            timestamp: self.position as f64 / self.backend.fps,
            size: self.backend.size,
        };
        self.position += 1;
        self.returned += 1;
        Ok(Some(frame))
    }

    fn frame_rate(&self) -> Option<f64> {
        self.backend.native_rate
    }

    fn close(&mut self) -> Result<()> {
        self.backend.log.borrow_mut().closes += 1;
        if self.backend.fails(Failure::Close) {
            return Err(injected("close"));
        }
        Ok(())
    }
}

pub struct MockSink {
    backend: MockBackend,
    accepted: usize,
}

impl FrameSink<MockFrame> for MockSink {
    fn encode_frame(&mut self, frame: MockFrame) -> Result<()> {
        if self.backend.fails(Failure::Encode(self.accepted)) {
            return Err(injected("encode"));
        }

        self.backend.log.borrow_mut().encoded.push(frame);
        self.accepted += 1;
        Ok(())
    }

    fn finish(self) -> Result<()> {
        self.backend.log.borrow_mut().finishes += 1;
        if self.backend.fails(Failure::Finish) {
            return Err(injected("finish"));
        }
        Ok(())
    }
}

impl Drop for MockSink {
    fn drop(&mut self) {
        self.backend.log.borrow_mut().sink_drops += 1;
    }
}

impl MediaBackend for MockBackend {
    type Frame = MockFrame;
    type Source = MockSource;
    type Sink = MockSink;

    fn open_source(&self, _path: &Path) -> Result<MockSource> {
        self.log.borrow_mut().opens += 1;
        if self.fails(Failure::Open) {
            return Err(Error::IO(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "injected open failure",
            )));
        }

        Ok(MockSource {
            backend: self.clone(),
            position: 0,
            returned: 0,
        })
    }

    fn create_sink(&self, path: &Path, config: &SinkConfig) -> Result<MockSink> {
        if self.fails(Failure::CreateSink) {
            return Err(Error::IO(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "injected create failure",
            )));
        }

        self.log
            .borrow_mut()
            .sink_configs
            .push((path.to_path_buf(), config.clone()));

        Ok(MockSink {
            backend: self.clone(),
            accepted: 0,
        })
    }
}
