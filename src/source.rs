use std::collections::VecDeque;

use crate::error::TrackError;

/// One decoded frame and its position in the stream.
#[derive(Debug, Clone)]
pub struct Frame<I> {
    /// Zero-based sequence index, strictly increasing.
    pub index: u64,
    pub image: I,
}

/// Frame rate and resolution reported by the input stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoProperties {
    pub fps: f64,
    pub width: i32,
    pub height: i32,
}

impl VideoProperties {
    /// Frame rate used when the container reports none.
    pub const DEFAULT_FPS: f64 = 30.0;

    /// Containers without timing metadata often report an fps of 0, which a
    /// writer cannot encode with; such values fall back to `DEFAULT_FPS`.
    pub fn new(fps: f64, width: i32, height: i32) -> Self {
        let fps = if fps.is_finite() && fps > 0.0 {
            fps
        } else {
            Self::DEFAULT_FPS
        };
        Self { fps, width, height }
    }
}

/// Sequential supplier of frames. No seeking, one reader.
pub trait FrameSource {
    type Image;

    fn properties(&self) -> VideoProperties;

    /// Next frame in stream order, or `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame<Self::Image>>, TrackError>;
}

/// Frame source over images already in memory.
pub struct VecSource<I> {
    frames: VecDeque<I>,
    next_index: u64,
    properties: VideoProperties,
}

impl<I> VecSource<I> {
    pub fn new(images: Vec<I>, properties: VideoProperties) -> Self {
        Self {
            frames: images.into(),
            next_index: 0,
            properties,
        }
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl<I> FrameSource for VecSource<I> {
    type Image = I;

    fn properties(&self) -> VideoProperties {
        self.properties
    }

    fn next_frame(&mut self) -> Result<Option<Frame<I>>, TrackError> {
        let Some(image) = self.frames.pop_front() else {
            return Ok(None);
        };
        let frame = Frame {
            index: self.next_index,
            image,
        };
        self.next_index += 1;
        Ok(Some(frame))
    }
}
