//! Frame sources and conversion to the engine's input format.

use std::io::Read;

use image::{
    codecs::gif::GifDecoder, imageops, AnimationDecoder, DynamicImage, RgbaImage,
};

use crate::error::{Error, Result};
use crate::resolution::Resolution;

/// An image in the pixel format expected by the landmark engine (8-bit RGBA).
#[derive(Debug, Clone, PartialEq)]
pub struct InputImage {
    buf: RgbaImage,
}

impl InputImage {
    /// Wraps an RGBA image without copying.
    pub fn new(buf: RgbaImage) -> Self {
        Self { buf }
    }

    /// Converts any decoded image to the engine's pixel format.
    ///
    /// Images that are already RGBA8 are moved, not copied.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self {
            buf: image.into_rgba8(),
        }
    }

    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::of(&self.buf)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.buf.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.buf.height()
    }

    #[inline]
    pub fn as_rgba(&self) -> &RgbaImage {
        &self.buf
    }

    pub fn into_rgba(self) -> RgbaImage {
        self.buf
    }
}

/// Clockwise rotation that has to be applied to a camera frame to make it upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    /// Converts a rotation in degrees to a [`Rotation`].
    ///
    /// Only multiples of 90° are supported; the value is normalized to `0..360` first.
    pub fn from_degrees(degrees: i32) -> Result<Self> {
        match degrees.rem_euclid(360) {
            0 => Ok(Rotation::None),
            90 => Ok(Rotation::Cw90),
            180 => Ok(Rotation::Cw180),
            270 => Ok(Rotation::Cw270),
            _ => Err(Error::FrameUnavailable(format!(
                "unsupported frame rotation of {degrees} degrees"
            ))),
        }
    }

    pub fn degrees(&self) -> u32 {
        match self {
            Rotation::None => 0,
            Rotation::Cw90 => 90,
            Rotation::Cw180 => 180,
            Rotation::Cw270 => 270,
        }
    }
}

/// A raw frame delivered by a camera.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    image: RgbaImage,
    rotation: Rotation,
}

impl CameraFrame {
    pub fn new(image: RgbaImage, rotation: Rotation) -> Self {
        Self { image, rotation }
    }

    /// Creates a frame from a tightly packed RGBA pixel buffer.
    pub fn from_raw(width: u32, height: u32, rgba: Vec<u8>, rotation: Rotation) -> Result<Self> {
        let len = rgba.len();
        let image = RgbaImage::from_raw(width, height, rgba).ok_or_else(|| {
            Error::FrameUnavailable(format!(
                "pixel buffer of {len} bytes does not match a {width}x{height} RGBA frame"
            ))
        })?;
        Ok(Self { image, rotation })
    }

    /// Resolution of the frame as captured (before rotation).
    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::of(&self.image)
    }

    #[inline]
    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// Rotates the frame upright and, if `mirrored` is set, flips it horizontally afterwards (for
    /// front-facing cameras).
    pub fn into_input(self, mirrored: bool) -> InputImage {
        let rotated = match self.rotation {
            Rotation::None => self.image,
            Rotation::Cw90 => imageops::rotate90(&self.image),
            Rotation::Cw180 => imageops::rotate180(&self.image),
            Rotation::Cw270 => imageops::rotate270(&self.image),
        };
        let buf = if mirrored {
            imageops::flip_horizontal(&rotated)
        } else {
            rotated
        };
        InputImage::new(buf)
    }
}

/// A stored video that can be sampled at arbitrary timestamps.
pub trait VideoSource {
    /// Total duration of the video in milliseconds, or [`None`] if it cannot be determined.
    fn duration_ms(&mut self) -> Option<u64>;

    /// Decodes the frame closest to `timestamp_ms`, or returns [`None`] if no frame can be read.
    fn frame_at(&mut self, timestamp_ms: u64) -> Option<DynamicImage>;
}

/// An in-memory sequence of timed frames, eg. a decoded animated GIF.
#[derive(Debug, Clone, Default)]
pub struct FrameSequence {
    /// Frames with their start timestamp, in ascending order.
    frames: Vec<(u64, RgbaImage)>,
    duration_ms: u64,
}

impl FrameSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a frame that is shown for `duration_ms` milliseconds.
    pub fn push(&mut self, image: RgbaImage, duration_ms: u64) {
        self.frames.push((self.duration_ms, image));
        self.duration_ms += duration_ms;
    }

    /// Decodes all frames of an animated GIF.
    pub fn from_gif<R: Read>(reader: R) -> Result<Self> {
        let decode_err = |e: image::ImageError| Error::FrameUnavailable(e.to_string());
        let decoder = GifDecoder::new(reader).map_err(decode_err)?;
        let frames = decoder.into_frames().collect_frames().map_err(decode_err)?;

        let mut seq = Self::new();
        for frame in frames {
            let (numer, denom) = frame.delay().numer_denom_ms();
            let delay = if denom == 0 { 0 } else { u64::from(numer / denom) };
            seq.push(frame.into_buffer(), delay);
        }
        log::debug!(
            "decoded GIF with {} frames, {} ms",
            seq.frames.len(),
            seq.duration_ms
        );
        Ok(seq)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl VideoSource for FrameSequence {
    fn duration_ms(&mut self) -> Option<u64> {
        if self.frames.is_empty() {
            None
        } else {
            Some(self.duration_ms)
        }
    }

    fn frame_at(&mut self, timestamp_ms: u64) -> Option<DynamicImage> {
        if timestamp_ms > self.duration_ms {
            return None;
        }
        // The last frame whose start is not after the timestamp.
        let index = self
            .frames
            .partition_point(|(start, _)| *start <= timestamp_ms)
            .checked_sub(1)?;
        Some(DynamicImage::ImageRgba8(self.frames[index].1.clone()))
    }
}
