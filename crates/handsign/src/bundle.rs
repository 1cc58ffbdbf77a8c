//! Packaged detection results.

use crate::{
    error::{Error, Result},
    landmark::LandmarkerResult,
    resolution::Resolution,
};

/// Detection results along with the time inference took and the size of the analyzed image.
///
/// Holds a single result for images and live-stream frames, and one result per sampled frame for
/// videos. Bundles are immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultBundle {
    results: Vec<LandmarkerResult>,
    inference_time_ms: u64,
    input_image_height: u32,
    input_image_width: u32,
}

impl ResultBundle {
    /// Creates a bundle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FrameUnavailable`] if `input` has a zero dimension.
    pub fn new(
        results: Vec<LandmarkerResult>,
        inference_time_ms: u64,
        input: Resolution,
    ) -> Result<Self> {
        if input.is_empty() {
            return Err(Error::FrameUnavailable(format!(
                "input image has an invalid size of {input}"
            )));
        }
        Ok(Self {
            results,
            inference_time_ms,
            input_image_height: input.height(),
            input_image_width: input.width(),
        })
    }

    /// Results in frame order.
    pub fn results(&self) -> &[LandmarkerResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<LandmarkerResult> {
        self.results
    }

    /// Inference latency in milliseconds.
    ///
    /// For videos, this is the average per sampled frame. For live-stream frames, it is measured
    /// from the moment the frame was submitted until its result arrived.
    pub fn inference_time_ms(&self) -> u64 {
        self.inference_time_ms
    }

    pub fn input_image_height(&self) -> u32 {
        self.input_image_height
    }

    pub fn input_image_width(&self) -> u32 {
        self.input_image_width
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.input_image_width, self.input_image_height)
    }
}
