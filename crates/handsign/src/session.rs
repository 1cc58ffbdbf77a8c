//! Gesture classification of detected hands.

use crate::{
    bundle::ResultBundle,
    error::Result,
    geometry::{convex_hull_area, max_defects_hint, Contour},
    gesture::{classify, Gesture},
    landmark::NUM_FINGERS,
};

/// Keeps the latest gestures and raised-finger count derived from landmarker results.
///
/// Only the most recent observation is kept; there is no smoothing across frames.
#[derive(Debug, Clone, Default)]
pub struct GestureSession {
    gestures: Vec<Gesture>,
    raised_fingers: usize,
    max_defects: Option<usize>,
}

impl GestureSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a fixed `max_defects` for classification instead of deriving it from each contour.
    pub fn with_max_defects(self, max_defects: usize) -> Self {
        Self {
            max_defects: Some(max_defects),
            ..self
        }
    }

    /// Classifies every hand in the latest frame of `bundle`.
    ///
    /// Each hand's landmarks are scaled to the bundle's image size and connected in index order to
    /// form its contour. Bundles without results leave the session unchanged.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidGeometry`][crate::Error::InvalidGeometry] if a hand's landmarks
    /// are degenerate (eg. all on one line). The session is left unchanged in that case.
    pub fn observe(&mut self, bundle: &ResultBundle) -> Result<&[Gesture]> {
        let Some(result) = bundle.results().last() else {
            return Ok(&self.gestures);
        };

        let resolution = bundle.resolution();
        let gestures = result
            .hands()
            .iter()
            .map(|hand| {
                let contour = Contour::from_landmarks(hand.landmarks(), resolution);
                let hull_area = convex_hull_area(contour.points());
                let max_defects = self
                    .max_defects
                    .unwrap_or_else(|| max_defects_hint(&contour));
                classify(&contour, hull_area, max_defects)
            })
            .collect::<Result<Vec<_>>>()?;

        let raised: usize = result.hands().iter().map(|h| h.raised_fingers()).sum();
        self.raised_fingers = raised.min(NUM_FINGERS);
        self.gestures = gestures;
        log::trace!(
            "{} hands at {} ms: {:?}, {} fingers raised",
            self.gestures.len(),
            result.timestamp_ms(),
            self.gestures,
            self.raised_fingers,
        );
        Ok(&self.gestures)
    }

    /// Gestures of the hands in the last observed frame, in detection order.
    pub fn gestures(&self) -> &[Gesture] {
        &self.gestures
    }

    /// Number of raised fingers over all hands of the last observed frame, at most 5.
    pub fn raised_fingers(&self) -> usize {
        self.raised_fingers
    }

    /// Forgets the last observation.
    pub fn reset(&mut self) {
        self.gestures.clear();
        self.raised_fingers = 0;
    }
}
