//! Hand landmark data produced by the landmark engine.

use std::ops::Index;

use nalgebra::Point2;

use crate::error::{Error, Result};

/// A landmark position in normalized image coordinates (0.0 to 1.0 on both axes).
pub type LandmarkPoint = Point2<f32>;

/// Number of landmarks estimated per hand.
pub const NUM_LANDMARKS: usize = 21;

/// Number of fingers on a hand (including the thumb).
pub const NUM_FINGERS: usize = 5;

/// Fingertip landmarks, from thumb to pinky.
pub const FINGER_TIPS: [LandmarkIdx; NUM_FINGERS] = {
    use LandmarkIdx::*;
    [ThumbTip, IndexFingerTip, MiddleFingerTip, RingFingerTip, PinkyTip]
};

/// Landmarks that [`FINGER_TIPS`] are compared against to decide whether a finger is raised.
///
/// The thumb has no usable base joint for this, so the wrist is used instead.
pub const FINGER_BASES: [LandmarkIdx; NUM_FINGERS] = {
    use LandmarkIdx::*;
    [Wrist, IndexFingerMcp, MiddleFingerMcp, RingFingerMcp, PinkyMcp]
};

/// How far (in normalized units) a fingertip has to be above its base to count as raised.
pub const FINGER_RAISED_THRESHOLD: f32 = 0.1;

/// Anatomical names of the 21 hand landmarks, in engine output order.
///
/// Every finger is listed from its base joint to its tip. Joint abbreviations:
///
/// - **CMC**: carpometacarpal joint at the root of the thumb, next to the wrist.
/// - **MCP**: metacarpophalangeal joint (the knuckle).
/// - **PIP** / **IP**: the (proximal) interphalangeal joint above the knuckle. The thumb has a
///   single IP joint.
/// - **DIP**: distal interphalangeal joint, the last joint before the tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkIdx {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexFingerMcp,
    IndexFingerPip,
    IndexFingerDip,
    IndexFingerTip,
    MiddleFingerMcp,
    MiddleFingerPip,
    MiddleFingerDip,
    MiddleFingerTip,
    RingFingerMcp,
    RingFingerPip,
    RingFingerDip,
    RingFingerTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

/// The 21 landmarks of one detected hand.
///
/// Always contains exactly [`NUM_LANDMARKS`] points, addressable by `usize` or [`LandmarkIdx`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LandmarkSet {
    points: [LandmarkPoint; NUM_LANDMARKS],
}

impl LandmarkSet {
    pub fn new(points: [LandmarkPoint; NUM_LANDMARKS]) -> Self {
        Self { points }
    }

    /// Creates a [`LandmarkSet`] from a slice that must contain exactly [`NUM_LANDMARKS`] points.
    pub fn from_slice(points: &[LandmarkPoint]) -> Result<Self> {
        let points = points.try_into().map_err(|_| {
            Error::InvalidGeometry(format!(
                "expected {NUM_LANDMARKS} hand landmarks, got {}",
                points.len()
            ))
        })?;
        Ok(Self { points })
    }

    #[inline]
    pub fn len(&self) -> usize {
        NUM_LANDMARKS
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &LandmarkPoint> + '_ {
        self.points.iter()
    }

    #[inline]
    pub fn points(&self) -> &[LandmarkPoint; NUM_LANDMARKS] {
        &self.points
    }
}

impl Index<usize> for LandmarkSet {
    type Output = LandmarkPoint;

    #[inline]
    fn index(&self, index: usize) -> &LandmarkPoint {
        &self.points[index]
    }
}

impl Index<LandmarkIdx> for LandmarkSet {
    type Output = LandmarkPoint;

    #[inline]
    fn index(&self, index: LandmarkIdx) -> &LandmarkPoint {
        &self.points[index as usize]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
}

/// Landmarks and classification data of a single detected hand.
#[derive(Debug, Clone, PartialEq)]
pub struct HandLandmarks {
    landmarks: LandmarkSet,
    handedness: Handedness,
    handedness_score: f32,
}

impl HandLandmarks {
    pub fn new(landmarks: LandmarkSet, handedness: Handedness, handedness_score: f32) -> Self {
        Self {
            landmarks,
            handedness,
            handedness_score,
        }
    }

    #[inline]
    pub fn landmarks(&self) -> &LandmarkSet {
        &self.landmarks
    }

    /// Which hand the engine believes this is.
    ///
    /// This assumes that the image was passed to the engine as-is (not mirrored).
    #[inline]
    pub fn handedness(&self) -> Handedness {
        self.handedness
    }

    /// Confidence of the [`HandLandmarks::handedness`] estimate.
    #[inline]
    pub fn handedness_score(&self) -> f32 {
        self.handedness_score
    }

    /// Returns whether the finger with index `finger` (0 = thumb, 4 = pinky) is raised.
    ///
    /// A finger counts as raised when its tip is more than [`FINGER_RAISED_THRESHOLD`] above its
    /// base, which assumes an upright hand.
    ///
    /// # Panics
    ///
    /// Panics if `finger` is not less than [`NUM_FINGERS`].
    pub fn is_finger_raised(&self, finger: usize) -> bool {
        let tip = self.landmarks[FINGER_TIPS[finger]];
        let base = self.landmarks[FINGER_BASES[finger]];
        // Y points down.
        base.y - tip.y > FINGER_RAISED_THRESHOLD
    }

    /// Counts the raised fingers, see [`HandLandmarks::is_finger_raised`].
    pub fn raised_fingers(&self) -> usize {
        (0..NUM_FINGERS)
            .filter(|&finger| self.is_finger_raised(finger))
            .count()
    }
}

/// Detection result for a single frame.
///
/// An empty hand list means that the engine ran successfully but found no hands.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LandmarkerResult {
    hands: Vec<HandLandmarks>,
    timestamp_ms: u64,
}

impl LandmarkerResult {
    pub fn new(hands: Vec<HandLandmarks>, timestamp_ms: u64) -> Self {
        Self {
            hands,
            timestamp_ms,
        }
    }

    #[inline]
    pub fn hands(&self) -> &[HandLandmarks] {
        &self.hands
    }

    /// Timestamp of the frame this result was computed from, in milliseconds.
    ///
    /// In live-stream mode this is the capture timestamp passed along with the frame; it is on
    /// the same clock as [`crate::timer::uptime_millis`].
    #[inline]
    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }
}
