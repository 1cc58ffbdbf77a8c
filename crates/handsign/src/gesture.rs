//! Geometric gesture classification.
//!
//! [`classify`] works on any closed polygon: it only looks at the contour's area, the area of its
//! convex hull, and the number of convexity defects. It never refers to individual landmarks.

use std::fmt;
use std::ops::RangeInclusive;

use crate::error::{Error, Result};
use crate::geometry::Contour;

/// Contours enclosing less than this many square units are treated as "no hand".
pub const MIN_HAND_AREA: f64 = 2000.0;

/// Range of `100 * area / hull_area` that is classified as a closed fist.
pub const FIST_AREA_RATIO: RangeInclusive<f64> = 17.5..=100.0;

/// A classified hand gesture.
///
/// [`fmt::Display`] yields the human-readable label (eg. `"Gesture 3"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gesture {
    /// The contour is too small to be a hand.
    Zero,
    /// A closed fist.
    One,
    Two,
    Three,
    Four,
    Five,
    /// More defects than expected; the hand should be repositioned.
    Reposition,
    Unknown,
}

impl Gesture {
    /// Maps a convexity defect count to a gesture.
    ///
    /// Counts 2 to 5 map to [`Gesture::Two`] to [`Gesture::Five`]. Any other count above
    /// `max_defects` yields [`Gesture::Reposition`], and everything else is [`Gesture::Unknown`].
    pub fn from_defect_count(count: usize, max_defects: usize) -> Self {
        match count {
            2 => Gesture::Two,
            3 => Gesture::Three,
            4 => Gesture::Four,
            5 => Gesture::Five,
            n if n > max_defects => Gesture::Reposition,
            _ => Gesture::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Gesture::Zero => "Gesture 0",
            Gesture::One => "Gesture 1 (Fixed)",
            Gesture::Two => "Gesture 2",
            Gesture::Three => "Gesture 3",
            Gesture::Four => "Gesture 4",
            Gesture::Five => "Gesture 5",
            Gesture::Reposition => "Reposition",
            Gesture::Unknown => "Unknown Gesture",
        }
    }
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classifies a closed hand contour.
///
/// # Parameters
///
/// - `contour`: the hand outline, at least 3 points, in the same units as [`MIN_HAND_AREA`]
///   (pixels for contours derived with [`Contour::from_landmarks`]).
/// - `hull_area`: area of the contour's convex hull. This function never computes a hull itself,
///   so the [`Gesture::One`] decision is only as good as the caller's hull area.
///   [`crate::geometry::convex_hull_area`] can be used to compute it.
/// - `max_defects`: defect counts above this (other than 2 to 5) are reported as
///   [`Gesture::Reposition`].
///
/// # Errors
///
/// Returns [`Error::InvalidGeometry`] if the contour has fewer than 3 points or non-finite
/// coordinates, or if `hull_area` is not a positive finite number.
pub fn classify(contour: &Contour, hull_area: f64, max_defects: usize) -> Result<Gesture> {
    if contour.len() < 3 {
        return Err(Error::InvalidGeometry(format!(
            "contour needs at least 3 points, got {}",
            contour.len()
        )));
    }
    if contour
        .points()
        .iter()
        .any(|p| !p.x.is_finite() || !p.y.is_finite())
    {
        return Err(Error::InvalidGeometry(
            "contour contains non-finite coordinates".into(),
        ));
    }
    if !(hull_area.is_finite() && hull_area > 0.0) {
        return Err(Error::InvalidGeometry(format!(
            "hull area must be positive, got {hull_area}"
        )));
    }

    let hand_area = contour.area();
    if hand_area < MIN_HAND_AREA {
        return Ok(Gesture::Zero);
    }

    let area_ratio = (hand_area / hull_area) * 100.0;
    if FIST_AREA_RATIO.contains(&area_ratio) {
        return Ok(Gesture::One);
    }

    let defects = contour.defects();
    log::trace!(
        "hand area {hand_area:.1}, area ratio {area_ratio:.1}%, {} defects (max {max_defects})",
        defects.len()
    );
    Ok(Gesture::from_defect_count(defects.len(), max_defects))
}
