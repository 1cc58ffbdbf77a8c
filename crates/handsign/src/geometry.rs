//! Planar geometry on closed hand contours.

use std::cmp::Ordering;

use itertools::Itertools;
use nalgebra::{Point2, Vector2};

use crate::landmark::LandmarkSet;
use crate::resolution::Resolution;

/// A 2D point on a contour.
pub type Point = Point2<f64>;

/// A closed polygon approximating the outline of a hand.
///
/// The last point is implicitly connected to the first one. A contour needs at least 3 points to
/// enclose an area; this is checked by the consumers (like [`crate::gesture::classify`]), not on
/// construction.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Contour {
    points: Vec<Point>,
}

impl Contour {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Derives a contour from the landmarks of a single hand.
    ///
    /// Landmarks are visited in index order (wrist, then each finger from base to tip) and scaled
    /// from normalized coordinates to the pixel grid of `resolution`.
    pub fn from_landmarks(landmarks: &LandmarkSet, resolution: Resolution) -> Self {
        let (w, h) = (
            f64::from(resolution.width()),
            f64::from(resolution.height()),
        );
        Self {
            points: landmarks
                .iter()
                .map(|p| Point::new(f64::from(p.x) * w, f64::from(p.y) * h))
                .collect(),
        }
    }

    #[inline]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Returns an iterator over the `(start, end)` pairs of all edges, including the closing edge
    /// from the last point back to the first.
    pub fn edges(&self) -> impl Iterator<Item = (&Point, &Point)> + '_ {
        self.points.iter().circular_tuple_windows()
    }

    /// Computes the enclosed area using the shoelace formula.
    ///
    /// The result is independent of the winding direction.
    pub fn area(&self) -> f64 {
        shoelace_area(&self.points)
    }

    /// Computes one [`ConvexityDefect`] per edge, see [`convexity_defects`].
    pub fn defects(&self) -> Vec<ConvexityDefect> {
        convexity_defects(&self.points)
    }
}

impl From<Vec<Point>> for Contour {
    fn from(points: Vec<Point>) -> Self {
        Self::new(points)
    }
}

impl FromIterator<Point> for Contour {
    fn from_iter<T: IntoIterator<Item = Point>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Absolute area of the closed polygon through `points`.
///
/// Returns 0.0 for fewer than 3 points.
pub fn shoelace_area(points: &[Point]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice_signed: f64 = points
        .iter()
        .circular_tuple_windows::<(_, _)>()
        .map(|(a, b)| a.x * b.y - b.x * a.y)
        .sum();
    0.5 * twice_signed.abs()
}

/// Perpendicular distance of `point` from the infinite line through `start` and `end`.
///
/// If `start` and `end` coincide, the line is undefined and the euclidean distance to `start` is
/// returned instead.
pub fn point_line_distance(start: &Point, end: &Point, point: &Point) -> f64 {
    let d: Vector2<f64> = end - start;
    let denominator = d.norm();
    if denominator == 0.0 {
        return nalgebra::distance(start, point);
    }
    let numerator = (d.y * point.x - d.x * point.y + end.x * start.y - end.y * start.x).abs();
    numerator / denominator
}

/// The contour point farthest from an edge's chord.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvexityDefect {
    /// Index of the farthest point in the contour.
    pub index: usize,
    pub point: Point,
    /// Perpendicular distance of `point` from the edge's chord. Never negative.
    pub distance: f64,
}

/// For every edge of the closed polygon through `points`, finds the point (other than the edge's
/// two endpoints) with the largest perpendicular distance from the edge's line.
///
/// Exactly one defect is recorded per edge, even when its distance is 0.0: no depth threshold is
/// applied. When several points are equally far away, the one with the lowest index wins.
///
/// Returns an empty list for fewer than 3 points.
pub fn convexity_defects(points: &[Point]) -> Vec<ConvexityDefect> {
    let n = points.len();
    if n < 3 {
        return Vec::new();
    }

    (0..n)
        .filter_map(|i| {
            let j = (i + 1) % n;
            let (start, end) = (&points[i], &points[j]);
            points
                .iter()
                .enumerate()
                .filter(|&(k, _)| k != i && k != j)
                .map(|(index, point)| ConvexityDefect {
                    index,
                    point: *point,
                    distance: point_line_distance(start, end, point),
                })
                .reduce(|best, cand| {
                    if cand.distance > best.distance {
                        cand
                    } else {
                        best
                    }
                })
        })
        .collect()
}

/// Computes the convex hull of `points` using Andrew's monotone chain algorithm.
///
/// The hull is returned in counter-clockwise order (in a Y-up coordinate system), without
/// collinear points and without repeating the first point. Non-finite points are ignored.
pub fn convex_hull(points: &[Point]) -> Vec<Point> {
    let mut sorted = points
        .iter()
        .filter(|p| p.x.is_finite() && p.y.is_finite())
        .copied()
        .collect::<Vec<_>>();
    sorted.sort_by(|a, b| {
        a.x.partial_cmp(&b.x)
            .unwrap_or(Ordering::Equal)
            .then(a.y.partial_cmp(&b.y).unwrap_or(Ordering::Equal))
    });
    sorted.dedup();
    if sorted.len() < 3 {
        return sorted;
    }

    fn half_hull<'a>(points: impl Iterator<Item = &'a Point>) -> Vec<Point> {
        let mut chain: Vec<Point> = Vec::new();
        for p in points {
            while let [.., o, a] = chain[..] {
                if (a - o).perp(&(*p - o)) > 0.0 {
                    break;
                }
                chain.pop();
            }
            chain.push(*p);
        }
        // The last point of each chain is the first point of the other one.
        chain.pop();
        chain
    }

    let mut hull = half_hull(sorted.iter());
    hull.extend(half_hull(sorted.iter().rev()));
    hull
}

/// Area of the convex hull of `points`.
pub fn convex_hull_area(points: &[Point]) -> f64 {
    shoelace_area(&convex_hull(points))
}

/// Rough upper bound on the number of convexity defects a contour of this size should have.
///
/// Scales with the number of contour points, but is always at least 1.
pub fn max_defects_hint(contour: &Contour) -> usize {
    (contour.len() / 10).max(1)
}
