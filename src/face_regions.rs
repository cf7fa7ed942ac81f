//! Region extraction: normalized face-mesh landmarks to pixel-space polygons.
//!
//! The extractor maps fixed canonical index sets (face oval, lip rings, eye
//! rings) into frame coordinates. The face oval is hull-ordered; lip and eye
//! rings keep their anatomical traversal order so downstream masks follow the
//! actual contours.

use crate::constants::{FACE_OVAL, LEFT_EYE, LIPS_INNER, LIPS_OUTER, MIN_LANDMARKS, RIGHT_EYE};
use crate::utils::safe_cast::f32_to_i32_clamp;
use crate::{Error, Result};
use opencv::core::{Point, Size, Vector};
use opencv::imgproc;

/// Pixel-space face regions for one frame
#[derive(Debug, Clone, Default)]
pub struct FaceRegions {
    /// Hull-ordered face outline
    pub face_oval: Vec<Point>,
    /// Outer lip ring
    pub lips_outer: Vec<Point>,
    /// Inner lip ring
    pub lips_inner: Vec<Point>,
    /// Left eye ring (subject's left)
    pub left_eye: Vec<Point>,
    /// Right eye ring (subject's right)
    pub right_eye: Vec<Point>,
}

impl FaceRegions {
    /// Whether a usable face outline is present
    #[must_use]
    pub fn has_face(&self) -> bool {
        self.face_oval.len() >= 3
    }

    /// Regions excluded from skin processing (lips and eyes), degenerate
    /// rings omitted
    #[must_use]
    pub fn skin_holes(&self) -> Vec<&[Point]> {
        [&self.lips_outer, &self.left_eye, &self.right_eye]
            .into_iter()
            .filter(|r| r.len() >= 3)
            .map(Vec::as_slice)
            .collect()
    }
}

/// Coordinate-convention correction for landmark sources that disagree on
/// axis direction or order
#[derive(Debug, Clone, Copy, Default)]
pub struct LandmarkOrientation {
    /// Mirror horizontally (x -> 1 - x)
    pub flip_x: bool,
    /// Mirror vertically (y -> 1 - y)
    pub flip_y: bool,
    /// Swap the axes before flipping
    pub swap_xy: bool,
}

/// Converts a normalized landmark list into pixel-space face regions
#[derive(Debug, Clone, Copy, Default)]
pub struct RegionExtractor {
    orientation: LandmarkOrientation,
}

impl RegionExtractor {
    /// Create an extractor with the given coordinate correction
    #[must_use]
    pub fn new(orientation: LandmarkOrientation) -> Self {
        Self { orientation }
    }

    /// Project every landmark into pixel space, clamped to frame bounds
    ///
    /// # Errors
    ///
    /// Returns [`Error::RegionExtraction`] when fewer than the minimum
    /// number of landmarks is supplied or the frame is empty
    pub fn project(&self, landmarks: &[(f32, f32)], frame_size: Size) -> Result<Vec<Point>> {
        if landmarks.len() < MIN_LANDMARKS {
            return Err(Error::RegionExtraction(format!(
                "Landmark list too short: {} < {MIN_LANDMARKS}",
                landmarks.len()
            )));
        }
        if frame_size.width <= 0 || frame_size.height <= 0 {
            return Err(Error::RegionExtraction(format!(
                "Empty frame: {}x{}",
                frame_size.width, frame_size.height
            )));
        }

        let o = self.orientation;
        Ok(landmarks
            .iter()
            .map(|&(x, y)| {
                let (mut x, mut y) = if o.swap_xy { (y, x) } else { (x, y) };
                if o.flip_x {
                    x = 1.0 - x;
                }
                if o.flip_y {
                    y = 1.0 - y;
                }
                Point::new(
                    f32_to_i32_clamp(x * frame_size.width as f32, 0, frame_size.width - 1),
                    f32_to_i32_clamp(y * frame_size.height as f32, 0, frame_size.height - 1),
                )
            })
            .collect())
    }

    /// Extract the five face regions for one frame
    ///
    /// # Errors
    ///
    /// Returns [`Error::RegionExtraction`] for an unusable landmark list;
    /// the caller is expected to skip face effects for that frame
    pub fn extract(&self, landmarks: &[(f32, f32)], frame_size: Size) -> Result<FaceRegions> {
        self.extract_with_pixels(landmarks, frame_size).map(|(regions, _)| regions)
    }

    /// Extract the face regions together with the full projected landmark
    /// list (consumed by the expression and wrinkle stages)
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::extract`]
    pub fn extract_with_pixels(
        &self,
        landmarks: &[(f32, f32)],
        frame_size: Size,
    ) -> Result<(FaceRegions, Vec<Point>)> {
        let pixels = self.project(landmarks, frame_size)?;

        let oval_ring = gather(&pixels, &FACE_OVAL);
        let regions = FaceRegions {
            face_oval: hull(&oval_ring)?,
            lips_outer: gather(&pixels, &LIPS_OUTER),
            lips_inner: gather(&pixels, &LIPS_INNER),
            left_eye: gather(&pixels, &LEFT_EYE),
            right_eye: gather(&pixels, &RIGHT_EYE),
        };
        Ok((regions, pixels))
    }
}

/// Collect the pixels at a canonical index set, skipping indices beyond the
/// supplied list (sparse landmark sources)
fn gather(pixels: &[Point], indices: &[usize]) -> Vec<Point> {
    indices.iter().filter_map(|&i| pixels.get(i).copied()).collect()
}

/// Convex hull of the face outline; rings with fewer than 3 points pass
/// through unchanged
fn hull(ring: &[Point]) -> Result<Vec<Point>> {
    if ring.len() < 3 {
        return Ok(ring.to_vec());
    }
    let points = Vector::<Point>::from_slice(ring);
    let mut hull = Vector::<Point>::new();
    imgproc::convex_hull(&points, &mut hull, false, true)?;
    Ok(hull.to_vec())
}
