//! Expression-driven wrinkle boosting.
//!
//! Smile and squint intensity are inferred from landmark distance ratios and
//! injected as localized boost discs at the nasolabial and crow's-feet
//! regions, so attenuation strengthens exactly where expression lines form.
//! An optional forehead term biases toward horizontal lines above the brow.

use crate::config::WrinkleParams;
use crate::constants::{
    APERTURE_HIGH, APERTURE_LOW, BOOST_DISC_RADIUS_FRAC, CHIN, EYE_OUTER_LEFT, EYE_OUTER_RIGHT,
    LEFT_BROW_TOP, LEFT_EYE_BOTTOM, LEFT_EYE_INNER, LEFT_EYE_TOP, MOUTH_CORNER_LEFT,
    MOUTH_CORNER_RIGHT, RIGHT_BROW_TOP, RIGHT_EYE_BOTTOM, RIGHT_EYE_INNER, RIGHT_EYE_TOP,
    SMILE_RATIO_HIGH, SMILE_RATIO_LOW,
};
use crate::face_regions::FaceRegions;
use crate::skin_weight::face_skin_mask;
use crate::utils::mat_ops::{clamp_unit, gaussian_blur};
use crate::utils::safe_cast::round_to_i32;
use crate::Result;
use opencv::core::{self, Mat, Point, Scalar, Size, CV_32F};
use opencv::imgproc;
use opencv::prelude::*;

// Chin participates indirectly: a degenerate chin/brow geometry disables the
// forehead term rather than producing a stray band.
const REQUIRED: [usize; 4] = [MOUTH_CORNER_RIGHT, MOUTH_CORNER_LEFT, EYE_OUTER_RIGHT, EYE_OUTER_LEFT];

/// Smile and squint factors inferred from one frame's landmarks
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpressionFactors {
    /// Smile intensity in [0, 1]
    pub smile: f32,
    /// Squint intensity in [0, 1]
    pub squint: f32,
    /// Outer-eye-corner span in pixels, scale reference for the boost discs
    pub eye_span: f32,
}

/// Map a value through a linear band onto [0, 1]
fn band(value: f32, low: f32, high: f32) -> f32 {
    ((value - low) / (high - low)).clamp(0.0, 1.0)
}

fn distance(a: Point, b: Point) -> f32 {
    let dx = (a.x - b.x) as f32;
    let dy = (a.y - b.y) as f32;
    dx.hypot(dy)
}

/// Infer expression factors from pixel-space landmarks. Returns `None` when
/// the named landmarks are missing or the geometry is degenerate.
#[must_use]
pub fn infer_factors(pixels: &[Point]) -> Option<ExpressionFactors> {
    for idx in REQUIRED {
        pixels.get(idx)?;
    }

    let eye_span = distance(pixels[EYE_OUTER_RIGHT], pixels[EYE_OUTER_LEFT]);
    if eye_span < 1.0 {
        return None;
    }

    let mouth_width = distance(pixels[MOUTH_CORNER_RIGHT], pixels[MOUTH_CORNER_LEFT]);
    let smile = band(mouth_width / eye_span, SMILE_RATIO_LOW, SMILE_RATIO_HIGH);

    let squint = match (
        eye_aperture(pixels, RIGHT_EYE_TOP, RIGHT_EYE_BOTTOM, EYE_OUTER_RIGHT, RIGHT_EYE_INNER),
        eye_aperture(pixels, LEFT_EYE_TOP, LEFT_EYE_BOTTOM, EYE_OUTER_LEFT, LEFT_EYE_INNER),
    ) {
        (Some(r), Some(l)) => 1.0 - band((r + l) / 2.0, APERTURE_LOW, APERTURE_HIGH),
        _ => 0.0,
    };

    Some(ExpressionFactors { smile, squint, eye_span })
}

fn eye_aperture(pixels: &[Point], top: usize, bottom: usize, outer: usize, inner: usize) -> Option<f32> {
    let width = distance(*pixels.get(outer)?, *pixels.get(inner)?);
    if width < 1.0 {
        return None;
    }
    Some(distance(*pixels.get(top)?, *pixels.get(bottom)?) / width)
}

/// Build the additive boost map for one frame.
///
/// `luminance` is the Lab L channel (8-bit); it is only consulted for the
/// forehead term and may be omitted.
///
/// # Errors
///
/// Returns an error if an underlying image operation fails
pub fn build_boost_map(
    pixels: &[Point],
    regions: &FaceRegions,
    frame_size: Size,
    params: &WrinkleParams,
    luminance: Option<&Mat>,
) -> Result<Mat> {
    let mut boost = Mat::zeros(frame_size.height, frame_size.width, CV_32F)?.to_mat()?;

    let Some(factors) = infer_factors(pixels) else {
        return Ok(boost);
    };

    let radius = round_to_i32(BOOST_DISC_RADIUS_FRAC * factors.eye_span).max(2);

    let smile_value = factors.smile * params.smile_boost;
    if smile_value > 0.0 {
        for idx in [MOUTH_CORNER_RIGHT, MOUTH_CORNER_LEFT] {
            paint_disc(&mut boost, pixels[idx], radius, smile_value)?;
        }
    }

    // Crow's feet tighten on a squint but also on a broad smile
    let squint_value = factors.squint.max(0.5 * factors.smile) * params.squint_boost;
    if squint_value > 0.0 {
        for idx in [EYE_OUTER_RIGHT, EYE_OUTER_LEFT] {
            paint_disc(&mut boost, pixels[idx], radius, squint_value)?;
        }
    }

    // Feather the discs into smooth bumps
    let mut boost = gaussian_blur(&boost, 2 * radius + 1, f64::from(radius) * 0.5)?;

    if params.forehead_boost > 0.0 {
        if let Some(luminance) = luminance {
            add_forehead_boost(&mut boost, pixels, regions, params.forehead_boost, luminance)?;
        }
    }

    clamp_unit(&mut boost)?;
    Ok(boost)
}

fn paint_disc(map: &mut Mat, center: Point, radius: i32, value: f32) -> Result<()> {
    imgproc::circle(
        map,
        center,
        radius,
        Scalar::all(f64::from(value)),
        imgproc::FILLED,
        imgproc::LINE_8,
        0,
    )?;
    Ok(())
}

/// Horizontal-line bias above the eyebrow line: vertical gradient magnitude
/// combined with local negative-detail darkness, inside the face polygon.
fn add_forehead_boost(
    boost: &mut Mat,
    pixels: &[Point],
    regions: &FaceRegions,
    gain: f32,
    luminance: &Mat,
) -> Result<()> {
    let (Some(right_brow), Some(left_brow), Some(chin)) = (
        pixels.get(RIGHT_BROW_TOP),
        pixels.get(LEFT_BROW_TOP),
        pixels.get(CHIN),
    ) else {
        return Ok(());
    };
    let brow_line = right_brow.y.min(left_brow.y);
    if brow_line <= 0 || brow_line >= chin.y {
        return Ok(());
    }

    let mask = face_skin_mask(regions, boost.size()?)?;

    let mut gy = Mat::default();
    imgproc::sobel(luminance, &mut gy, CV_32F, 0, 1, 3, 1.0, 0.0, core::BORDER_DEFAULT)?;

    let base = gaussian_blur(luminance, 9, 0.0)?;

    for row in 0..brow_line.min(boost.rows()) {
        let inside = mask.at_row::<u8>(row)?;
        let grad = gy.at_row::<f32>(row)?;
        let lum = luminance.at_row::<u8>(row)?;
        let smooth = base.at_row::<u8>(row)?;
        let out = boost.at_row_mut::<f32>(row)?;
        for col in 0..out.len() {
            if inside[col] == 0 {
                continue;
            }
            let gradient = (grad[col].abs() / 60.0).min(1.0);
            let darkness = ((f32::from(smooth[col]) - f32::from(lum[col])) / 12.0).clamp(0.0, 1.0);
            out[col] += gain * gradient * darkness;
        }
    }
    Ok(())
}
