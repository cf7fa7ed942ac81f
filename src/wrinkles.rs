//! Wrinkle line detection: multi-scale black-hat morphology gated by
//! structure-tensor coherence, skin-color classification, and anatomical
//! exclusion zones, thresholded to the top fraction of response mass.

use crate::config::WrinkleParams;
use crate::constants::{
    CHIN, MOUTH_CORNER_LEFT, MOUTH_CORNER_RIGHT, SKIN_CB_MAX, SKIN_CB_MIN, SKIN_CR_MAX, SKIN_CR_MIN,
};
use crate::face_regions::FaceRegions;
use crate::skin_weight::face_skin_mask;
use crate::utils::mat_ops::{clamp_unit, gaussian_blur, min_max, odd_kernel, to_f32};
use crate::utils::padded_rect;
use crate::Result;
use opencv::core::{self, Mat, Point, Scalar, Size, CV_32F, CV_8U};
use opencv::imgproc;
use opencv::prelude::*;

/// Per-pixel weighting toward the narrower black-hat scales
const SCALE_WEIGHTS: [f32; 3] = [1.0, 0.92, 0.85];

/// Detect wrinkle lines in `frame`, scoped to face skin.
///
/// `pixels` are the projected pixel-space landmarks (used for the anatomical
/// gates). The returned map is frame-sized CV_32F in [0, 1].
///
/// # Errors
///
/// Returns an error if an underlying image operation fails
pub fn detect(
    frame: &Mat,
    regions: &FaceRegions,
    pixels: &[Point],
    params: &WrinkleParams,
) -> Result<Mat> {
    let size = frame.size()?;
    if !regions.has_face() || size.width <= 0 || size.height <= 0 {
        return Ok(Mat::zeros(size.height.max(1), size.width.max(1), CV_32F)?.to_mat()?);
    }

    let mask = face_skin_mask(regions, size)?;

    let mut lab = Mat::default();
    imgproc::cvt_color(frame, &mut lab, imgproc::COLOR_BGR2Lab, 0)?;
    let mut planes = core::Vector::<Mat>::new();
    core::split(&lab, &mut planes)?;
    let luminance = planes.get(0)?;

    let blackhat = blackhat_response(&luminance, params.min_width_px, params.max_width_px)?;
    let coherence = coherence_map(&luminance)?;

    let mut response = Mat::default();
    core::multiply(&blackhat, &coherence, &mut response, 1.0, -1)?;

    let mask_f = to_f32(&mask, 1.0 / 255.0)?;
    let combined = response.clone();
    core::multiply(&combined, &mask_f, &mut response, 1.0, -1)?;

    if params.skin_gate {
        let gate = skin_color_gate(frame)?;
        let combined = response.clone();
        core::multiply(&combined, &gate, &mut response, 1.0, -1)?;
    }

    if params.suppress_lower_face {
        suppress_below_mouth(&mut response, pixels, params.lower_face_ratio)?;
    }

    if params.ignore_glasses {
        if let Some(gate) = glasses_gate(regions, params.glasses_margin_px, size)? {
            let combined = response.clone();
            core::multiply(&combined, &gate, &mut response, 1.0, -1)?;
        }
    }

    let mut response = gaussian_blur(&response, 5, 0.0)?;

    keep_top_mass(&mut response, &mask, params.keep_ratio)?;

    if (params.mask_gain - 1.0).abs() > f32::EPSILON {
        let scaled = response.clone();
        scaled.convert_to(&mut response, CV_32F, f64::from(params.mask_gain), 0.0)?;
    }
    clamp_unit(&mut response)?;
    Ok(response)
}

/// Black-hat morphology at 3 linearly spaced elliptical scales, per-pixel max
/// with a slight preference for the narrowest scale
fn blackhat_response(luminance: &Mat, min_width_px: i32, max_width_px: i32) -> Result<Mat> {
    let min_w = min_width_px.max(1);
    let max_w = max_width_px.max(min_w);

    let mut best: Option<Mat> = None;
    for (i, &weight) in SCALE_WEIGHTS.iter().enumerate() {
        let width = min_w + (max_w - min_w) * i as i32 / 2;
        let k = odd_kernel(2 * width + 1);
        let kernel = imgproc::get_structuring_element(
            imgproc::MORPH_ELLIPSE,
            Size::new(k, k),
            Point::new(-1, -1),
        )?;

        let mut hat = Mat::default();
        imgproc::morphology_ex(
            luminance,
            &mut hat,
            imgproc::MORPH_BLACKHAT,
            &kernel,
            Point::new(-1, -1),
            1,
            core::BORDER_CONSTANT,
            imgproc::morphology_default_border_value()?,
        )?;

        let hat = to_f32(&hat, f64::from(weight) / 255.0)?;
        best = Some(match best {
            None => hat,
            Some(prev) => {
                let mut out = Mat::default();
                core::max(&prev, &hat, &mut out)?;
                out
            }
        });
    }
    // SCALE_WEIGHTS is non-empty, so a response always exists
    Ok(best.unwrap_or_default())
}

/// Structure-tensor coherence `(l1 - l2) / (l1 + l2)`: high for elongated
/// structures, low for blobs
fn coherence_map(luminance: &Mat) -> Result<Mat> {
    let mut gx = Mat::default();
    let mut gy = Mat::default();
    imgproc::sobel(luminance, &mut gx, CV_32F, 1, 0, 3, 1.0, 0.0, core::BORDER_DEFAULT)?;
    imgproc::sobel(luminance, &mut gy, CV_32F, 0, 1, 3, 1.0, 0.0, core::BORDER_DEFAULT)?;

    let mut jxx = Mat::default();
    let mut jyy = Mat::default();
    let mut jxy = Mat::default();
    core::multiply(&gx, &gx, &mut jxx, 1.0, -1)?;
    core::multiply(&gy, &gy, &mut jyy, 1.0, -1)?;
    core::multiply(&gx, &gy, &mut jxy, 1.0, -1)?;

    // Gaussian-smoothed second moments
    let jxx = gaussian_blur(&jxx, 7, 2.0)?;
    let jyy = gaussian_blur(&jyy, 7, 2.0)?;
    let jxy = gaussian_blur(&jxy, 7, 2.0)?;

    let mut coherence = Mat::zeros(luminance.rows(), luminance.cols(), CV_32F)?.to_mat()?;
    for row in 0..coherence.rows() {
        let xx = jxx.at_row::<f32>(row)?;
        let yy = jyy.at_row::<f32>(row)?;
        let xy = jxy.at_row::<f32>(row)?;
        let out = coherence.at_row_mut::<f32>(row)?;
        for col in 0..out.len() {
            let trace = xx[col] + yy[col];
            if trace > 1e-6 {
                let diff = ((xx[col] - yy[col]).powi(2) + 4.0 * xy[col] * xy[col]).sqrt();
                out[col] = diff / trace;
            }
        }
    }
    Ok(coherence)
}

/// YCrCb skin classification, smoothed and morphologically closed, as a
/// float [0, 1] gate
fn skin_color_gate(frame: &Mat) -> Result<Mat> {
    let mut ycrcb = Mat::default();
    imgproc::cvt_color(frame, &mut ycrcb, imgproc::COLOR_BGR2YCrCb, 0)?;

    let mut gate = Mat::default();
    core::in_range(
        &ycrcb,
        &Scalar::new(0.0, SKIN_CR_MIN, SKIN_CB_MIN, 0.0),
        &Scalar::new(255.0, SKIN_CR_MAX, SKIN_CB_MAX, 0.0),
        &mut gate,
    )?;

    let kernel =
        imgproc::get_structuring_element(imgproc::MORPH_ELLIPSE, Size::new(7, 7), Point::new(-1, -1))?;
    let mut closed = Mat::default();
    imgproc::morphology_ex(
        &gate,
        &mut closed,
        imgproc::MORPH_CLOSE,
        &kernel,
        Point::new(-1, -1),
        1,
        core::BORDER_CONSTANT,
        imgproc::morphology_default_border_value()?,
    )?;

    let smoothed = gaussian_blur(&closed, 7, 0.0)?;
    to_f32(&smoothed, 1.0 / 255.0)
}

/// Zero the response in the band below `mouth + ratio * (chin - mouth)`
/// (stubble suppression)
fn suppress_below_mouth(response: &mut Mat, pixels: &[Point], ratio: f32) -> Result<()> {
    let (Some(right), Some(left), Some(chin)) = (
        pixels.get(MOUTH_CORNER_RIGHT),
        pixels.get(MOUTH_CORNER_LEFT),
        pixels.get(CHIN),
    ) else {
        return Ok(());
    };

    let mouth_y = (right.y + left.y) as f32 / 2.0;
    let cut = mouth_y + ratio * (chin.y as f32 - mouth_y);
    let first_row = crate::utils::safe_cast::f32_to_i32_clamp(cut, 0, response.rows());

    for row in first_row..response.rows() {
        for v in response.at_row_mut::<f32>(row)?.iter_mut() {
            *v = 0.0;
        }
    }
    Ok(())
}

/// Feathered exclusion of the eyeglass band: a bounding box around both eyes
/// expanded by the margin
fn glasses_gate(regions: &FaceRegions, margin_px: i32, size: Size) -> Result<Option<Mat>> {
    let mut eye_points: Vec<Point> = regions.left_eye.clone();
    eye_points.extend_from_slice(&regions.right_eye);
    let Some(rect) = padded_rect(&eye_points, margin_px, size.width, size.height) else {
        return Ok(None);
    };

    let mut gate = Mat::new_rows_cols_with_default(size.height, size.width, CV_8U, Scalar::all(255.0))?;
    imgproc::rectangle(&mut gate, rect, Scalar::all(0.0), imgproc::FILLED, imgproc::LINE_8, 0)?;

    let feather = odd_kernel(margin_px.max(3));
    let softened = gaussian_blur(&gate, feather, 0.0)?;
    Ok(Some(to_f32(&softened, 1.0 / 255.0)?))
}

/// Keep only the top `keep_ratio` fraction of response mass inside the face
/// region, using a masked histogram; the keep mask is lightly re-blurred for
/// soft edges before being multiplied back
fn keep_top_mass(response: &mut Mat, mask: &Mat, keep_ratio: f32) -> Result<()> {
    let (_, max_val) = min_max(response)?;
    if max_val <= 1e-6 {
        return Ok(());
    }
    let max_val = max_val as f32;

    const BINS: usize = 256;
    let mut histogram = [0u32; BINS];
    let mut total = 0u32;
    for row in 0..response.rows() {
        let inside = mask.at_row::<u8>(row)?;
        let values = response.at_row::<f32>(row)?;
        for (v, &m) in values.iter().zip(inside) {
            if m != 0 {
                let bin = ((v / max_val) * (BINS - 1) as f32) as usize;
                histogram[bin.min(BINS - 1)] += 1;
                total += 1;
            }
        }
    }
    if total == 0 {
        return Ok(());
    }

    let target = (keep_ratio * total as f32).ceil() as u32;
    let mut accumulated = 0u32;
    let mut threshold = 0.0f32;
    for bin in (0..BINS).rev() {
        accumulated += histogram[bin];
        if accumulated >= target {
            threshold = bin as f32 / (BINS - 1) as f32 * max_val;
            break;
        }
    }

    let mut keep = Mat::zeros(response.rows(), response.cols(), CV_32F)?.to_mat()?;
    for row in 0..response.rows() {
        let values = response.at_row::<f32>(row)?;
        let out = keep.at_row_mut::<f32>(row)?;
        for col in 0..out.len() {
            if values[col] >= threshold {
                out[col] = 1.0;
            }
        }
    }

    let keep = gaussian_blur(&keep, 5, 0.0)?;
    let gated = response.clone();
    core::multiply(&gated, &keep, response, 1.0, -1)?;
    Ok(())
}
