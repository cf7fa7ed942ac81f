//! Polygon-masked Lab-space mouth grading: lip tinting and teeth whitening.
//!
//! Lips are masked as separate upper/lower polygons built from the outer and
//! inner landmark arcs; a single outer-minus-inner ring leaves seam artifacts
//! at the corners. Teeth use the inner-lip polygon shrunk away from the lip
//! border.

use crate::config::{LipParams, TeethParams};
use crate::face_regions::FaceRegions;
use crate::utils::mat_ops::{
    bgr_to_lab_planes, feather_mask, fill_polygons, lab_planes_to_bgr, odd_kernel, offset_points,
    paint_polygons,
};
use crate::utils::padded_rect;
use crate::Result;
use opencv::core::{self, Mat, Point, Rect, Scalar, Size, Vec3b};
use opencv::imgproc;
use opencv::prelude::*;

/// Half-ring split point: lip rings run corner -> corner along the lower
/// arc, then back along the upper arc
const LIP_ARC_SPLIT: usize = 10;

/// Apply the configured lip tint in place. A zero alpha or an unusable lip
/// ring leaves the frame untouched.
///
/// # Errors
///
/// Returns an error if an underlying image operation fails
pub fn tint_lips(frame: &mut Mat, regions: &FaceRegions, params: &LipParams) -> Result<()> {
    if params.alpha <= 0.0 || regions.lips_outer.len() < 3 {
        return Ok(());
    }

    let size = frame.size()?;
    let pad = params.band_grow_px + params.feather_px + 4;
    let Some(rect) = padded_rect(&regions.lips_outer, pad, size.width, size.height) else {
        return Ok(());
    };

    let mask = lip_mask(regions, rect, params.band_grow_px, params.feather_px)?;
    let (target_a, target_b) = tint_target(params.rgb)?;

    let roi = Mat::roi(frame, rect)?.try_clone()?;
    let mut planes = bgr_to_lab_planes(&roi)?;
    let mut luminance = planes.get(0)?;
    let mut chroma_a = planes.get(1)?;
    let mut chroma_b = planes.get(2)?;

    let lightness_shift = params.lightness * 40.0;
    for row in 0..roi.rows() {
        let m = mask.at_row::<f32>(row)?;
        let l_row = luminance.at_row_mut::<u8>(row)?;
        let a_row = chroma_a.at_row_mut::<u8>(row)?;
        let b_row = chroma_b.at_row_mut::<u8>(row)?;
        for col in 0..l_row.len() {
            let blend = params.alpha * m[col];
            if blend <= 0.0 {
                continue;
            }
            a_row[col] = shift_toward(a_row[col], target_a, blend);
            b_row[col] = shift_toward(b_row[col], target_b, blend);
            if lightness_shift != 0.0 {
                l_row[col] = (f32::from(l_row[col]) + blend * lightness_shift).clamp(0.0, 255.0) as u8;
            }
        }
    }

    planes.set(0, luminance)?;
    planes.set(1, chroma_a)?;
    planes.set(2, chroma_b)?;
    let graded = lab_planes_to_bgr(&planes)?;
    // Confine the Lab round-trip to the band itself
    let mut touched = Mat::default();
    core::compare(&mask, &Scalar::all(0.0), &mut touched, core::CMP_GT)?;
    graded.copy_to_masked(&mut Mat::roi_mut(frame, rect)?, &touched)?;
    Ok(())
}

/// Whiten teeth in place: b* nudged toward neutral, L* raised, inside the
/// shrunk inner-lip polygon. A zero strength leaves the frame untouched.
///
/// # Errors
///
/// Returns an error if an underlying image operation fails
pub fn whiten_teeth(frame: &mut Mat, regions: &FaceRegions, params: &TeethParams) -> Result<()> {
    if params.strength <= 0.0 || regions.lips_inner.len() < 3 {
        return Ok(());
    }

    let size = frame.size()?;
    let Some(rect) = padded_rect(&regions.lips_inner, 4, size.width, size.height) else {
        return Ok(());
    };

    let local = offset_points(&regions.lips_inner, -rect.x, -rect.y);
    let mut mouth = fill_polygons(rect.size(), &[&local])?;
    if params.margin_px > 0 {
        let kernel = imgproc::get_structuring_element(
            imgproc::MORPH_ELLIPSE,
            Size::new(odd_kernel(2 * params.margin_px + 1), odd_kernel(2 * params.margin_px + 1)),
            Point::new(-1, -1),
        )?;
        let mut eroded = Mat::default();
        imgproc::erode(
            &mouth,
            &mut eroded,
            &kernel,
            Point::new(-1, -1),
            1,
            core::BORDER_CONSTANT,
            imgproc::morphology_default_border_value()?,
        )?;
        mouth = eroded;
    }
    if core::count_non_zero(&mouth)? == 0 {
        return Ok(());
    }
    let mask = feather_mask(&mouth, 2)?;

    let roi = Mat::roi(frame, rect)?.try_clone()?;
    let mut planes = bgr_to_lab_planes(&roi)?;
    let mut luminance = planes.get(0)?;
    let mut chroma_b = planes.get(2)?;

    for row in 0..roi.rows() {
        let m = mask.at_row::<f32>(row)?;
        let l_row = luminance.at_row_mut::<u8>(row)?;
        let b_row = chroma_b.at_row_mut::<u8>(row)?;
        for col in 0..l_row.len() {
            let s = params.strength * m[col];
            if s <= 0.0 {
                continue;
            }
            // Yellow cast lives in b*; pull it toward neutral
            b_row[col] = shift_toward(b_row[col], 128.0, 0.35 * s);
            let lum = f32::from(l_row[col]);
            l_row[col] = (lum + 0.15 * s * (255.0 - lum)).clamp(0.0, 255.0) as u8;
        }
    }

    planes.set(0, luminance)?;
    planes.set(2, chroma_b)?;
    let graded = lab_planes_to_bgr(&planes)?;
    let mut touched = Mat::default();
    core::compare(&mask, &Scalar::all(0.0), &mut touched, core::CMP_GT)?;
    graded.copy_to_masked(&mut Mat::roi_mut(frame, rect)?, &touched)?;
    Ok(())
}

fn shift_toward(value: u8, target: f32, blend: f32) -> u8 {
    let v = f32::from(value);
    (v + blend * (target - v)).clamp(0.0, 255.0) as u8
}

/// Lab a*/b* of the configured tint color
fn tint_target(rgb: [f32; 3]) -> Result<(f32, f32)> {
    let bgr = Scalar::new(
        f64::from(rgb[2]) * 255.0,
        f64::from(rgb[1]) * 255.0,
        f64::from(rgb[0]) * 255.0,
        0.0,
    );
    let swatch = Mat::new_rows_cols_with_default(1, 1, core::CV_8UC3, bgr)?;
    let mut lab = Mat::default();
    imgproc::cvt_color(&swatch, &mut lab, imgproc::COLOR_BGR2Lab, 0)?;
    let px = *lab.at_2d::<Vec3b>(0, 0)?;
    Ok((f32::from(px[1]), f32::from(px[2])))
}

/// Feathered lip-band mask local to `rect`: separate upper and lower lip
/// polygons, optionally dilated to unify the seam
fn lip_mask(regions: &FaceRegions, rect: Rect, band_grow_px: i32, feather_px: i32) -> Result<Mat> {
    let outer = offset_points(&regions.lips_outer, -rect.x, -rect.y);
    let inner = offset_points(&regions.lips_inner, -rect.x, -rect.y);

    let mut mask = if outer.len() == 2 * LIP_ARC_SPLIT && inner.len() == 2 * LIP_ARC_SPLIT {
        let upper = band_polygon(&outer, &inner, LIP_ARC_SPLIT, true);
        let lower = band_polygon(&outer, &inner, LIP_ARC_SPLIT, false);
        fill_polygons(rect.size(), &[&upper, &lower])?
    } else {
        // Sparse ring fallback: outer fill minus the inner hole
        let mut m = fill_polygons(rect.size(), &[&outer])?;
        if inner.len() >= 3 {
            paint_polygons(&mut m, &[&inner], 0.0)?;
        }
        m
    };

    if band_grow_px > 0 {
        let k = odd_kernel(2 * band_grow_px + 1);
        let kernel = imgproc::get_structuring_element(
            imgproc::MORPH_ELLIPSE,
            Size::new(k, k),
            Point::new(-1, -1),
        )?;
        let mut grown = Mat::default();
        imgproc::dilate(
            &mask,
            &mut grown,
            &kernel,
            Point::new(-1, -1),
            1,
            core::BORDER_CONSTANT,
            imgproc::morphology_default_border_value()?,
        )?;
        mask = grown;
    }

    feather_mask(&mask, feather_px)
}

/// One lip band: an outer arc joined to the reversed matching inner arc
fn band_polygon(outer: &[Point], inner: &[Point], split: usize, upper: bool) -> Vec<Point> {
    let mut polygon = Vec::with_capacity(2 * (split + 1));
    if upper {
        polygon.extend_from_slice(&outer[split..]);
        polygon.push(outer[0]);
        polygon.push(inner[0]);
        polygon.extend(inner[split..].iter().rev());
    } else {
        polygon.extend_from_slice(&outer[..=split]);
        polygon.extend(inner[..=split].iter().rev());
    }
    polygon
}
