//! Per-pixel skin weight map: where, and how strongly, retouching may act.
//!
//! Combines the face polygon (minus lips and eyes), a distance-transform edge
//! feather, and a gradient-based texture-preservation term into a float map
//! in [0, 1]. The map is exactly zero outside the face polygon.

use crate::constants::{TEXTURE_NORM_FLOOR, WEIGHT_FLOOR, WEIGHT_NEGLIGIBLE_MEAN};
use crate::face_regions::FaceRegions;
use crate::utils::mat_ops::{fill_polygons, gaussian_blur, paint_polygons};
use crate::Result;
use opencv::core::{self, Mat, Size, CV_32F};
use opencv::imgproc;
use opencv::prelude::*;

/// Rasterize the face polygon minus lips/eyes into a binary 8-bit mask
///
/// # Errors
///
/// Returns an error if rasterization fails
pub fn face_skin_mask(regions: &FaceRegions, frame_size: Size) -> Result<Mat> {
    let mut mask = fill_polygons(frame_size, &[&regions.face_oval])?;
    paint_polygons(&mut mask, &regions.skin_holes(), 0.0)?;
    Ok(mask)
}

/// Build the skin weight map for one frame.
///
/// `hint` is a luminance image (gray or BGR) used for the texture term; when
/// absent, the map is the pure edge falloff.
///
/// # Errors
///
/// Returns an error if any underlying image operation fails
pub fn build_weight_map(
    regions: &FaceRegions,
    frame_size: Size,
    edge_feather_px: i32,
    texture_keep: f32,
    hint: Option<&Mat>,
) -> Result<Mat> {
    if !regions.has_face() {
        return Ok(Mat::zeros(frame_size.height, frame_size.width, CV_32F)?.to_mat()?);
    }

    let mask = face_skin_mask(regions, frame_size)?;
    let falloff = edge_falloff(&mask, edge_feather_px)?;

    let Some(hint) = hint else {
        return Ok(falloff);
    };

    let attenuation = texture_attenuation(hint, &mask, texture_keep)?;

    let mut weight = Mat::default();
    core::multiply(&falloff, &attenuation, &mut weight, 1.0, -1)?;

    // Texture suppression can collapse the map on very detailed skin; fall
    // back to the plain falloff rather than disabling the effect.
    let mean = core::mean(&weight, &mask)?[0];
    if mean < WEIGHT_NEGLIGIBLE_MEAN {
        log::debug!("Texture term degenerate (mean {mean:.4}), using edge falloff only");
        return Ok(falloff);
    }

    apply_floor(&mut weight, &mask)?;
    Ok(weight)
}

/// Distance-transform falloff: 0 at the mask edge, 1 at `feather_px` inside
fn edge_falloff(mask: &Mat, feather_px: i32) -> Result<Mat> {
    let mut dist = Mat::default();
    imgproc::distance_transform(mask, &mut dist, imgproc::DIST_L2, imgproc::DIST_MASK_3, CV_32F)?;

    let feather = feather_px.max(1) as f32;
    for row in 0..dist.rows() {
        let values = dist.at_row_mut::<f32>(row)?;
        for v in values.iter_mut() {
            *v = (*v / feather).min(1.0);
        }
    }
    Ok(dist)
}

/// Gradient-magnitude texture term converted to an attenuation factor
fn texture_attenuation(hint: &Mat, mask: &Mat, texture_keep: f32) -> Result<Mat> {
    let gray = if hint.channels() == 1 {
        hint.clone()
    } else {
        let mut g = Mat::default();
        imgproc::cvt_color(hint, &mut g, imgproc::COLOR_BGR2GRAY, 0)?;
        g
    };

    let mut gx = Mat::default();
    let mut gy = Mat::default();
    imgproc::sobel(&gray, &mut gx, CV_32F, 1, 0, 3, 1.0, 0.0, core::BORDER_DEFAULT)?;
    imgproc::sobel(&gray, &mut gy, CV_32F, 0, 1, 3, 1.0, 0.0, core::BORDER_DEFAULT)?;

    let mut magnitude = Mat::default();
    core::magnitude(&gx, &gy, &mut magnitude)?;
    let mut magnitude = gaussian_blur(&magnitude, 5, 0.0)?;

    // Normalize by 3x the face-region mean so the term adapts to overall
    // skin texture instead of absolute contrast.
    let norm = (3.0 * core::mean(&magnitude, mask)?[0] as f32).max(TEXTURE_NORM_FLOOR);
    let thresh = texture_keep.clamp(0.01, 1.0);
    for row in 0..magnitude.rows() {
        let values = magnitude.at_row_mut::<f32>(row)?;
        for v in values.iter_mut() {
            *v = 1.0 / (1.0 + (*v / norm) / thresh);
        }
    }
    Ok(magnitude)
}

/// Keep at least `WEIGHT_FLOOR` inside the face mask
fn apply_floor(weight: &mut Mat, mask: &Mat) -> Result<()> {
    for row in 0..weight.rows() {
        let inside = mask.at_row::<u8>(row)?;
        let values = weight.at_row_mut::<f32>(row)?;
        for (v, &m) in values.iter_mut().zip(inside) {
            if m != 0 {
                *v = v.max(WEIGHT_FLOOR);
            }
        }
    }
    Ok(())
}
