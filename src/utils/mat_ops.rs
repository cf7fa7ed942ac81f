//! Mat helpers shared by the effect stages: odd-kernel blurs, polygon
//! rasterization, mask feathering, and Lab round-trips.

use crate::Result;
use opencv::core::{self, Mat, Point, Scalar, Size, Vector, BORDER_DEFAULT, CV_32F, CV_8U};
use opencv::imgproc;
use opencv::prelude::*;

/// Force a Gaussian/morphology kernel size to be odd and at least 1
#[must_use]
pub fn odd_kernel(size: i32) -> i32 {
    let size = size.max(1);
    if size % 2 == 0 {
        size + 1
    } else {
        size
    }
}

/// Gaussian blur with a square odd kernel
///
/// # Errors
///
/// Returns an error if the underlying OpenCV call fails
pub fn gaussian_blur(src: &Mat, ksize: i32, sigma: f64) -> Result<Mat> {
    let k = odd_kernel(ksize);
    let mut dst = Mat::default();
    imgproc::gaussian_blur(src, &mut dst, Size::new(k, k), sigma, 0.0, BORDER_DEFAULT)?;
    Ok(dst)
}

/// Rasterize polygons into a single-channel 8-bit mask (255 inside).
/// Polygons with fewer than 3 points are skipped.
///
/// # Errors
///
/// Returns an error if mask allocation or polygon filling fails
pub fn fill_polygons(size: Size, polygons: &[&[Point]]) -> Result<Mat> {
    let mut mask = Mat::zeros(size.height, size.width, CV_8U)?.to_mat()?;
    paint_polygons(&mut mask, polygons, 255.0)?;
    Ok(mask)
}

/// Paint polygons into an existing mask with the given value
///
/// # Errors
///
/// Returns an error if polygon filling fails
pub fn paint_polygons(mask: &mut Mat, polygons: &[&[Point]], value: f64) -> Result<()> {
    let mut pts = Vector::<Vector<Point>>::new();
    for polygon in polygons {
        if polygon.len() >= 3 {
            pts.push(Vector::from_slice(polygon));
        }
    }
    if !pts.is_empty() {
        imgproc::fill_poly(
            mask,
            &pts,
            Scalar::all(value),
            imgproc::LINE_8,
            0,
            Point::default(),
        )?;
    }
    Ok(())
}

/// Feather a binary 8-bit mask into a float [0, 1] map. A feather of 0
/// produces a hard 0/1 map.
///
/// # Errors
///
/// Returns an error if blurring or conversion fails
pub fn feather_mask(mask: &Mat, feather_px: i32) -> Result<Mat> {
    let softened = if feather_px > 0 {
        gaussian_blur(mask, 2 * feather_px + 1, f64::from(feather_px))?
    } else {
        mask.clone()
    };
    let mut out = Mat::default();
    softened.convert_to(&mut out, CV_32F, 1.0 / 255.0, 0.0)?;
    Ok(out)
}

/// Split a BGR frame into 8-bit Lab planes (L, a, b)
///
/// # Errors
///
/// Returns an error if color conversion or channel split fails
pub fn bgr_to_lab_planes(frame: &Mat) -> Result<Vector<Mat>> {
    let mut lab = Mat::default();
    imgproc::cvt_color(frame, &mut lab, imgproc::COLOR_BGR2Lab, 0)?;
    let mut planes = Vector::<Mat>::new();
    core::split(&lab, &mut planes)?;
    Ok(planes)
}

/// Merge 8-bit Lab planes back into a BGR frame
///
/// # Errors
///
/// Returns an error if channel merge or color conversion fails
pub fn lab_planes_to_bgr(planes: &Vector<Mat>) -> Result<Mat> {
    let mut lab = Mat::default();
    core::merge(planes, &mut lab)?;
    let mut bgr = Mat::default();
    imgproc::cvt_color(&lab, &mut bgr, imgproc::COLOR_Lab2BGR, 0)?;
    Ok(bgr)
}

/// Convert a Mat to single-precision float with the given scale
///
/// # Errors
///
/// Returns an error if the conversion fails
pub fn to_f32(src: &Mat, scale: f64) -> Result<Mat> {
    let mut out = Mat::default();
    src.convert_to(&mut out, CV_32F, scale, 0.0)?;
    Ok(out)
}

/// Bilinear resize to an exact size
///
/// # Errors
///
/// Returns an error if the resize fails
pub fn resize_to(src: &Mat, size: Size, interpolation: i32) -> Result<Mat> {
    let mut out = Mat::default();
    imgproc::resize(src, &mut out, size, 0.0, 0.0, interpolation)?;
    Ok(out)
}

/// Clamp every element of a single-channel f32 Mat to [0, 1] in place
///
/// # Errors
///
/// Returns an error if row access fails
pub fn clamp_unit(m: &mut Mat) -> Result<()> {
    for row in 0..m.rows() {
        let values = m.at_row_mut::<f32>(row)?;
        for v in values.iter_mut() {
            *v = v.clamp(0.0, 1.0);
        }
    }
    Ok(())
}

/// Minimum and maximum of a single-channel Mat
///
/// # Errors
///
/// Returns an error if the reduction fails
pub fn min_max(m: &Mat) -> Result<(f64, f64)> {
    let mut min_val = 0.0;
    let mut max_val = 0.0;
    core::min_max_loc(
        m,
        Some(&mut min_val),
        Some(&mut max_val),
        None,
        None,
        &core::no_array(),
    )?;
    Ok((min_val, max_val))
}

/// Translate integer points by an offset (used when working inside an ROI)
#[must_use]
pub fn offset_points(points: &[Point], dx: i32, dy: i32) -> Vec<Point> {
    points.iter().map(|p| Point::new(p.x + dx, p.y + dy)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_odd_kernel() {
        assert_eq!(odd_kernel(0), 1);
        assert_eq!(odd_kernel(1), 1);
        assert_eq!(odd_kernel(24), 25);
        assert_eq!(odd_kernel(25), 25);
        assert_eq!(odd_kernel(-3), 1);
    }

    #[test]
    fn test_fill_polygons_inside_outside() {
        let square = vec![
            Point::new(10, 10),
            Point::new(30, 10),
            Point::new(30, 30),
            Point::new(10, 30),
        ];
        let mask = fill_polygons(Size::new(64, 64), &[&square]).unwrap();

        assert_eq!(*mask.at_2d::<u8>(20, 20).unwrap(), 255);
        assert_eq!(*mask.at_2d::<u8>(5, 5).unwrap(), 0);
        assert_eq!(*mask.at_2d::<u8>(50, 50).unwrap(), 0);
    }

    #[test]
    fn test_fill_polygons_skips_degenerate() {
        let line = vec![Point::new(0, 0), Point::new(10, 10)];
        let mask = fill_polygons(Size::new(32, 32), &[&line]).unwrap();
        assert_eq!(core::count_non_zero(&mask).unwrap(), 0);
    }

    #[test]
    fn test_feather_mask_range() {
        let square = vec![
            Point::new(8, 8),
            Point::new(24, 8),
            Point::new(24, 24),
            Point::new(8, 24),
        ];
        let mask = fill_polygons(Size::new(32, 32), &[&square]).unwrap();
        let feathered = feather_mask(&mask, 3).unwrap();

        let (min_val, max_val) = min_max(&feathered).unwrap();
        assert!(min_val >= 0.0);
        assert!(max_val <= 1.0);
        // Deep interior stays saturated, edges soften
        assert!(*feathered.at_2d::<f32>(16, 16).unwrap() > 0.99);
        let edge = *feathered.at_2d::<f32>(8, 16).unwrap();
        assert!(edge > 0.0 && edge < 1.0);
    }

    #[test]
    fn test_lab_roundtrip_close() {
        let mut frame = Mat::new_rows_cols_with_default(
            8,
            8,
            core::CV_8UC3,
            Scalar::new(120.0, 80.0, 200.0, 0.0),
        )
        .unwrap();
        // A couple of non-uniform pixels
        *frame.at_2d_mut::<core::Vec3b>(2, 2).unwrap() = core::Vec3b::from([10, 240, 33]);

        let planes = bgr_to_lab_planes(&frame).unwrap();
        let back = lab_planes_to_bgr(&planes).unwrap();

        for row in 0..8 {
            for col in 0..8 {
                let a = *frame.at_2d::<core::Vec3b>(row, col).unwrap();
                let b = *back.at_2d::<core::Vec3b>(row, col).unwrap();
                for ch in 0..3 {
                    assert!((i32::from(a[ch]) - i32::from(b[ch])).abs() <= 2);
                }
            }
        }
    }

    #[test]
    fn test_clamp_unit() {
        let mut m = Mat::new_rows_cols_with_default(2, 2, CV_32F, Scalar::all(1.7)).unwrap();
        *m.at_2d_mut::<f32>(0, 0).unwrap() = -0.5;
        clamp_unit(&mut m).unwrap();
        assert_eq!(*m.at_2d::<f32>(0, 0).unwrap(), 0.0);
        assert_eq!(*m.at_2d::<f32>(1, 1).unwrap(), 1.0);
    }

    #[test]
    fn test_offset_points() {
        let pts = vec![Point::new(10, 20), Point::new(-4, 6)];
        let shifted = offset_points(&pts, -10, 5);
        assert_eq!(shifted[0], Point::new(0, 25));
        assert_eq!(shifted[1], Point::new(-14, 11));
    }
}
