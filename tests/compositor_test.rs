//! Background compositor integration tests: mask format handling, sticky
//! channel behavior, and compositing modes through the public API

mod test_helpers;

use face_retouch::compositor::BackgroundCompositor;
use face_retouch::config::{BackgroundMode, BackgroundParams};
use opencv::core::{self, Mat, Scalar, Vec3b, CV_32FC1, CV_8U};
use opencv::prelude::*;
use test_helpers::{assert_is_rgb_of, full_mask, textured_frame};

fn solid_params(rgb: [f32; 3]) -> BackgroundParams {
    BackgroundParams {
        mode: BackgroundMode::Solid,
        solid_rgb: rgb,
        feather_px: 0,
        ..Default::default()
    }
}

#[test]
fn test_mode_none_ignores_mask_entirely() {
    let frame = textured_frame(64, 48);
    let mut mask = full_mask(64, 48);
    // Garbage in the mask must not matter
    for row in 0..48 {
        for v in mask.at_row_mut::<u8>(row).unwrap().iter_mut() {
            *v = (row % 256) as u8;
        }
    }

    let mut compositor = BackgroundCompositor::new();
    let params = BackgroundParams {
        mode: BackgroundMode::None,
        ..Default::default()
    };
    let out = compositor.composite(&frame, Some(&mask), &params, None, 1.0).unwrap();
    assert_is_rgb_of(&out, &frame, 0);
}

#[test]
fn test_float_and_byte_masks_agree() {
    let frame = textured_frame(64, 48);

    // Half-subject masks in both formats
    let mut byte_mask = Mat::new_rows_cols_with_default(48, 64, CV_8U, Scalar::all(0.0)).unwrap();
    let mut float_mask = Mat::new_rows_cols_with_default(48, 64, CV_32FC1, Scalar::all(0.0)).unwrap();
    for row in 0..48 {
        let b = byte_mask.at_row_mut::<u8>(row).unwrap();
        for v in b[..32].iter_mut() {
            *v = 255;
        }
        let f = float_mask.at_row_mut::<f32>(row).unwrap();
        for v in f[..32].iter_mut() {
            *v = 1.0;
        }
    }

    let params = solid_params([0.0, 0.0, 1.0]);
    let mut compositor_a = BackgroundCompositor::new();
    let mut compositor_b = BackgroundCompositor::new();
    let out_byte = compositor_a.composite(&frame, Some(&byte_mask), &params, None, 1.0).unwrap();
    let out_float = compositor_b.composite(&frame, Some(&float_mask), &params, None, 1.0).unwrap();

    for row in 0..48 {
        for col in 0..64 {
            let a = *out_byte.at_2d::<Vec3b>(row, col).unwrap();
            let b = *out_float.at_2d::<Vec3b>(row, col).unwrap();
            for ch in 0..3 {
                assert!((i32::from(a[ch]) - i32::from(b[ch])).abs() <= 1);
            }
        }
    }
}

#[test]
fn test_rgba_mask_sticky_across_mean_shift() {
    let frame = textured_frame(64, 48);

    // 4-channel mask with the subject in channel 2
    let make_mask = |subject_mean: f64| -> Mat {
        let mut planes = core::Vector::<Mat>::new();
        for c in 0..4 {
            let v = if c == 2 { subject_mean } else { 3.0 };
            planes.push(Mat::new_rows_cols_with_default(48, 64, CV_8U, Scalar::all(v)).unwrap());
        }
        let mut mask = Mat::default();
        core::merge(&planes, &mut mask).unwrap();
        mask
    };

    let params = solid_params([0.0, 1.0, 0.0]);
    let mut compositor = BackgroundCompositor::new();

    // First frame: channel 2 dominates, subject fully opaque
    let bright = compositor
        .composite(&frame, Some(&make_mask(255.0)), &params, None, 1.0)
        .unwrap();
    assert_is_rgb_of(&bright, &frame, 1);

    // Later frame: channel 2 mean collapses; the choice must stick, so the
    // output becomes mostly background rather than re-picking a channel
    let dim = compositor
        .composite(&frame, Some(&make_mask(0.0)), &params, None, 1.0)
        .unwrap();
    let px = *dim.at_2d::<Vec3b>(24, 32).unwrap();
    assert_eq!(px, Vec3b::from([0, 255, 0]));
}

#[test]
fn test_mask_resized_to_frame() {
    let frame = textured_frame(128, 96);
    // Quarter-resolution mask
    let mask = full_mask(32, 24);

    let mut compositor = BackgroundCompositor::new();
    let out = compositor
        .composite(&frame, Some(&mask), &solid_params([1.0, 0.0, 0.0]), None, 1.0)
        .unwrap();
    assert_is_rgb_of(&out, &frame, 1);
}

#[test]
fn test_unknown_layout_degrades_instead_of_failing() {
    let frame = textured_frame(64, 48);
    // 3-channel float: not a documented layout
    let mask = Mat::new_rows_cols_with_default(48, 64, core::CV_32FC3, Scalar::all(1.0)).unwrap();

    let mut compositor = BackgroundCompositor::new();
    let out = compositor
        .composite(&frame, Some(&mask), &solid_params([0.0, 0.0, 1.0]), None, 1.0)
        .unwrap();
    // Best-effort: channel 0 is all ones, so the subject survives
    assert_is_rgb_of(&out, &frame, 1);
}

#[test]
fn test_solid_cache_survives_color_and_size_changes() {
    let frame = textured_frame(64, 48);
    let mut zero_mask = full_mask(64, 48);
    for row in 0..48 {
        for v in zero_mask.at_row_mut::<u8>(row).unwrap().iter_mut() {
            *v = 0;
        }
    }

    let mut compositor = BackgroundCompositor::new();
    let red = compositor
        .composite(&frame, Some(&zero_mask), &solid_params([1.0, 0.0, 0.0]), None, 1.0)
        .unwrap();
    assert_eq!(*red.at_2d::<Vec3b>(10, 10).unwrap(), Vec3b::from([255, 0, 0]));

    // Color change invalidates the cached buffer
    let blue = compositor
        .composite(&frame, Some(&zero_mask), &solid_params([0.0, 0.0, 1.0]), None, 1.0)
        .unwrap();
    assert_eq!(*blue.at_2d::<Vec3b>(10, 10).unwrap(), Vec3b::from([0, 0, 255]));
}

#[test]
fn test_image_mode_without_image_passes_through() {
    let frame = textured_frame(64, 48);
    let mask = full_mask(64, 48);
    let mut compositor = BackgroundCompositor::new();
    let params = BackgroundParams {
        mode: BackgroundMode::Image,
        ..Default::default()
    };
    let out = compositor.composite(&frame, Some(&mask), &params, None, 1.0).unwrap();
    assert_is_rgb_of(&out, &frame, 0);
}
