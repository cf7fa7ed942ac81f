//! Helper functions and synthetic inputs shared by the integration tests

use face_retouch::constants::NUM_FACE_LANDMARKS;
use opencv::core::{Mat, Scalar, Vec3b, CV_8U, CV_8UC3};
use opencv::prelude::*;

/// Deterministic textured frame (BGR)
pub fn textured_frame(width: i32, height: i32) -> Mat {
    let mut frame = Mat::new_rows_cols_with_default(height, width, CV_8UC3, Scalar::all(0.0)).unwrap();
    for row in 0..height {
        for col in 0..width {
            let v = ((row * 7 + col * 11) % 160 + 60) as u8;
            *frame.at_2d_mut::<Vec3b>(row, col).unwrap() = Vec3b::from([v, v.wrapping_add(20), v.wrapping_add(40)]);
        }
    }
    frame
}

/// All-subject mask (255 everywhere)
pub fn full_mask(width: i32, height: i32) -> Mat {
    Mat::new_rows_cols_with_default(height, width, CV_8U, Scalar::all(255.0)).unwrap()
}

/// Synthetic normalized face-mesh landmarks: concentric ellipses centered in
/// the frame, enough structure for every canonical index set
pub fn synthetic_landmarks() -> Vec<(f32, f32)> {
    (0..NUM_FACE_LANDMARKS)
        .map(|i| {
            let angle = i as f32 * 0.37;
            let radius = 0.1 + 0.3 * ((i % 97) as f32 / 97.0);
            (0.5 + radius * angle.cos(), 0.5 + radius * angle.sin())
        })
        .collect()
}

/// Per-pixel comparison against the BGR->RGB conversion of `frame`
pub fn assert_is_rgb_of(out: &Mat, frame: &Mat, tolerance: i32) {
    assert_eq!(out.size().unwrap(), frame.size().unwrap());
    for row in 0..frame.rows() {
        for col in 0..frame.cols() {
            let bgr = *frame.at_2d::<Vec3b>(row, col).unwrap();
            let rgb = *out.at_2d::<Vec3b>(row, col).unwrap();
            for (a, b) in [(rgb[0], bgr[2]), (rgb[1], bgr[1]), (rgb[2], bgr[0])] {
                assert!(
                    (i32::from(a) - i32::from(b)).abs() <= tolerance,
                    "mismatch at ({row}, {col}): {rgb:?} vs {bgr:?}"
                );
            }
        }
    }
}
