//! Constants used throughout the pipeline

/// Number of landmarks produced by the face mesh model
pub const NUM_FACE_LANDMARKS: usize = 468;

/// Minimum landmark count accepted by region extraction
pub const MIN_LANDMARKS: usize = 200;

/// Face oval ring (hull-ordered downstream), face mesh topology indices
pub const FACE_OVAL: [usize; 36] = [
    10, 338, 297, 332, 284, 251, 389, 356, 454, 323, 361, 288, 397, 365, 379, 378, 400, 377, 152,
    148, 176, 149, 150, 136, 172, 58, 132, 93, 234, 127, 162, 21, 54, 103, 67, 109,
];

/// Outer lip ring, anatomical traversal order
pub const LIPS_OUTER: [usize; 20] = [
    61, 146, 91, 181, 84, 17, 314, 405, 321, 375, 291, 409, 270, 269, 267, 0, 37, 39, 40, 185,
];

/// Inner lip ring, anatomical traversal order
pub const LIPS_INNER: [usize; 20] = [
    78, 95, 88, 178, 87, 14, 317, 402, 318, 324, 308, 415, 310, 311, 312, 13, 82, 81, 80, 191,
];

/// Left eye ring (subject's left, image right)
pub const LEFT_EYE: [usize; 16] = [
    263, 249, 390, 373, 374, 380, 381, 382, 362, 398, 384, 385, 386, 387, 388, 466,
];

/// Right eye ring (subject's right, image left)
pub const RIGHT_EYE: [usize; 16] = [
    33, 7, 163, 144, 145, 153, 154, 155, 133, 173, 157, 158, 159, 160, 161, 246,
];

/// Mouth corner landmarks
pub const MOUTH_CORNER_RIGHT: usize = 61;
pub const MOUTH_CORNER_LEFT: usize = 291;

/// Outer eye corner landmarks
pub const EYE_OUTER_RIGHT: usize = 33;
pub const EYE_OUTER_LEFT: usize = 263;

/// Eye aperture landmarks: (top, bottom, inner corner) per eye
pub const RIGHT_EYE_TOP: usize = 159;
pub const RIGHT_EYE_BOTTOM: usize = 145;
pub const RIGHT_EYE_INNER: usize = 133;
pub const LEFT_EYE_TOP: usize = 386;
pub const LEFT_EYE_BOTTOM: usize = 374;
pub const LEFT_EYE_INNER: usize = 362;

/// Chin tip landmark
pub const CHIN: usize = 152;

/// Upper eyebrow landmarks, used to locate the forehead band
pub const RIGHT_BROW_TOP: usize = 105;
pub const LEFT_BROW_TOP: usize = 334;

/// Skin-tone gate thresholds in YCrCb space
pub const SKIN_CR_MIN: f64 = 135.0;
pub const SKIN_CR_MAX: f64 = 180.0;
pub const SKIN_CB_MIN: f64 = 85.0;
pub const SKIN_CB_MAX: f64 = 135.0;

/// Smile ratio (mouth width / eye span) mapped linearly onto [0, 1]
pub const SMILE_RATIO_LOW: f32 = 0.35;
pub const SMILE_RATIO_HIGH: f32 = 0.55;

/// Eye aperture (height / width) mapped inverted onto [0, 1]
pub const APERTURE_LOW: f32 = 0.10;
pub const APERTURE_HIGH: f32 = 0.22;

/// Expression boost disc radius as a fraction of the eye span
pub const BOOST_DISC_RADIUS_FRAC: f32 = 0.08;

/// Minimum weight kept inside the face mask even on highly textured skin
pub const WEIGHT_FLOOR: f32 = 0.15;

/// Texture map normalization: 3x the face-region mean, with this floor
pub const TEXTURE_NORM_FLOOR: f32 = 8.0;

/// Mean weight below which texture suppression is considered degenerate
pub const WEIGHT_NEGLIGIBLE_MEAN: f64 = 0.02;

/// Reduced-resolution ROI below this side length falls back to full resolution
pub const MIN_SCALED_ROI: i32 = 8;

/// Adaptive scale controller tuning
pub const FPS_WINDOW: usize = 10;
pub const ADJUST_INTERVAL_SECS: f64 = 5.0;
pub const FPS_DEADBAND: f64 = 2.0;
pub const FPS_COARSE_GAP: f64 = 6.0;
pub const SCALE_STEP: f64 = 0.001;
pub const SCALE_STEP_COARSE: f64 = 0.002;
pub const SCALE_APPLY_EPS: f64 = 0.0005;
pub const SCALE_MIN: f64 = 0.4;
pub const SCALE_MAX: f64 = 1.0;

/// Target FPS derivation from the camera frame rate
pub const TARGET_FPS_CAP: f64 = 15.0;
pub const TARGET_FPS_FLOOR: f64 = 5.0;
