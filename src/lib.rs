//! Face-aware video effects library for real-time background replacement and
//! cosmetic retouching.
//!
//! Given a BGR camera frame, a segmentation probability mask, and a set of
//! normalized face-mesh landmarks, the pipeline produces a composited RGB
//! output frame with:
//! - background replacement (blur, image, or solid color) via mask-normalized
//!   compositing
//! - skin smoothing by Lab-space frequency separation with wrinkle awareness
//! - expression-driven wrinkle boosting (smile, squint, forehead lines)
//! - lip tinting and teeth whitening
//!
//! Processing resolution adapts toward a target frame rate through a slow
//! feedback controller shared by the smoother and the compositor.
//!
//! # Examples
//!
//! ## Processing a frame
//!
//! ```no_run
//! use face_retouch::config::{BackgroundMode, EffectParameters};
//! use face_retouch::pipeline::RetouchPipeline;
//! use opencv::imgcodecs;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut params = EffectParameters::default();
//! params.skin.enabled = true;
//! params.background.mode = BackgroundMode::Blur;
//!
//! let mut pipeline = RetouchPipeline::new(params, 30.0);
//!
//! let frame = imgcodecs::imread("frame.png", imgcodecs::IMREAD_COLOR)?;
//! let mask = imgcodecs::imread("mask.png", imgcodecs::IMREAD_GRAYSCALE)?;
//! // Normalized landmarks from the upstream face mesh
//! let landmarks: Vec<(f32, f32)> = vec![(0.5, 0.5); 468];
//!
//! let rgb = pipeline.process_frame(&frame, Some(&mask), Some(&landmarks))?;
//! println!("Processing scale: {:.2}", pipeline.status().scale);
//! # Ok(())
//! # }
//! ```
//!
//! ## Individual stages
//!
//! ```no_run
//! use face_retouch::face_regions::{LandmarkOrientation, RegionExtractor};
//! use face_retouch::skin_weight;
//! use opencv::core::Size;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let landmarks: Vec<(f32, f32)> = vec![(0.5, 0.5); 468];
//! let extractor = RegionExtractor::new(LandmarkOrientation::default());
//! let regions = extractor.extract(&landmarks, Size::new(640, 480))?;
//! let weight = skin_weight::build_weight_map(&regions, Size::new(640, 480), 12, 0.5, None)?;
//! # Ok(())
//! # }
//! ```

/// Adaptive processing-resolution feedback controller
pub mod adaptive_scale;

/// Background mask decoding and compositing
pub mod compositor;

/// Grouped effect parameters with range clamping
pub mod config;

/// Landmark index sets and tuning constants
pub mod constants;

/// Error types and result handling
pub mod error;

/// Expression inference and wrinkle boost injection
pub mod expression;

/// Landmark-to-polygon region extraction
pub mod face_regions;

/// Per-pixel skin weight map construction
pub mod skin_weight;

/// Per-frame pipeline orchestration
pub mod pipeline;

/// Lab-space frequency-separation skin smoothing
pub mod smoothing;

/// Lip tinting and teeth whitening
pub mod mouth;

/// Utility functions for casts and shared Mat operations
pub mod utils;

/// Multi-scale morphological wrinkle detection
pub mod wrinkles;

pub use error::{Error, Result};
