//! Per-frame orchestration: landmarks to regions, retouching stages in
//! order, background compositing, and the adaptive-scale feedback loop.
//!
//! The pipeline is synchronous and single-threaded from the caller's view:
//! one frame, one mask, one landmark set in; one RGB frame out. A stage that
//! cannot run (bad landmarks, empty mask) is skipped for that frame rather
//! than failing the whole pipeline.

use crate::adaptive_scale::AdaptiveScaleController;
use crate::compositor::BackgroundCompositor;
use crate::config::EffectParameters;
use crate::face_regions::{LandmarkOrientation, RegionExtractor};
use crate::smoothing::SmootherInputs;
use crate::utils::mat_ops::bgr_to_lab_planes;
use crate::{expression, mouth, skin_weight, smoothing, wrinkles};
use crate::{Error, Result};
use opencv::core::{Mat, CV_8UC3};
use opencv::imgproc;
use opencv::prelude::*;
use std::time::Instant;

/// Smoothing factor for the per-frame FPS estimate
const FPS_SMOOTHING: f64 = 0.9;

/// Read-only pipeline state for display overlays
#[derive(Debug, Clone, Copy)]
pub struct PipelineStatus {
    /// Current processing scale in [0.4, 1.0]
    pub scale: f64,
    /// Smoothed instantaneous FPS
    pub current_fps: f64,
    /// Windowed average FPS seen by the scale controller
    pub average_fps: f64,
    /// Whether compositing runs on OpenCL device buffers
    pub opencl_active: bool,
}

/// The face-aware video effects pipeline
pub struct RetouchPipeline {
    params: EffectParameters,
    extractor: RegionExtractor,
    compositor: BackgroundCompositor,
    scale_controller: AdaptiveScaleController,
    background_image: Option<Mat>,
    last_frame_at: Option<Instant>,
    current_fps: f64,
}

impl RetouchPipeline {
    /// Create a pipeline for the given camera frame rate
    #[must_use]
    pub fn new(params: EffectParameters, camera_fps: f64) -> Self {
        log::info!("Initializing retouch pipeline (camera {camera_fps:.1} fps)");
        Self {
            params,
            extractor: RegionExtractor::default(),
            compositor: BackgroundCompositor::new(),
            scale_controller: AdaptiveScaleController::new(camera_fps),
            background_image: None,
            last_frame_at: None,
            current_fps: 0.0,
        }
    }

    /// Replace the effect parameters for subsequent frames
    pub fn set_params(&mut self, params: EffectParameters) {
        self.params = params;
    }

    /// Current effect parameters
    #[must_use]
    pub fn params(&self) -> &EffectParameters {
        &self.params
    }

    /// Set the landmark coordinate correction
    pub fn set_orientation(&mut self, orientation: LandmarkOrientation) {
        self.extractor = RegionExtractor::new(orientation);
    }

    /// Supply (or clear) the background replacement image, BGR 8-bit
    pub fn set_background_image(&mut self, image: Option<Mat>) {
        self.background_image = image;
    }

    /// Update the upstream camera frame rate
    pub fn set_camera_fps(&mut self, camera_fps: f64) {
        self.scale_controller.set_camera_fps(camera_fps);
    }

    /// Read-only status for display overlays
    #[must_use]
    pub fn status(&self) -> PipelineStatus {
        PipelineStatus {
            scale: self.scale_controller.scale(),
            current_fps: self.current_fps,
            average_fps: self.scale_controller.average_fps().unwrap_or(0.0),
            opencl_active: self.compositor.opencl_active(),
        }
    }

    /// Process one frame: BGR in, RGB out.
    ///
    /// `mask` and `landmarks` are optional; absent or unusable inputs skip
    /// the corresponding effects for this frame only.
    ///
    /// # Errors
    ///
    /// Returns an error only for an unusable frame (empty or not CV_8UC3);
    /// per-stage failures degrade to pass-through for that stage
    pub fn process_frame(
        &mut self,
        frame: &Mat,
        mask: Option<&Mat>,
        landmarks: Option<&[(f32, f32)]>,
    ) -> Result<Mat> {
        if frame.empty() || frame.typ() != CV_8UC3 {
            return Err(Error::InvalidInput(format!(
                "Expected non-empty CV_8UC3 frame, got type {}",
                frame.typ()
            )));
        }

        let now = Instant::now();
        let params = self.params.clamped();
        let scale = self.scale_controller.scale();

        let mut working = frame.clone();
        if let Some(landmarks) = landmarks {
            if let Err(e) = self.apply_face_effects(&mut working, frame, landmarks, &params, scale) {
                log::warn!("Face effects skipped this frame: {e}");
            }
        }

        let output = match self.compositor.composite(
            &working,
            mask,
            &params.background,
            self.background_image.as_ref(),
            scale,
        ) {
            Ok(output) => output,
            Err(e) => {
                // A frame must always come out; degrade to plain conversion
                log::warn!("Compositing failed, passing frame through: {e}");
                let mut rgb = Mat::default();
                imgproc::cvt_color(&working, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;
                rgb
            }
        };

        self.track_fps(now);
        Ok(output)
    }

    /// Run the face-scoped stages on the working frame
    fn apply_face_effects(
        &mut self,
        working: &mut Mat,
        frame: &Mat,
        landmarks: &[(f32, f32)],
        params: &EffectParameters,
        scale: f64,
    ) -> Result<()> {
        if !(params.skin.enabled || params.lips.enabled || params.teeth.enabled) {
            return Ok(());
        }

        let frame_size = frame.size()?;
        let (regions, pixels) = self.extractor.extract_with_pixels(landmarks, frame_size)?;

        if params.skin.enabled && regions.has_face() {
            let weight = skin_weight::build_weight_map(
                &regions,
                frame_size,
                params.skin.edge_feather_px,
                params.skin.texture_keep,
                Some(frame),
            )?;
            let wrinkle_map = wrinkles::detect(frame, &regions, &pixels, &params.wrinkle)?;

            let luminance = if params.wrinkle.forehead_boost > 0.0 {
                Some(bgr_to_lab_planes(frame)?.get(0)?)
            } else {
                None
            };
            let boost = expression::build_boost_map(
                &pixels,
                &regions,
                frame_size,
                &params.wrinkle,
                luminance.as_ref(),
            )?;

            smoothing::smooth(
                working,
                &regions,
                &SmootherInputs {
                    weight: &weight,
                    wrinkle: &wrinkle_map,
                    boost: &boost,
                },
                &params.skin,
                &params.wrinkle,
                scale as f32,
            )?;
        }

        if params.lips.enabled {
            mouth::tint_lips(working, &regions, &params.lips)?;
        }
        if params.teeth.enabled {
            mouth::whiten_teeth(working, &regions, &params.teeth)?;
        }
        Ok(())
    }

    fn track_fps(&mut self, now: Instant) {
        if let Some(last) = self.last_frame_at {
            let dt = now.duration_since(last).as_secs_f64();
            if dt > 0.0 {
                let instantaneous = 1.0 / dt;
                self.current_fps = if self.current_fps > 0.0 {
                    FPS_SMOOTHING * self.current_fps + (1.0 - FPS_SMOOTHING) * instantaneous
                } else {
                    instantaneous
                };
                self.scale_controller.record(self.current_fps, now);
            }
        }
        self.last_frame_at = Some(now);
    }
}
