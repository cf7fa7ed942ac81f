//! Effect configuration: grouped parameters for every pipeline stage.
//!
//! All numeric fields are clamped to their documented ranges rather than
//! rejected, so a stale or hand-edited profile can never stall the video
//! pipeline.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Background replacement mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundMode {
    /// Pass the frame through untouched
    #[default]
    None,
    /// Blur the background region
    Blur,
    /// Replace the background with an image
    Image,
    /// Replace the background with a solid color
    Solid,
}

impl BackgroundMode {
    /// Map the wire-level option index (0 none / 1 blur / 2 image / 3 solid).
    /// Unknown indices fall back to `None`.
    #[must_use]
    pub fn from_index(index: u8) -> Self {
        match index {
            1 => Self::Blur,
            2 => Self::Image,
            3 => Self::Solid,
            _ => Self::None,
        }
    }
}

/// Background compositing parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundParams {
    /// Replacement mode
    pub mode: BackgroundMode,

    /// Gaussian kernel size for blur mode (forced odd, >= 1)
    pub blur_strength: i32,

    /// Edge feather in pixels applied to the subject alpha
    pub feather_px: i32,

    /// Solid background color, RGB in [0, 1]
    pub solid_rgb: [f32; 3],

    /// Background image path (loaded by the host; the core receives a frame)
    pub image_path: Option<PathBuf>,
}

/// Skin smoothing parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SkinParams {
    /// Enable skin retouching
    pub enabled: bool,

    /// Smoothing strength in [0, 1]
    pub amount: f32,

    /// Base blur radius in pixels (>= 1)
    pub radius_px: f32,

    /// Texture preservation strength in [0, 1]
    pub texture_keep: f32,

    /// Edge feather of the skin weight map in pixels
    pub edge_feather_px: i32,

    /// false: single bilateral filter; true: full frequency separation
    pub advanced: bool,

    /// Reduced-resolution processing scale for the advanced path [0.4, 1.0]
    pub advanced_scale: f32,

    /// Fraction of original high-frequency detail re-injected after
    /// upsampling [0, 0.5]
    pub detail_preserve: f32,
}

/// Wrinkle attenuation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WrinkleParams {
    /// Extra attenuation applied where lines are detected
    pub gain: f32,

    /// Expression boost gains
    pub smile_boost: f32,
    pub squint_boost: f32,
    pub forehead_boost: f32,

    /// Cut detection below the mouth (stubble region)
    pub suppress_lower_face: bool,

    /// Cut position between mouth and chin [0.25, 0.65]
    pub lower_face_ratio: f32,

    /// Exclude a band around the eyes (eyeglass frames)
    pub ignore_glasses: bool,

    /// Expansion of the eyeglass exclusion box in pixels
    pub glasses_margin_px: i32,

    /// Fraction of response mass kept by the histogram threshold [0.02, 0.5]
    pub keep_ratio: f32,

    /// Custom line width search range in pixels
    pub min_width_px: i32,
    pub max_width_px: i32,

    /// Gate the response by skin-color classification
    pub skin_gate: bool,

    /// Response amplification (> 1 amplifies)
    pub mask_gain: f32,

    /// Minimum attenuation inside the face even without detections
    pub baseline_boost: f32,

    /// Cap on negative-detail attenuation [0.4, 1.0]
    pub negative_cap: f32,

    /// Render the attenuation map instead of the retouched frame
    pub preview: bool,
}

/// Lip tint parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LipParams {
    /// Enable lip refinement
    pub enabled: bool,

    /// Blend strength in [0, 1]
    pub alpha: f32,

    /// Target tint, RGB in [0, 1]
    pub rgb: [f32; 3],

    /// Mask feather in pixels
    pub feather_px: i32,

    /// Additive lightness shift in [-1, 1]
    pub lightness: f32,

    /// Dilation of the lip band in pixels (seam unification)
    pub band_grow_px: i32,
}

/// Teeth whitening parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TeethParams {
    /// Enable teeth whitening
    pub enabled: bool,

    /// Whitening strength in [0, 1]
    pub strength: f32,

    /// Erosion of the inner-lip polygon in pixels (keeps lips untouched)
    pub margin_px: i32,
}

/// Complete per-invocation effect configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EffectParameters {
    /// Background compositing
    pub background: BackgroundParams,

    /// Skin smoothing
    pub skin: SkinParams,

    /// Wrinkle attenuation
    pub wrinkle: WrinkleParams,

    /// Lip tint
    pub lips: LipParams,

    /// Teeth whitening
    pub teeth: TeethParams,
}

impl Default for BackgroundParams {
    fn default() -> Self {
        Self {
            mode: BackgroundMode::None,
            blur_strength: 25,
            feather_px: 2,
            solid_rgb: [0.0, 0.6, 0.0],
            image_path: None,
        }
    }
}

impl Default for SkinParams {
    fn default() -> Self {
        Self {
            enabled: false,
            amount: 0.5,
            radius_px: 8.0,
            texture_keep: 0.5,
            edge_feather_px: 12,
            advanced: true,
            advanced_scale: 1.0,
            detail_preserve: 0.2,
        }
    }
}

impl Default for WrinkleParams {
    fn default() -> Self {
        Self {
            gain: 0.8,
            smile_boost: 0.5,
            squint_boost: 0.5,
            forehead_boost: 0.0,
            suppress_lower_face: true,
            lower_face_ratio: 0.45,
            ignore_glasses: false,
            glasses_margin_px: 6,
            keep_ratio: 0.12,
            min_width_px: 2,
            max_width_px: 7,
            skin_gate: true,
            mask_gain: 1.4,
            baseline_boost: 0.15,
            negative_cap: 0.85,
            preview: false,
        }
    }
}

impl Default for LipParams {
    fn default() -> Self {
        Self {
            enabled: false,
            alpha: 0.35,
            rgb: [0.75, 0.2, 0.3],
            feather_px: 3,
            lightness: 0.0,
            band_grow_px: 1,
        }
    }
}

impl Default for TeethParams {
    fn default() -> Self {
        Self {
            enabled: false,
            strength: 0.5,
            margin_px: 2,
        }
    }
}

fn clamp_rgb(rgb: [f32; 3]) -> [f32; 3] {
    [
        rgb[0].clamp(0.0, 1.0),
        rgb[1].clamp(0.0, 1.0),
        rgb[2].clamp(0.0, 1.0),
    ]
}

impl EffectParameters {
    /// Clamp every numeric field to its documented range. Called once per
    /// frame at the pipeline boundary so downstream stages can rely on the
    /// invariants without re-checking.
    #[must_use]
    pub fn clamped(&self) -> Self {
        let mut p = self.clone();

        p.background.blur_strength = crate::utils::mat_ops::odd_kernel(p.background.blur_strength);
        p.background.feather_px = p.background.feather_px.max(0);
        p.background.solid_rgb = clamp_rgb(p.background.solid_rgb);

        p.skin.amount = p.skin.amount.clamp(0.0, 1.0);
        p.skin.radius_px = p.skin.radius_px.max(1.0);
        p.skin.texture_keep = p.skin.texture_keep.clamp(0.0, 1.0);
        p.skin.edge_feather_px = p.skin.edge_feather_px.max(0);
        p.skin.advanced_scale = p.skin.advanced_scale.clamp(0.4, 1.0);
        p.skin.detail_preserve = p.skin.detail_preserve.clamp(0.0, 0.5);

        p.wrinkle.gain = p.wrinkle.gain.clamp(0.0, 4.0);
        p.wrinkle.smile_boost = p.wrinkle.smile_boost.clamp(0.0, 2.0);
        p.wrinkle.squint_boost = p.wrinkle.squint_boost.clamp(0.0, 2.0);
        p.wrinkle.forehead_boost = p.wrinkle.forehead_boost.clamp(0.0, 2.0);
        p.wrinkle.lower_face_ratio = p.wrinkle.lower_face_ratio.clamp(0.25, 0.65);
        p.wrinkle.glasses_margin_px = p.wrinkle.glasses_margin_px.max(0);
        p.wrinkle.keep_ratio = p.wrinkle.keep_ratio.clamp(0.02, 0.5);
        p.wrinkle.min_width_px = p.wrinkle.min_width_px.max(1);
        p.wrinkle.max_width_px = p.wrinkle.max_width_px.max(p.wrinkle.min_width_px);
        p.wrinkle.mask_gain = p.wrinkle.mask_gain.clamp(0.0, 4.0);
        p.wrinkle.baseline_boost = p.wrinkle.baseline_boost.clamp(0.0, 1.0);
        p.wrinkle.negative_cap = p.wrinkle.negative_cap.clamp(0.4, 1.0);

        p.lips.alpha = p.lips.alpha.clamp(0.0, 1.0);
        p.lips.rgb = clamp_rgb(p.lips.rgb);
        p.lips.feather_px = p.lips.feather_px.max(0);
        p.lips.lightness = p.lips.lightness.clamp(-1.0, 1.0);
        p.lips.band_grow_px = p.lips.band_grow_px.max(0);

        p.teeth.strength = p.teeth.strength.clamp(0.0, 1.0);
        p.teeth.margin_px = p.teeth.margin_px.max(0);

        p
    }

    /// Load parameters from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|e| Error::Config(format!("Failed to parse config: {e}")))
    }

    /// Save parameters to a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            serde_yaml::to_string(self).map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Face Retouch Configuration

background:
  mode: blur        # none, blur, image, solid
  blur_strength: 25
  feather_px: 2
  solid_rgb: [0.0, 0.6, 0.0]
  image_path: null

skin:
  enabled: true
  amount: 0.5
  radius_px: 8.0
  texture_keep: 0.5
  edge_feather_px: 12
  advanced: true
  advanced_scale: 1.0
  detail_preserve: 0.2

wrinkle:
  gain: 0.8
  smile_boost: 0.5
  squint_boost: 0.5
  forehead_boost: 0.0
  suppress_lower_face: true
  lower_face_ratio: 0.45
  ignore_glasses: false
  glasses_margin_px: 6
  keep_ratio: 0.12
  min_width_px: 2
  max_width_px: 7
  skin_gate: true
  mask_gain: 1.4
  baseline_boost: 0.15
  negative_cap: 0.85
  preview: false

lips:
  enabled: false
  alpha: 0.35
  rgb: [0.75, 0.2, 0.3]
  feather_px: 3
  lightness: 0.0
  band_grow_px: 1

teeth:
  enabled: false
  strength: 0.5
  margin_px: 2
"#;
