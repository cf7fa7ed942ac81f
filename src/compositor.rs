//! Background compositing: mask decode, alpha feathering, and subject
//! blending against blur / image / solid-color backgrounds.
//!
//! The sticky RGBA channel choice and the resized background caches are
//! instance state, owned here rather than hidden in globals, so parallel
//! pipelines never interfere.

use crate::config::{BackgroundMode, BackgroundParams};
use crate::utils::mat_ops::{feather_mask, gaussian_blur, odd_kernel, resize_to, to_f32};
use crate::utils::safe_cast::round_to_i32;
use crate::{Error, Result};
use opencv::core::{self, Mat, Scalar, Size, UMat, Vec3b, Vec3f, CV_32F, CV_8U, CV_8UC3};
use opencv::imgproc;
use opencv::prelude::*;

/// Non-alpha channels get priority when scoring an RGBA mask
const NON_ALPHA_BIAS: f64 = 10.0;

struct ImageCacheEntry {
    source_data: usize,
    source_size: Size,
    target_size: Size,
    resized: Mat,
}

struct SolidCacheEntry {
    rgb_bits: [u32; 3],
    size: Size,
    buffer: Mat,
}

/// Composites the subject against the configured background and converts the
/// result to RGB for display.
pub struct BackgroundCompositor {
    sticky_channel: Option<i32>,
    warned_format: bool,
    image_cache: Option<ImageCacheEntry>,
    solid_cache: Option<SolidCacheEntry>,
    use_opencl: bool,
}

impl BackgroundCompositor {
    /// Create a compositor, probing once for OpenCL support
    #[must_use]
    pub fn new() -> Self {
        let use_opencl = core::have_opencl().unwrap_or(false);
        if use_opencl {
            log::info!("OpenCL available, compositing on device buffers");
        } else {
            log::info!("OpenCL unavailable, compositing on host");
        }
        Self {
            sticky_channel: None,
            warned_format: false,
            image_cache: None,
            solid_cache: None,
            use_opencl,
        }
    }

    /// Whether the device-buffer path is in use
    #[must_use]
    pub fn opencl_active(&self) -> bool {
        self.use_opencl
    }

    /// Composite one frame. `mask` may be absent (passthrough), `scale` is
    /// the shared processing scale in [0.4, 1.0]. Output is always RGB.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is unusable or an image operation fails
    pub fn composite(
        &mut self,
        frame: &Mat,
        mask: Option<&Mat>,
        params: &BackgroundParams,
        background_image: Option<&Mat>,
        scale: f64,
    ) -> Result<Mat> {
        if frame.empty() || frame.typ() != CV_8UC3 {
            return Err(Error::InvalidInput(format!(
                "Expected non-empty CV_8UC3 frame, got type {}",
                frame.typ()
            )));
        }

        let usable_mask = mask.filter(|m| m.rows() > 0 && m.cols() > 0);
        let (Some(mask), false) = (usable_mask, params.mode == BackgroundMode::None) else {
            return bgr_to_rgb(frame);
        };

        let scale = scale.clamp(0.4, 1.0);
        let frame_size = frame.size()?;
        let mask8 = self.decode_mask(mask)?;
        let alpha = subject_alpha(&mask8, frame_size, params.feather_px, scale)?;

        let background = match params.mode {
            BackgroundMode::None => unreachable!("handled above"),
            BackgroundMode::Blur => self.blurred_background(frame, &alpha, params.blur_strength, scale)?,
            BackgroundMode::Image => match background_image {
                Some(image) if !image.empty() => self.resized_image(image, frame_size)?,
                _ => {
                    // No image supplied: nothing sensible to composite
                    return bgr_to_rgb(frame);
                }
            },
            BackgroundMode::Solid => self.solid_buffer(params.solid_rgb, frame_size)?,
        };

        let blended = blend(frame, &alpha, &background)?;
        bgr_to_rgb(&blended)
    }

    /// Reduce an incoming mask to a single 8-bit channel.
    ///
    /// 4-channel masks use the sticky highest-mean channel (with a bias
    /// toward non-alpha channels); unrecognized layouts degrade to a
    /// best-effort first-channel conversion.
    fn decode_mask(&mut self, mask: &Mat) -> Result<Mat> {
        let channels = mask.channels();
        let depth = mask.depth();

        if channels == 1 && depth == CV_8U {
            return Ok(mask.clone());
        }
        if channels == 1 && depth == CV_32F {
            let mut out = Mat::default();
            mask.convert_to(&mut out, CV_8U, 255.0, 0.0)?;
            return Ok(out);
        }
        if channels == 4 && depth == CV_8U {
            let mut planes = core::Vector::<Mat>::new();
            core::split(mask, &mut planes)?;

            let channel = match self.sticky_channel {
                Some(c) => c,
                None => {
                    let mut best = 0;
                    let mut best_score = f64::MIN;
                    for c in 0..4 {
                        let mean = core::mean(&planes.get(c as usize)?, &core::no_array())?[0];
                        let score = mean + if c < 3 { NON_ALPHA_BIAS } else { 0.0 };
                        if score > best_score {
                            best_score = score;
                            best = c;
                        }
                    }
                    log::info!("Selected RGBA mask channel {best} (score {best_score:.1})");
                    self.sticky_channel = Some(best);
                    best
                }
            };
            return Ok(planes.get(channel as usize)?);
        }

        // Unknown layout: take the first channel and reinterpret
        if !self.warned_format {
            log::warn!("Unrecognized mask layout ({channels} channels, depth {depth}), using first channel");
            self.warned_format = true;
        }
        let mut planes = core::Vector::<Mat>::new();
        core::split(mask, &mut planes)?;
        let first = planes.get(0)?;
        let mut out = Mat::default();
        let alpha = if first.depth() == CV_32F { 255.0 } else { 1.0 };
        first.convert_to(&mut out, CV_8U, alpha, 0.0)?;
        Ok(out)
    }

    /// Mask-normalized Gaussian blur of the background region:
    /// `blur(frame * bg) / blur(bg)`, so foreground colors never bleed into
    /// the blurred edge. Computed at reduced resolution when `scale < 1`.
    fn blurred_background(&self, frame: &Mat, alpha: &Mat, blur_strength: i32, scale: f64) -> Result<Mat> {
        let frame_size = frame.size()?;
        let work_size = scaled_size(frame_size, scale);
        let at_scale = work_size != frame_size;

        let (work_frame, work_alpha) = if at_scale {
            (
                resize_to(frame, work_size, imgproc::INTER_AREA)?,
                resize_to(alpha, work_size, imgproc::INTER_LINEAR)?,
            )
        } else {
            (frame.clone(), alpha.clone())
        };

        // Background weight and weighted frame, in float
        let frame_f = to_f32(&work_frame, 1.0)?;
        let mut bg_weight = Mat::zeros(work_size.height, work_size.width, CV_32F)?.to_mat()?;
        let mut weighted = frame_f.clone();
        for row in 0..work_size.height {
            let a = work_alpha.at_row::<f32>(row)?;
            let w = bg_weight.at_row_mut::<f32>(row)?;
            let px = weighted.at_row_mut::<Vec3f>(row)?;
            for col in 0..w.len() {
                let bg = 1.0 - a[col];
                w[col] = bg;
                for ch in 0..3 {
                    px[col][ch] *= bg;
                }
            }
        }

        let kernel = odd_kernel((f64::from(blur_strength) * scale).round() as i32).max(3);
        let blurred_weighted = self.gaussian_blur_accel(&weighted, kernel)?;
        let blurred_weight = self.gaussian_blur_accel(&bg_weight, kernel)?;

        // Normalize; where the blurred weight vanishes there is no
        // background to show, keep the original pixel
        let mut background = blurred_weighted;
        for row in 0..work_size.height {
            let w = blurred_weight.at_row::<f32>(row)?;
            let original = frame_f.at_row::<Vec3f>(row)?;
            let px = background.at_row_mut::<Vec3f>(row)?;
            for col in 0..w.len() {
                if w[col] > 1e-4 {
                    for ch in 0..3 {
                        px[col][ch] /= w[col];
                    }
                } else {
                    px[col] = original[col];
                }
            }
        }

        let mut background8 = Mat::default();
        background.convert_to(&mut background8, CV_8UC3, 1.0, 0.0)?;
        if at_scale {
            background8 = resize_to(&background8, frame_size, imgproc::INTER_LINEAR)?;
        }
        Ok(background8)
    }

    /// Gaussian blur, routed through UMat device buffers when OpenCL is
    /// present. The copy back to host blocks until the device completes.
    fn gaussian_blur_accel(&self, src: &Mat, kernel: i32) -> Result<Mat> {
        if !self.use_opencl {
            return gaussian_blur(src, kernel, 0.0);
        }
        let device_src = src.get_umat(core::AccessFlag::ACCESS_READ, core::UMatUsageFlags::USAGE_DEFAULT)?;
        let mut device_dst = UMat::default();
        imgproc::gaussian_blur(
            &device_src,
            &mut device_dst,
            Size::new(kernel, kernel),
            0.0,
            0.0,
            core::BORDER_DEFAULT,
        )?;
        let mut out = Mat::default();
        device_dst.copy_to(&mut out)?;
        Ok(out)
    }

    /// Background image resized to the frame, cached by source identity and
    /// destination size
    fn resized_image(&mut self, image: &Mat, target_size: Size) -> Result<Mat> {
        let source_data = image.data() as usize;
        let source_size = image.size()?;

        if let Some(entry) = &self.image_cache {
            if entry.source_data == source_data
                && entry.source_size == source_size
                && entry.target_size == target_size
            {
                return Ok(entry.resized.clone());
            }
        }

        log::debug!(
            "Resizing background image {}x{} -> {}x{}",
            source_size.width,
            source_size.height,
            target_size.width,
            target_size.height
        );
        let mut resized = resize_to(image, target_size, imgproc::INTER_LINEAR)?;
        if resized.channels() == 4 {
            let mut bgr = Mat::default();
            imgproc::cvt_color(&resized, &mut bgr, imgproc::COLOR_BGRA2BGR, 0)?;
            resized = bgr;
        }
        self.image_cache = Some(ImageCacheEntry {
            source_data,
            source_size,
            target_size,
            resized: resized.clone(),
        });
        Ok(resized)
    }

    /// Flat color buffer, cached by color and size
    fn solid_buffer(&mut self, rgb: [f32; 3], size: Size) -> Result<Mat> {
        let rgb_bits = [rgb[0].to_bits(), rgb[1].to_bits(), rgb[2].to_bits()];
        if let Some(entry) = &self.solid_cache {
            if entry.rgb_bits == rgb_bits && entry.size == size {
                return Ok(entry.buffer.clone());
            }
        }

        let bgr = Scalar::new(
            f64::from(rgb[2]) * 255.0,
            f64::from(rgb[1]) * 255.0,
            f64::from(rgb[0]) * 255.0,
            0.0,
        );
        let buffer = Mat::new_rows_cols_with_default(size.height, size.width, CV_8UC3, bgr)?;
        self.solid_cache = Some(SolidCacheEntry {
            rgb_bits,
            size,
            buffer: buffer.clone(),
        });
        Ok(buffer)
    }
}

impl Default for BackgroundCompositor {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode + resize + feather the subject alpha, optionally at reduced
/// resolution
fn subject_alpha(mask8: &Mat, frame_size: Size, feather_px: i32, scale: f64) -> Result<Mat> {
    let work_size = scaled_size(frame_size, scale);

    let resized = if mask8.size()? == work_size {
        mask8.clone()
    } else {
        resize_to(mask8, work_size, imgproc::INTER_LINEAR)?
    };

    let feather = round_to_i32(feather_px.max(0) as f32 * scale as f32);
    let alpha = feather_mask(&resized, feather)?;

    if work_size == frame_size {
        Ok(alpha)
    } else {
        resize_to(&alpha, frame_size, imgproc::INTER_LINEAR)
    }
}

fn scaled_size(size: Size, scale: f64) -> Size {
    if scale >= 0.999 {
        return size;
    }
    Size::new(
        (f64::from(size.width) * scale).round().max(8.0) as i32,
        (f64::from(size.height) * scale).round().max(8.0) as i32,
    )
}

/// `out = frame * alpha + background * (1 - alpha)`, all BGR 8-bit
fn blend(frame: &Mat, alpha: &Mat, background: &Mat) -> Result<Mat> {
    let mut out = frame.clone();
    for row in 0..out.rows() {
        let a = alpha.at_row::<f32>(row)?;
        let bg = background.at_row::<Vec3b>(row)?;
        let px = out.at_row_mut::<Vec3b>(row)?;
        for col in 0..px.len() {
            let fg = a[col];
            if fg >= 1.0 {
                continue;
            }
            for ch in 0..3 {
                let value = fg * f32::from(px[col][ch]) + (1.0 - fg) * f32::from(bg[col][ch]);
                px[col][ch] = value.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
    Ok(out)
}

fn bgr_to_rgb(frame: &Mat) -> Result<Mat> {
    let mut rgb = Mat::default();
    imgproc::cvt_color(frame, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;
    Ok(rgb)
}
