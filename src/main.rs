//! Offline harness: apply the retouch pipeline to a single frame on disk.
//!
//! Stands in for the live capture/model collaborators during development:
//! frame and mask come from image files, landmarks from a YAML list.

use clap::Parser;
use face_retouch::config::EffectParameters;
use face_retouch::pipeline::RetouchPipeline;
use face_retouch::{Error, Result};
use log::info;
use opencv::core::Mat;
use opencv::imgcodecs;
use opencv::imgproc;
use opencv::prelude::*;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input frame image
    #[arg(short, long)]
    input: String,

    /// Output image path
    #[arg(short, long, default_value = "out.png")]
    output: String,

    /// Segmentation mask image (grayscale)
    #[arg(short, long)]
    mask: Option<String>,

    /// Normalized landmarks as a YAML list of [x, y] pairs
    #[arg(short, long)]
    landmarks: Option<String>,

    /// Background replacement image
    #[arg(short, long)]
    background: Option<String>,

    /// Effect parameters (YAML)
    #[arg(short = 'C', long)]
    config: Option<String>,

    /// Assumed camera frame rate
    #[arg(long, default_value = "30.0")]
    fps: f64,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    let params = match &args.config {
        Some(path) => {
            info!("Loading effect parameters from {path}");
            EffectParameters::from_file(path)?
        }
        None => EffectParameters::default(),
    };

    let frame = imgcodecs::imread(&args.input, imgcodecs::IMREAD_COLOR)?;
    if frame.empty() {
        return Err(Error::InvalidInput(format!("Cannot read frame: {}", args.input)));
    }

    let mask = match &args.mask {
        Some(path) => {
            let m = imgcodecs::imread(path, imgcodecs::IMREAD_UNCHANGED)?;
            if m.empty() {
                return Err(Error::InvalidInput(format!("Cannot read mask: {path}")));
            }
            Some(m)
        }
        None => None,
    };

    let landmarks = match &args.landmarks {
        Some(path) => Some(load_landmarks(path)?),
        None => None,
    };

    let mut pipeline = RetouchPipeline::new(params, args.fps);

    if let Some(path) = &args.background {
        let image = imgcodecs::imread(path, imgcodecs::IMREAD_COLOR)?;
        if image.empty() {
            return Err(Error::InvalidInput(format!("Cannot read background: {path}")));
        }
        pipeline.set_background_image(Some(image));
    }

    let rgb = pipeline.process_frame(&frame, mask.as_ref(), landmarks.as_deref())?;

    // imwrite expects BGR channel order
    let mut bgr = Mat::default();
    imgproc::cvt_color(&rgb, &mut bgr, imgproc::COLOR_RGB2BGR, 0)?;
    let written = imgcodecs::imwrite(&args.output, &bgr, &opencv::core::Vector::new())?;
    if !written {
        return Err(Error::InvalidInput(format!("Cannot write output: {}", args.output)));
    }

    let status = pipeline.status();
    info!("Wrote {} (scale {:.2}, OpenCL: {})", args.output, status.scale, status.opencl_active);
    Ok(())
}

fn load_landmarks(path: &str) -> Result<Vec<(f32, f32)>> {
    let content = std::fs::read_to_string(path)?;
    let pairs: Vec<[f32; 2]> = serde_yaml::from_str(&content)
        .map_err(|e| Error::InvalidInput(format!("Cannot parse landmarks {path}: {e}")))?;
    Ok(pairs.into_iter().map(|[x, y]| (x, y)).collect())
}
