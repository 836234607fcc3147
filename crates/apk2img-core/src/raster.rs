//! Byte-stream to square grayscale raster encoding.
//!
//! Each artifact's bytes become one fixed-size single-channel image:
//! - `side = ceil(sqrt(len))`, zero bytes appended on the right to fill
//!   `side * side`
//! - the padded buffer is reinterpreted row-major as a `side x side` grid of
//!   u8 samples (lossless, no value scaling)
//! - the grid is resized to the configured output dimensions with the
//!   configured resampling filter (bilinear by default)
//!
//! Encoding is a pure function of `(data, width, height, filter)`; identical
//! inputs always produce an identical pixel grid. Persisting the result is
//! the caller's responsibility.

use std::path::Path;
use std::str::FromStr;

use image::imageops::{self, FilterType};
use image::GrayImage;

use crate::error::{PipelineError, Result};

pub const DEFAULT_WIDTH: u32 = 64;
pub const DEFAULT_HEIGHT: u32 = 64;

/// 2-D resampling filter used when scaling the square grid to the output size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResampleFilter {
    Nearest,
    #[default]
    Bilinear,
    Cubic,
    Gaussian,
    Lanczos,
}

impl ResampleFilter {
    pub fn as_filter_type(self) -> FilterType {
        match self {
            ResampleFilter::Nearest => FilterType::Nearest,
            ResampleFilter::Bilinear => FilterType::Triangle,
            ResampleFilter::Cubic => FilterType::CatmullRom,
            ResampleFilter::Gaussian => FilterType::Gaussian,
            ResampleFilter::Lanczos => FilterType::Lanczos3,
        }
    }
}

impl FromStr for ResampleFilter {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nearest" => Ok(ResampleFilter::Nearest),
            "bilinear" => Ok(ResampleFilter::Bilinear),
            "cubic" => Ok(ResampleFilter::Cubic),
            "gaussian" => Ok(ResampleFilter::Gaussian),
            "lanczos" => Ok(ResampleFilter::Lanczos),
            _ => Err(format!(
                "Unknown filter: {s}. Use 'nearest', 'bilinear', 'cubic', 'gaussian' or 'lanczos'."
            )),
        }
    }
}

/// Output dimensions and resampling filter for one encoding run.
#[derive(Debug, Clone, Copy)]
pub struct RasterConfig {
    pub width: u32,
    pub height: u32,
    pub filter: ResampleFilter,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            filter: ResampleFilter::default(),
        }
    }
}

impl RasterConfig {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            filter: ResampleFilter::default(),
        }
    }
}

/// Smallest square side whose area holds `len` bytes. Zero-length input maps
/// to a single pixel so the resize step never sees an empty grid.
fn square_side(len: usize) -> u32 {
    if len == 0 {
        return 1;
    }
    let len = len as u64;
    let mut side = (len as f64).sqrt() as u64;
    while side * side < len {
        side += 1;
    }
    while side > 1 && (side - 1) * (side - 1) >= len {
        side -= 1;
    }
    side as u32
}

/// Right-pad `data` with zero bytes to fill a `side x side` grid.
fn padded_square(data: &[u8]) -> (Vec<u8>, u32) {
    let side = square_side(data.len());
    let mut padded = data.to_vec();
    padded.resize(side as usize * side as usize, 0);
    (padded, side)
}

/// Encode a byte sequence into a `config.width x config.height` grayscale
/// image. The output shape holds for every input length, including empty.
pub fn encode(data: &[u8], config: &RasterConfig) -> Result<GrayImage> {
    if config.width == 0 || config.height == 0 {
        return Err(PipelineError::Encoding(format!(
            "target dimensions must be positive, got {}x{}",
            config.width, config.height
        )));
    }

    let (padded, side) = padded_square(data);
    let square = GrayImage::from_raw(side, side, padded).ok_or_else(|| {
        PipelineError::Encoding(format!("padded buffer does not fill a {side}x{side} grid"))
    })?;

    if side == config.width && side == config.height {
        return Ok(square);
    }
    Ok(imageops::resize(
        &square,
        config.width,
        config.height,
        config.filter.as_filter_type(),
    ))
}

/// Write an encoded raster as an 8-bit grayscale PNG.
pub fn save_png(image: &GrayImage, path: &Path) -> Result<()> {
    image.save(path)?;
    Ok(())
}
