// haven/server/src/services/images.rs

use crate::errors::{AppError, Result as AppResult};
use image::imageops::FilterType;
use image::io::Reader as ImageReader;
use image::{DynamicImage, ImageFormat, ImageOutputFormat};
use std::io::Cursor;
use tracing::{debug, instrument};

pub const MAX_SOURCE_DIMENSION: u32 = 8000;
pub const MIN_SOURCE_DIMENSION: u32 = 200;
pub const LARGE_MAX_WIDTH: u32 = 1600;
pub const THUMB_MAX_WIDTH: u32 = 400;
const JPEG_QUALITY: u8 = 82;

#[derive(Debug, Clone)]
pub struct EncodedImage {
  pub bytes: Vec<u8>,
  pub width: u32,
  pub height: u32,
}

#[derive(Debug, Clone)]
pub struct ProcessedImage {
  pub source_format: ImageFormat,
  pub large: EncodedImage,
  pub thumb: EncodedImage,
}

/// Turns an uploaded photo into a web-sized JPEG and a gallery thumbnail.
#[derive(Debug, Clone)]
pub struct ImageProcessor {
  large_max_width: u32,
  thumb_max_width: u32,
  quality: u8,
}

impl Default for ImageProcessor {
  fn default() -> Self {
    Self {
      large_max_width: LARGE_MAX_WIDTH,
      thumb_max_width: THUMB_MAX_WIDTH,
      quality: JPEG_QUALITY,
    }
  }
}

impl ImageProcessor {
  #[instrument(name = "images::process", skip(self, data), fields(input_bytes = data.len()), err(Display))]
  pub fn process(&self, data: &[u8]) -> AppResult<ProcessedImage> {
    let reader = ImageReader::new(Cursor::new(data))
      .with_guessed_format()
      .map_err(|e| AppError::Validation(format!("Unreadable image: {}", e)))?;
    let source_format = match reader.format() {
      Some(fmt @ (ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::WebP)) => fmt,
      Some(other) => return Err(AppError::Validation(format!("Unsupported image format {:?}. Use JPEG, PNG or WebP.", other))),
      None => return Err(AppError::Validation("Upload is not a recognised image.".to_string())),
    };

    // Dimensions come from the header, before any pixels are decoded.
    let (width, height) = ImageReader::with_format(Cursor::new(data), source_format)
      .into_dimensions()
      .map_err(|e| AppError::Validation(format!("Unreadable image: {}", e)))?;
    check_dimensions(width, height)?;

    let img = image::load_from_memory_with_format(data, source_format)
      .map_err(|e| AppError::Validation(format!("Image could not be decoded: {}", e)))?;

    let large = self.encode_scaled(&img, self.large_max_width)?;
    let thumb = self.encode_scaled(&img, self.thumb_max_width)?;
    debug!(width, height, large_bytes = large.bytes.len(), thumb_bytes = thumb.bytes.len(), "Image processed.");

    Ok(ProcessedImage { source_format, large, thumb })
  }

  fn encode_scaled(&self, img: &DynamicImage, max_width: u32) -> AppResult<EncodedImage> {
    let scaled = if img.width() > max_width {
      img.resize(max_width, img.height(), FilterType::Lanczos3)
    } else {
      img.clone()
    };
    let rgb = DynamicImage::ImageRgb8(scaled.to_rgb8());

    let mut bytes = Vec::new();
    rgb
      .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Jpeg(self.quality))
      .map_err(|e| AppError::Image(format!("JPEG encoding failed: {}", e)))?;

    Ok(EncodedImage {
      bytes,
      width: rgb.width(),
      height: rgb.height(),
    })
  }
}

fn check_dimensions(width: u32, height: u32) -> AppResult<()> {
  if width > MAX_SOURCE_DIMENSION || height > MAX_SOURCE_DIMENSION {
    return Err(AppError::Validation(format!(
      "Image is {}x{}; the maximum is {}x{}.",
      width, height, MAX_SOURCE_DIMENSION, MAX_SOURCE_DIMENSION
    )));
  }
  if width < MIN_SOURCE_DIMENSION || height < MIN_SOURCE_DIMENSION {
    return Err(AppError::Validation(format!(
      "Image is {}x{}; the minimum is {}x{}.",
      width, height, MIN_SOURCE_DIMENSION, MIN_SOURCE_DIMENSION
    )));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{ImageBuffer, Rgba};

  fn png(width: u32, height: u32) -> Vec<u8> {
    let buffer = ImageBuffer::from_pixel(width, height, Rgba([40u8, 120, 200, 255]));
    let mut out = Vec::new();
    DynamicImage::ImageRgba8(buffer)
      .write_to(&mut Cursor::new(&mut out), ImageOutputFormat::Png)
      .unwrap();
    out
  }

  #[test]
  fn wide_images_are_scaled_down() {
    let processed = ImageProcessor::default().process(&png(2000, 500)).unwrap();
    assert_eq!(processed.source_format, ImageFormat::Png);
    assert_eq!((processed.large.width, processed.large.height), (1600, 400));
    assert_eq!((processed.thumb.width, processed.thumb.height), (400, 100));
    assert_eq!(image::guess_format(&processed.large.bytes).unwrap(), ImageFormat::Jpeg);
  }

  #[test]
  fn small_images_keep_their_size() {
    let processed = ImageProcessor::default().process(&png(300, 240)).unwrap();
    assert_eq!((processed.large.width, processed.large.height), (300, 240));
    assert_eq!((processed.thumb.width, processed.thumb.height), (300, 240));
  }

  #[test]
  fn tiny_images_are_rejected() {
    let err = ImageProcessor::default().process(&png(120, 400)).unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
  }

  #[test]
  fn dimension_limits() {
    assert!(check_dimensions(8000, 8000).is_ok());
    assert!(check_dimensions(8001, 300).is_err());
    assert!(check_dimensions(200, 199).is_err());
  }

  #[test]
  fn non_images_are_rejected() {
    assert!(matches!(ImageProcessor::default().process(b"plain text"), Err(AppError::Validation(_))));
  }
}
