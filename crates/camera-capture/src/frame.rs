//! Video frame types and processing

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};

use crate::DeviceError;

/// Pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Planar YUV 4:2:0, luma plane first (w*h*3/2 bytes)
    Yuv420,
    /// Packed 8-bit RGB (w*h*3 bytes)
    Rgb888,
}

impl PixelFormat {
    /// Expected buffer size for a frame of the given dimensions
    pub fn buffer_len(&self, width: u32, height: u32) -> usize {
        let pixels = width as usize * height as usize;
        match self {
            PixelFormat::Yuv420 => pixels * 3 / 2,
            PixelFormat::Rgb888 => pixels * 3,
        }
    }
}

/// Captured video frame
#[derive(Debug, Clone)]
pub struct Frame {
    /// Raw pixel data in `format` layout
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Pixel layout of `data`
    pub format: PixelFormat,
    /// Capture timestamp (nanoseconds)
    pub timestamp_ns: u64,
    /// Frame sequence number
    pub sequence: u32,
}

impl Frame {
    /// Create a new frame from raw data
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
        timestamp_ns: u64,
        sequence: u32,
    ) -> Self {
        Self {
            data,
            width,
            height,
            format,
            timestamp_ns,
            sequence,
        }
    }

    fn check_len(&self) -> Result<(), DeviceError> {
        let expected = self.format.buffer_len(self.width, self.height);
        if self.data.len() < expected {
            return Err(DeviceError::Format(format!(
                "{:?} {}x{} frame needs {} bytes, got {}",
                self.format,
                self.width,
                self.height,
                expected,
                self.data.len()
            )));
        }
        Ok(())
    }

    /// Extract the luminance plane as a grayscale image
    pub fn luma(&self) -> Result<GrayImage, DeviceError> {
        self.check_len()?;
        let pixels = self.width as usize * self.height as usize;

        let gray = match self.format {
            // Y plane comes first in planar 4:2:0
            PixelFormat::Yuv420 => self.data[..pixels].to_vec(),
            PixelFormat::Rgb888 => self.data[..pixels * 3]
                .chunks_exact(3)
                .map(|p| {
                    // Luminance formula: 0.299*R + 0.587*G + 0.114*B
                    (p[0] as f32 * 0.299 + p[1] as f32 * 0.587 + p[2] as f32 * 0.114) as u8
                })
                .collect(),
        };

        GrayImage::from_raw(self.width, self.height, gray)
            .ok_or_else(|| DeviceError::Format("luma buffer size mismatch".into()))
    }

    /// View an RGB frame as an image buffer
    pub fn to_rgb_image(&self) -> Result<RgbImage, DeviceError> {
        if self.format != PixelFormat::Rgb888 {
            return Err(DeviceError::Format(format!(
                "expected Rgb888 frame, got {:?}",
                self.format
            )));
        }
        self.check_len()?;
        let len = self.format.buffer_len(self.width, self.height);
        RgbImage::from_raw(self.width, self.height, self.data[..len].to_vec())
            .ok_or_else(|| DeviceError::Format("rgb buffer size mismatch".into()))
    }

    /// Downscale an RGB frame and encode it as JPEG
    pub fn encode_jpeg(&self, width: u32, height: u32, quality: u8) -> Result<Vec<u8>, DeviceError> {
        let rgb = self.to_rgb_image()?;
        let scaled = if rgb.width() == width && rgb.height() == height {
            rgb
        } else {
            imageops::resize(&rgb, width, height, FilterType::Triangle)
        };

        let mut jpeg = Vec::with_capacity((width * height / 4) as usize);
        JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100))
            .encode_image(&scaled)
            .map_err(|e| DeviceError::Encode(e.to_string()))?;
        Ok(jpeg)
    }
}
