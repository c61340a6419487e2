//! FFI bindings for the picamera C shim
//!
//! `libpicam_shim` wraps libcamera with the two stream configurations this
//! system switches between, plus the hardware H.264 encoder.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::path::Path;
use std::sync::Mutex;

use tracing::{debug, info};

use crate::{CameraConfig, CaptureDevice, CaptureMode, DeviceError, Frame, PixelFormat, StreamId};

/// C pixel format enum
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub enum CPixelFormat {
    Yuv420 = 0,
    Rgb888 = 1,
}

impl From<CPixelFormat> for PixelFormat {
    fn from(f: CPixelFormat) -> Self {
        match f {
            CPixelFormat::Yuv420 => PixelFormat::Yuv420,
            CPixelFormat::Rgb888 => PixelFormat::Rgb888,
        }
    }
}

/// C capture mode enum
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub enum CCaptureMode {
    LowRes = 0,
    FullRes = 1,
}

impl From<CaptureMode> for CCaptureMode {
    fn from(mode: CaptureMode) -> Self {
        match mode {
            CaptureMode::LowRes => CCaptureMode::LowRes,
            CaptureMode::FullRes => CCaptureMode::FullRes,
        }
    }
}

/// C stream selector
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub enum CStreamId {
    Lores = 0,
    Main = 1,
}

impl From<StreamId> for CStreamId {
    fn from(stream: StreamId) -> Self {
        match stream {
            StreamId::Lores => CStreamId::Lores,
            StreamId::Main => CStreamId::Main,
        }
    }
}

/// C video frame structure (matches picam_shim.h)
#[repr(C)]
pub struct CVideoFrame {
    pub data: *mut u8,
    pub size: usize,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub format: CPixelFormat,
    pub timestamp_ns: u64,
    pub sequence: u32,
}

/// C camera configuration
#[repr(C)]
pub struct CCameraConfig {
    pub lores_width: u32,
    pub lores_height: u32,
    pub main_width: u32,
    pub main_height: u32,
    pub low_res_fps: u32,
    pub full_res_fps: u32,
    pub vflip: i32,
    pub awb_mode: i32,
    pub h264_bitrate: u32,
}

#[link(name = "picam_shim")]
extern "C" {
    fn picam_init(config: *const CCameraConfig) -> i32;
    fn picam_configure(mode: CCaptureMode) -> i32;
    fn picam_start() -> i32;
    fn picam_shutdown();
    fn picam_read_frame(stream: CStreamId, timeout_ms: i32) -> *mut CVideoFrame;
    fn picam_release_frame(frame: *mut CVideoFrame);
    fn picam_start_recording(path: *const c_char) -> i32;
    fn picam_stop_recording() -> i32;
    fn picam_last_error() -> *const c_char;
}

fn last_error() -> String {
    let ptr = unsafe { picam_last_error() };
    if ptr.is_null() {
        return "unknown error".to_string();
    }
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

/// Captured frame with RAII cleanup
struct CapturedFrame {
    ptr: *mut CVideoFrame,
}

impl CapturedFrame {
    /// Copy the shim buffer into an owned, tightly packed frame
    fn to_frame(&self) -> Frame {
        let raw = unsafe { &*self.ptr };
        let format = PixelFormat::from(raw.format);
        let src = unsafe { std::slice::from_raw_parts(raw.data, raw.size) };

        let row_bytes = match format {
            PixelFormat::Yuv420 => raw.width as usize,
            PixelFormat::Rgb888 => raw.width as usize * 3,
        };
        let stride = raw.stride as usize;

        let data = if stride == row_bytes || stride == 0 {
            src.to_vec()
        } else {
            // Drop row padding; YUV420 planes are all strided by the luma stride
            src.chunks(stride)
                .flat_map(|row| row[..row_bytes.min(row.len())].iter().copied())
                .collect()
        };

        Frame::new(data, raw.width, raw.height, format, raw.timestamp_ns, raw.sequence)
    }
}

impl Drop for CapturedFrame {
    fn drop(&mut self) {
        unsafe { picam_release_frame(self.ptr) };
    }
}

/// Raspberry Pi camera driven through `libpicam_shim`
pub struct PiCamera {
    timeout_ms: i32,
    /// Serializes control calls into the shim
    control: Mutex<()>,
}

impl PiCamera {
    /// Initialize the camera with both stream profiles
    pub fn open(config: &CameraConfig) -> Result<Self, DeviceError> {
        let c_config = CCameraConfig {
            lores_width: config.lores.width,
            lores_height: config.lores.height,
            main_width: config.main.width,
            main_height: config.main.height,
            low_res_fps: config.low_res_fps,
            full_res_fps: config.full_res_fps,
            vflip: if config.vflip { 1 } else { 0 },
            awb_mode: config.awb_mode,
            h264_bitrate: config.h264_bitrate,
        };

        let ret = unsafe { picam_init(&c_config) };
        if ret != 0 {
            return Err(DeviceError::Open(format!("Init failed ({}): {}", ret, last_error())));
        }
        info!("Pi camera initialized");

        Ok(Self {
            timeout_ms: config.capture_timeout_ms.min(i32::MAX as u64) as i32,
            control: Mutex::new(()),
        })
    }

    fn control<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = self.control.lock().unwrap_or_else(|e| e.into_inner());
        f()
    }
}

impl CaptureDevice for PiCamera {
    fn configure(&self, mode: CaptureMode) -> Result<(), DeviceError> {
        let ret = self.control(|| unsafe { picam_configure(mode.into()) });
        if ret != 0 {
            return Err(DeviceError::Configure {
                mode,
                reason: last_error(),
            });
        }
        debug!("Pi camera configured for {}", mode);
        Ok(())
    }

    fn start(&self) -> Result<(), DeviceError> {
        let ret = self.control(|| unsafe { picam_start() });
        if ret != 0 {
            return Err(DeviceError::Start(last_error()));
        }
        Ok(())
    }

    fn capture_frame(&self, stream: StreamId) -> Result<Frame, DeviceError> {
        let ptr = unsafe { picam_read_frame(stream.into(), self.timeout_ms) };
        if ptr.is_null() {
            let reason = last_error();
            return Err(if reason.contains("timeout") {
                DeviceError::Timeout
            } else {
                DeviceError::Capture(format!("{}: {}", stream, reason))
            });
        }
        Ok(CapturedFrame { ptr }.to_frame())
    }

    fn start_recording(&self, path: &Path) -> Result<(), DeviceError> {
        let c_path = CString::new(path.to_string_lossy().as_bytes())
            .map_err(|e| DeviceError::Recording(e.to_string()))?;
        let ret = self.control(|| unsafe { picam_start_recording(c_path.as_ptr()) });
        if ret != 0 {
            return Err(DeviceError::Recording(last_error()));
        }
        Ok(())
    }

    fn stop_recording(&self) -> Result<(), DeviceError> {
        let ret = self.control(|| unsafe { picam_stop_recording() });
        if ret != 0 {
            return Err(DeviceError::Recording(last_error()));
        }
        Ok(())
    }
}

impl Drop for PiCamera {
    fn drop(&mut self) {
        unsafe { picam_shutdown() };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_mappings() {
        assert!(matches!(CCaptureMode::from(CaptureMode::FullRes), CCaptureMode::FullRes));
        assert!(matches!(CStreamId::from(StreamId::Lores), CStreamId::Lores));
        assert_eq!(PixelFormat::from(CPixelFormat::Yuv420), PixelFormat::Yuv420);
    }
}
