//! Audio capture module
//!
//! Provides audio recording via cpal, which works with PipeWire, PulseAudio,
//! ALSA, CoreAudio and WASAPI backends. Capture runs on a dedicated thread
//! from start to stop; the orchestrator blocks on the stop call, never polls.

pub mod cpal_capture;
pub mod store;

use crate::config::AudioConfig;
use crate::error::{CaptureError, DeviceError};

/// Trait for audio capture implementations
#[async_trait::async_trait]
pub trait AudioCapture: Send + Sync {
    /// Open the device and start recording
    async fn start(&mut self) -> Result<(), DeviceError>;

    /// Stop recording and return all samples (f32, mono, target rate).
    /// Below-minimum-duration results are reported as `CaptureError::TooShort`
    /// so accidental taps never reach the network.
    async fn stop(&mut self) -> Result<Vec<f32>, CaptureError>;

    /// Stop recording and discard whatever was captured
    async fn abort(&mut self);
}

/// Factory for per-session capture instances (the device handle is exclusive
/// to the single active session)
pub trait CaptureFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn AudioCapture>, DeviceError>;
}

/// cpal-backed factory used by the daemon
pub struct CpalCaptureFactory {
    config: AudioConfig,
}

impl CpalCaptureFactory {
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl CaptureFactory for CpalCaptureFactory {
    fn create(&self) -> Result<Box<dyn AudioCapture>, DeviceError> {
        Ok(Box::new(cpal_capture::CpalCapture::new(&self.config)))
    }
}

/// List available audio input device names (for `quickscribe devices`)
pub fn list_input_devices() -> Result<Vec<String>, DeviceError> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| DeviceError::OpenFailed(e.to_string()))?;

    Ok(devices.filter_map(|d| d.name().ok()).collect())
}
