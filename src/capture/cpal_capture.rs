//! cpal-based audio capture
//!
//! cpal::Stream is not Send, so the stream lives on a dedicated thread and
//! the handle talks to it over channels. The stop path returns the collected
//! samples through a oneshot; the start path waits for a readiness signal so
//! device-open failures surface synchronously as DeviceError.

use super::AudioCapture;
use crate::config::AudioConfig;
use crate::error::{CaptureError, DeviceError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;

/// Commands sent to the audio capture thread
enum CaptureCommand {
    /// Stop and return collected samples
    Stop(oneshot::Sender<Vec<f32>>),
    /// Stop and discard
    Abort,
}

/// cpal-based audio capture implementation
pub struct CpalCapture {
    config: AudioConfig,
    cmd_tx: Option<std::sync::mpsc::Sender<CaptureCommand>>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl CpalCapture {
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            config: config.clone(),
            cmd_tx: None,
            thread_handle: None,
        }
    }
}

/// Find an audio input device by name.
///
/// Matching, in order: exact, case-insensitive exact, case-insensitive
/// substring. Lets users give either full backend names or short fragments
/// like "usb" or "analog-stereo".
fn find_audio_device(host: &cpal::Host, device_name: &str) -> Result<cpal::Device, DeviceError> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let devices: Vec<cpal::Device> = host
        .input_devices()
        .map_err(|e| DeviceError::OpenFailed(e.to_string()))?
        .collect();

    let named: Vec<(String, usize)> = devices
        .iter()
        .enumerate()
        .filter_map(|(i, d)| d.name().ok().map(|n| (n, i)))
        .collect();

    let search_lower = device_name.to_lowercase();

    let found = named
        .iter()
        .find(|(name, _)| name == device_name)
        .or_else(|| {
            named
                .iter()
                .find(|(name, _)| name.to_lowercase() == search_lower)
        })
        .or_else(|| {
            named
                .iter()
                .find(|(name, _)| name.to_lowercase().contains(&search_lower))
        });

    match found {
        Some((name, index)) => {
            tracing::debug!("Matched audio device '{}' for '{}'", name, device_name);
            devices
                .into_iter()
                .nth(*index)
                .ok_or_else(|| DeviceError::NotFound(device_name.to_string()))
        }
        None => Err(DeviceError::NotFound(device_name.to_string())),
    }
}

#[async_trait::async_trait]
impl AudioCapture for CpalCapture {
    async fn start(&mut self) -> Result<(), DeviceError> {
        use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

        let host = cpal::default_host();

        let device = if self.config.device == "default" {
            host.default_input_device()
                .ok_or_else(|| DeviceError::NotFound("default".to_string()))?
        } else {
            find_audio_device(&host, &self.config.device)?
        };

        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
        tracing::info!("Using audio device: {}", device_name);

        let supported_config = device
            .default_input_config()
            .map_err(|e| DeviceError::OpenFailed(e.to_string()))?;

        let source_rate = supported_config.sample_rate().0;
        let source_channels = supported_config.channels() as usize;
        let target_rate = self.config.sample_rate;
        let sample_format = supported_config.sample_format();

        tracing::debug!(
            "Device config: {} Hz, {} channel(s), format: {:?}",
            source_rate,
            source_channels,
            sample_format
        );

        let (cmd_tx, cmd_rx) = std::sync::mpsc::channel::<CaptureCommand>();
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), DeviceError>>();

        let samples = Arc::new(Mutex::new(Vec::<f32>::new()));
        let samples_clone = samples.clone();

        let thread_handle = thread::spawn(move || {
            let stream_config = cpal::StreamConfig {
                channels: supported_config.channels(),
                sample_rate: supported_config.sample_rate(),
                buffer_size: cpal::BufferSize::Default,
            };

            let err_fn = |err| tracing::error!("Audio stream error: {}", err);

            let sink = SampleSink {
                samples: samples_clone.clone(),
                source_rate,
                target_rate,
                source_channels,
            };

            let stream_result = match sample_format {
                cpal::SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, sink, err_fn),
                cpal::SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, sink, err_fn),
                cpal::SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, sink, err_fn),
                format => Err(DeviceError::OpenFailed(format!(
                    "Unsupported sample format: {:?}",
                    format
                ))),
            };

            let stream = match stream_result {
                Ok(s) => s,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(DeviceError::Stream(e.to_string())));
                return;
            }

            let _ = ready_tx.send(Ok(()));
            tracing::debug!("Audio capture thread started");

            match cmd_rx.recv() {
                Ok(CaptureCommand::Stop(response_tx)) => {
                    drop(stream);
                    let collected = samples_clone
                        .lock()
                        .map(|guard| guard.clone())
                        .unwrap_or_default();
                    let _ = response_tx.send(collected);
                }
                Ok(CaptureCommand::Abort) | Err(_) => {
                    drop(stream);
                }
            }

            tracing::debug!("Audio capture thread stopped");
        });

        // Wait for the stream to come up (or fail) before reporting success
        match ready_rx.await {
            Ok(Ok(())) => {
                self.cmd_tx = Some(cmd_tx);
                self.thread_handle = Some(thread_handle);
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = thread_handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread_handle.join();
                Err(DeviceError::OpenFailed(
                    "capture thread exited before signalling readiness".to_string(),
                ))
            }
        }
    }

    async fn stop(&mut self) -> Result<Vec<f32>, CaptureError> {
        let samples = if let Some(cmd_tx) = self.cmd_tx.take() {
            let (response_tx, response_rx) = oneshot::channel();

            if cmd_tx.send(CaptureCommand::Stop(response_tx)).is_ok() {
                match tokio::time::timeout(Duration::from_secs(2), response_rx).await {
                    Ok(Ok(samples)) => samples,
                    Ok(Err(_)) => {
                        return Err(CaptureError::Stopped("channel closed".to_string()));
                    }
                    Err(_) => {
                        return Err(CaptureError::Stopped("timed out after 2s".to_string()));
                    }
                }
            } else {
                Vec::new()
            }
        } else {
            Vec::new()
        };

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }

        if samples.is_empty() {
            return Err(CaptureError::Empty);
        }

        let got_ms = samples.len() as u64 * 1000 / self.config.sample_rate as u64;
        tracing::debug!(
            "Audio capture stopped: {} samples ({}ms)",
            samples.len(),
            got_ms
        );

        if got_ms < self.config.min_duration_ms {
            return Err(CaptureError::TooShort {
                got_ms,
                min_ms: self.config.min_duration_ms,
            });
        }

        Ok(samples)
    }

    async fn abort(&mut self) {
        if let Some(cmd_tx) = self.cmd_tx.take() {
            let _ = cmd_tx.send(CaptureCommand::Abort);
        }
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
        tracing::debug!("Audio capture aborted, samples discarded");
    }
}

/// Destination for converted samples in the input callback
struct SampleSink {
    samples: Arc<Mutex<Vec<f32>>>,
    source_rate: u32,
    target_rate: u32,
    source_channels: usize,
}

/// Build an input stream for a specific sample type
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sink: SampleSink,
    err_fn: impl Fn(cpal::StreamError) + Send + 'static,
) -> Result<cpal::Stream, DeviceError>
where
    T: cpal::Sample + cpal::SizedSample + Send + 'static,
    f32: cpal::FromSample<T>,
{
    use cpal::traits::DeviceTrait;

    let SampleSink {
        samples,
        source_rate,
        target_rate,
        source_channels,
    } = sink;

    let stream = device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                // Convert to f32 and mix down to mono
                let mono_f32: Vec<f32> = data
                    .chunks(source_channels)
                    .map(|frame| {
                        let sum: f32 = frame
                            .iter()
                            .map(|&s| <f32 as cpal::FromSample<T>>::from_sample_(s))
                            .sum();
                        sum / source_channels as f32
                    })
                    .collect();

                let resampled = if source_rate != target_rate {
                    resample(&mono_f32, source_rate, target_rate)
                } else {
                    mono_f32
                };

                if let Ok(mut guard) = samples.lock() {
                    guard.extend_from_slice(&resampled);
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| DeviceError::Stream(e.to_string()))?;

    Ok(stream)
}

/// Linear interpolation resampling
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let new_len = (samples.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(new_len);

    for i in 0..new_len {
        let src_idx = i as f64 / ratio;
        let idx = src_idx.floor() as usize;
        let frac = (src_idx - idx as f64) as f32;

        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else {
            samples.get(idx).copied().unwrap_or(0.0)
        };

        output.push(sample);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resample_same_rate() {
        let samples = vec![1.0, 2.0, 3.0, 4.0];
        let result = resample(&samples, 16000, 16000);
        assert_eq!(result, samples);
    }

    #[test]
    fn test_resample_downsample() {
        let samples = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let result = resample(&samples, 48000, 16000);
        // 3:1 ratio, so 8 samples -> ~3 samples
        assert!(result.len() >= 2 && result.len() <= 4);
    }

    #[test]
    fn test_resample_upsample() {
        let samples = vec![1.0, 2.0];
        let result = resample(&samples, 8000, 16000);
        assert_eq!(result.len(), 4);
    }

    #[test]
    fn test_resample_empty() {
        let samples: Vec<f32> = vec![];
        let result = resample(&samples, 48000, 16000);
        assert!(result.is_empty());
    }
}
