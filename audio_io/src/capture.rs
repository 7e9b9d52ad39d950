//! Microphone capture through cpal.
//!
//! The cpal stream lives on its own thread (streams are not `Send` on every
//! host); captured frames are downmixed to mono and pushed into a
//! [`SampleWindow`].

use crate::{SampleTap, SampleWindow};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BuildStreamError, DefaultStreamConfigError, PlayStreamError, SampleFormat};
use log::{debug, error, info, warn};
use room_core::Error;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Running capture; dropping it stops the stream.
pub struct MicrophoneCapture {
    window: SampleWindow,
    stop_tx: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
    device_name: String,
}

impl MicrophoneCapture {
    /// Open `device_name` (or the default input) and start capturing into a
    /// window of `window_size` samples.
    pub fn start(device_name: Option<&str>, window_size: usize) -> Result<Self, Error> {
        let window = SampleWindow::new(window_size);
        let writer = window.clone();
        let wanted = device_name.map(str::to_string);
        let (ready_tx, ready_rx) = mpsc::channel::<Result<String, Error>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let thread = std::thread::Builder::new()
            .name("mic-capture".to_string())
            .spawn(move || {
                let stream = match open_stream(wanted.as_deref(), writer) {
                    Ok((stream, name)) => {
                        let _ = ready_tx.send(Ok(name));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                // Park until asked to stop or the handle is dropped
                let _ = stop_rx.recv();
                drop(stream);
                debug!("Capture thread exiting");
            })?;

        let device_name = ready_rx
            .recv()
            .map_err(|_| Error::Microphone("capture thread exited during setup".to_string()))??;
        info!("Capturing microphone from {}", device_name);

        Ok(Self {
            window,
            stop_tx: Some(stop_tx),
            thread: Some(thread),
            device_name,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Tap onto the captured signal.
    pub fn tap(&self) -> Arc<dyn SampleTap> {
        Arc::new(self.window.clone())
    }

    pub fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Capture thread panicked");
            }
        }
    }
}

impl Drop for MicrophoneCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

fn open_stream(
    wanted: Option<&str>,
    window: SampleWindow,
) -> Result<(cpal::Stream, String), Error> {
    let host = cpal::default_host();
    let device = match wanted {
        Some(name) => host
            .input_devices()
            .map_err(|e| classify_backend(&e.to_string()))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| Error::MicrophoneNotFound(format!("no input device named {}", name)))?,
        None => host
            .default_input_device()
            .ok_or_else(|| Error::MicrophoneNotFound("no default input device".to_string()))?,
    };
    let name = device.name().unwrap_or_else(|_| "unknown".to_string());

    let supported = device.default_input_config().map_err(|e| match e {
        DefaultStreamConfigError::DeviceNotAvailable => {
            Error::MicrophoneNotFound("input device not available".to_string())
        }
        DefaultStreamConfigError::BackendSpecific { err } => classify_backend(&err.description),
        other => Error::Microphone(other.to_string()),
    })?;
    let channels = supported.channels().max(1) as usize;
    let format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();
    debug!(
        "Input config for {}: {} Hz, {} channels, {:?}",
        name, config.sample_rate.0, channels, format
    );

    let on_error = |e: cpal::StreamError| warn!("Microphone stream error: {}", e);
    let stream = match format {
        SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                push_mono(&window, data, channels, |s| s)
            },
            on_error,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                push_mono(&window, data, channels, |s| s as f32 / i16::MAX as f32)
            },
            on_error,
            None,
        ),
        SampleFormat::U16 => device.build_input_stream(
            &config,
            move |data: &[u16], _: &cpal::InputCallbackInfo| {
                push_mono(&window, data, channels, |s| {
                    (s as f32 - 32768.0) / 32768.0
                })
            },
            on_error,
            None,
        ),
        other => {
            return Err(Error::Microphone(format!(
                "unsupported sample format {:?}",
                other
            )))
        }
    }
    .map_err(classify_build_error)?;

    stream.play().map_err(|e| match e {
        PlayStreamError::DeviceNotAvailable => {
            Error::MicrophoneNotFound("input device disappeared".to_string())
        }
        PlayStreamError::BackendSpecific { err } => classify_backend(&err.description),
    })?;

    Ok((stream, name))
}

fn push_mono<T: Copy>(
    window: &SampleWindow,
    data: &[T],
    channels: usize,
    convert: impl Fn(T) -> f32,
) {
    let mono: Vec<f32> = data
        .chunks(channels)
        .map(|frame| frame.iter().map(|&s| convert(s)).sum::<f32>() / frame.len() as f32)
        .collect();
    window.push(&mono);
}

fn classify_build_error(e: BuildStreamError) -> Error {
    match e {
        BuildStreamError::DeviceNotAvailable => {
            Error::MicrophoneNotFound("input device not available".to_string())
        }
        BuildStreamError::BackendSpecific { err } => classify_backend(&err.description),
        other => Error::Microphone(other.to_string()),
    }
}

/// Backends report permission problems only as text.
fn classify_backend(description: &str) -> Error {
    let lower = description.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not allowed") {
        Error::MicrophonePermission(description.to_string())
    } else {
        Error::Microphone(description.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_text_is_classified() {
        assert!(matches!(
            classify_backend("Permission denied by the system"),
            Error::MicrophonePermission(_)
        ));
        assert!(matches!(classify_backend("device busy"), Error::Microphone(_)));
        assert!(matches!(
            classify_build_error(BuildStreamError::DeviceNotAvailable),
            Error::MicrophoneNotFound(_)
        ));
    }

    #[test]
    fn stereo_frames_are_averaged() {
        let window = SampleWindow::new(4);
        push_mono(&window, &[1.0f32, 0.0, 0.5, 0.5], 2, |s| s);
        let mut out = [0.0f32; 2];
        window.read_latest(&mut out);
        assert_eq!(out, [0.5, 0.5]);
    }
}
