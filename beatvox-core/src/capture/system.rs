//! Audio capture from the default input device using cpal
//!
//! Each segment opens its own input stream, downmixes to mono, resamples to
//! the recording profile, and buffers i16 PCM until `finish`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig, SupportedStreamConfig};
use rubato::{FftFixedIn, Resampler};
use tokio::sync::mpsc;

use super::recorder::encode_wav;
use super::{
    AudioProfile, CaptureError, CaptureRequest, CaptureSegment, CaptureSource, CaptureStream,
    TrackKind, RECORDING_PROFILE,
};

/// Capture source backed by the host's default audio input
pub struct SystemCapture;

impl SystemCapture {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SystemCapture {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl CaptureSource for SystemCapture {
    async fn request(
        &self,
        request: CaptureRequest,
    ) -> Result<Box<dyn CaptureStream>, CaptureError> {
        if !request.audio {
            return Err(CaptureError::NoAudioTrack);
        }

        let host = cpal::default_host();
        // No device behaves like a refused grant: the host will not let us
        // record, and retrying without user action cannot succeed.
        let device = host
            .default_input_device()
            .ok_or(CaptureError::PermissionDenied)?;

        let supported_config = device
            .default_input_config()
            .map_err(|e| CaptureError::Device(e.to_string()))?;

        tracing::debug!(
            device_name = ?device.name(),
            native_sample_rate = supported_config.sample_rate().0,
            native_channels = supported_config.channels(),
            native_format = ?supported_config.sample_format(),
            target_sample_rate = RECORDING_PROFILE.sample_rate,
            "audio capture granted"
        );

        Ok(Box::new(SystemCaptureStream {
            device,
            supported_config,
            profile: RECORDING_PROFILE,
            audio_active: true,
        }))
    }
}

pub struct SystemCaptureStream {
    device: Device,
    supported_config: SupportedStreamConfig,
    profile: AudioProfile,
    audio_active: bool,
}

impl CaptureStream for SystemCaptureStream {
    fn active_tracks(&self) -> usize {
        usize::from(self.audio_active)
    }

    fn stop_track(&mut self, kind: TrackKind) {
        // The host grant carries no separate video track; stopping video is
        // a no-op, stopping audio ends the grant's usefulness.
        if kind == TrackKind::Audio {
            self.audio_active = false;
        }
    }

    fn begin_segment(&mut self) -> Result<Box<dyn CaptureSegment>, CaptureError> {
        if !self.audio_active {
            return Err(CaptureError::Recorder("audio track stopped".to_string()));
        }

        let native_rate = self.supported_config.sample_rate().0;
        let native_channels = self.supported_config.channels() as usize;
        let sample_format = self.supported_config.sample_format();
        let config: StreamConfig = self.supported_config.clone().into();

        // Always resample for a consistent code path, even at equal rates.
        let resampler = SegmentResampler::new(native_rate, self.profile.sample_rate)?;

        let (tx, rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let running = Arc::new(AtomicBool::new(true));

        let stream = match sample_format {
            SampleFormat::I16 => build_input_stream::<i16>(
                &self.device,
                &config,
                tx,
                running.clone(),
                native_channels,
                resampler,
            )?,
            SampleFormat::F32 => build_input_stream::<f32>(
                &self.device,
                &config,
                tx,
                running.clone(),
                native_channels,
                resampler,
            )?,
            format => {
                return Err(CaptureError::Device(format!(
                    "unsupported sample format: {format:?}"
                )))
            }
        };

        stream
            .play()
            .map_err(|e| CaptureError::Device(e.to_string()))?;

        Ok(Box::new(SystemSegment {
            receiver: rx,
            running,
            profile: self.profile,
            stream,
        }))
    }

    fn release(&mut self) {
        self.audio_active = false;
    }
}

pub struct SystemSegment {
    receiver: mpsc::UnboundedReceiver<Vec<u8>>,
    running: Arc<AtomicBool>,
    profile: AudioProfile,
    stream: Stream,
}

#[async_trait(?Send)]
impl CaptureSegment for SystemSegment {
    async fn finish(self: Box<Self>) -> Result<Vec<u8>, CaptureError> {
        let SystemSegment {
            mut receiver,
            running,
            profile,
            stream,
        } = *self;

        running.store(false, Ordering::SeqCst);
        drop(stream);

        receiver.close();
        let mut pcm = Vec::new();
        while let Some(chunk) = receiver.recv().await {
            pcm.extend_from_slice(&chunk);
        }

        encode_wav(&pcm, profile)
    }
}

fn build_input_stream<T>(
    device: &Device,
    config: &StreamConfig,
    tx: mpsc::UnboundedSender<Vec<u8>>,
    running: Arc<AtomicBool>,
    native_channels: usize,
    mut resampler: SegmentResampler,
) -> Result<Stream, CaptureError>
where
    T: SizedSample + Send + 'static,
    f32: FromSample<T>,
{
    let err_running = running.clone();

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                if !running.load(Ordering::SeqCst) {
                    return;
                }
                let mono = mix_to_mono_f32(data, native_channels);
                let resampled = resampler.push(&mono);
                let bytes = f32_to_i16_bytes(&resampled);
                if !bytes.is_empty() && tx.send(bytes).is_err() {
                    running.store(false, Ordering::SeqCst);
                }
            },
            move |err| {
                tracing::error!(error = ?err, "audio input stream error");
                err_running.store(false, Ordering::SeqCst);
            },
            None,
        )
        .map_err(|e| CaptureError::Device(e.to_string()))
}

/// Resampler that buffers input until a full chunk is available
struct SegmentResampler {
    inner: FftFixedIn<f32>,
    pending: Vec<f32>,
}

impl SegmentResampler {
    fn new(native_rate: u32, target_rate: u32) -> Result<Self, CaptureError> {
        let chunk_size = 1024;
        let inner = FftFixedIn::new(native_rate as usize, target_rate as usize, chunk_size, 2, 1)
            .map_err(|e| CaptureError::Device(format!("failed to create resampler: {e:?}")))?;
        Ok(Self {
            inner,
            pending: Vec::with_capacity(chunk_size * 2),
        })
    }

    fn push(&mut self, mono: &[f32]) -> Vec<f32> {
        self.pending.extend_from_slice(mono);

        let mut output = Vec::new();
        loop {
            let frames_needed = self.inner.input_frames_next();
            if self.pending.len() < frames_needed {
                break;
            }

            let input = vec![self.pending[..frames_needed].to_vec()];
            match self.inner.process(&input, None) {
                Ok(resampled) => {
                    if let Some(chunk) = resampled.into_iter().next() {
                        output.extend(chunk);
                    }
                }
                Err(e) => {
                    tracing::warn!(error = ?e, "resampling failed");
                    break;
                }
            }

            self.pending.drain(..frames_needed);
        }

        output
    }
}

/// Convert interleaved samples of any format to mono f32
fn mix_to_mono_f32<T>(samples: &[T], channels: usize) -> Vec<f32>
where
    T: Copy,
    f32: FromSample<T>,
{
    if channels == 1 {
        return samples.iter().map(|&s| f32::from_sample(s)).collect();
    }
    samples
        .chunks(channels)
        .map(|frame| {
            let sum: f32 = frame.iter().map(|&s| f32::from_sample(s)).sum();
            sum / channels as f32
        })
        .collect()
}

/// Convert f32 samples to i16 little-endian bytes
fn f32_to_i16_bytes(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        let value = (clamped * 32767.0) as i16;
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixes_stereo_to_mono() {
        let samples: Vec<f32> = vec![1.0, 0.0, 0.5, 0.5];
        let mono = mix_to_mono_f32(&samples, 2);
        assert_eq!(mono, vec![0.5, 0.5]);
    }

    #[test]
    fn converts_f32_to_i16_bytes_with_clamping() {
        let bytes = f32_to_i16_bytes(&[0.0, 1.0, -2.0]);
        assert_eq!(bytes.len(), 6);
        assert_eq!(i16::from_le_bytes([bytes[2], bytes[3]]), 32767);
        assert_eq!(i16::from_le_bytes([bytes[4], bytes[5]]), -32767);
    }

    #[test]
    fn resampler_halves_rate() {
        let mut resampler = SegmentResampler::new(32_000, 16_000).unwrap();
        let input = vec![0.25f32; 4096];
        let output = resampler.push(&input);
        // FFT resamplers carry internal latency; expect roughly half the
        // frames once the pipeline is primed.
        assert!(!output.is_empty());
        assert!(output.len() < input.len());
    }
}
