//! Microphone capture from the host's audio input through cpal.

use crate::error::CaptureError;
use crate::media::{
    AudioConstraints, AudioFrame, CaptureCapabilities, CaptureDevice, CaptureHandle, Constraint,
    MIX_SAMPLE_RATE,
};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use parking_lot::Mutex;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::thread;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

const RESAMPLER_PARAMETERS: SincInterpolationParameters = SincInterpolationParameters {
    sinc_len: 256,
    f_cutoff: 0.95,
    interpolation: SincInterpolationType::Linear,
    oversampling_factor: 256,
    window: WindowFunction::BlackmanHarris2,
};

/// Opens the default (or a named) input device of the default host.
///
/// The device delivers whatever format it runs at; frames leave here as
/// mono at the mix bus rate. There is no system-audio capture on this path.
#[derive(Debug, Clone, Default)]
pub struct CpalCaptureDevice {
    device_name: Option<String>,
}

impl CpalCaptureDevice {
    pub fn new(device_name: Option<String>) -> Self {
        Self { device_name }
    }

    fn input_device(&self) -> Result<Device, CaptureError> {
        let host = cpal::default_host();
        let device = match &self.device_name {
            Some(name) => host
                .input_devices()
                .map_err(|e| CaptureError::Unavailable(e.to_string()))?
                .find(|device| device.name().is_ok_and(|n| &n == name)),
            None => host.default_input_device(),
        };
        device.ok_or_else(|| {
            CaptureError::Unavailable(match &self.device_name {
                Some(name) => format!("no input device named {name}"),
                None => "no default input device".to_owned(),
            })
        })
    }
}

#[async_trait]
impl CaptureDevice for CpalCaptureDevice {
    async fn open_microphone(
        &self,
        constraints: &AudioConstraints,
    ) -> Result<Arc<dyn CaptureHandle>, CaptureError> {
        let device = self.input_device()?;
        let capture = CpalCapture::start(device).await?;
        capture.apply_constraints(&constraints.restricted_to(&capture.capabilities()).0)?;
        Ok(capture)
    }

    async fn open_system_audio(&self) -> Result<Arc<dyn CaptureHandle>, CaptureError> {
        Err(CaptureError::Unavailable(
            "system audio capture is not available on this host".to_owned(),
        ))
    }
}

enum CaptureInput {
    Samples(Vec<f32>),
    Stop,
}

/// A running input stream.
///
/// The cpal stream lives on its own thread because it cannot move between
/// threads on every platform; the handle talks to it through a channel.
pub struct CpalCapture {
    label: String,
    enabled: Arc<AtomicBool>,
    input: std_mpsc::Sender<CaptureInput>,
    frames: Mutex<Option<mpsc::UnboundedReceiver<AudioFrame>>>,
}

impl CpalCapture {
    async fn start(device: Device) -> Result<Arc<Self>, CaptureError> {
        let label = device.name().unwrap_or_else(|_| "microphone".to_owned());
        let enabled = Arc::new(AtomicBool::new(true));
        let (input_tx, input_rx) = std_mpsc::channel();
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();

        let stream_enabled = enabled.clone();
        let stream_input = input_tx.clone();
        let thread_label = label.clone();
        thread::Builder::new()
            .name("airwave-capture".to_owned())
            .spawn(move || {
                let opened = open_stream(&device, stream_enabled, stream_input).and_then(
                    |(stream, rate)| Ok((stream, FrameResampler::new(rate)?)),
                );
                match opened {
                    Ok((stream, resampler)) => {
                        let _ = ready_tx.send(Ok(()));
                        run_capture(&thread_label, stream, resampler, input_rx, frames_tx);
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                    }
                }
            })
            .map_err(|e| CaptureError::Unavailable(e.to_string()))?;

        ready_rx
            .await
            .map_err(|_| CaptureError::Unavailable("capture thread exited".to_owned()))??;
        info!(device = %label, "Microphone capture started");

        Ok(Arc::new(Self {
            label,
            enabled,
            input: input_tx,
            frames: Mutex::new(Some(frames_rx)),
        }))
    }
}

impl CaptureHandle for CpalCapture {
    fn label(&self) -> String {
        self.label.clone()
    }

    /// Format properties are converted here; voice processing is not
    /// available from a raw input stream.
    fn capabilities(&self) -> CaptureCapabilities {
        CaptureCapabilities::none()
            .with(Constraint::ChannelCount)
            .with(Constraint::SampleRate)
    }

    fn apply_constraints(&self, constraints: &AudioConstraints) -> Result<(), CaptureError> {
        let caps = self.capabilities();
        match constraints.requested().into_iter().find(|c| !caps.supports(*c)) {
            Some(c) => Err(CaptureError::Unsupported(format!("{c:?}"))),
            None => Ok(()),
        }
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    fn stop(&self) {
        let _ = self.input.send(CaptureInput::Stop);
    }

    fn take_frames(&self) -> Option<mpsc::UnboundedReceiver<AudioFrame>> {
        self.frames.lock().take()
    }
}

impl Drop for CpalCapture {
    fn drop(&mut self) {
        let _ = self.input.send(CaptureInput::Stop);
    }
}

fn open_stream(
    device: &Device,
    enabled: Arc<AtomicBool>,
    input: std_mpsc::Sender<CaptureInput>,
) -> Result<(Stream, u32), CaptureError> {
    let supported = device
        .default_input_config()
        .map_err(|e| CaptureError::Unavailable(e.to_string()))?;
    let format = supported.sample_format();
    let config: StreamConfig = supported.into();
    debug!(?format, rate = config.sample_rate.0, channels = config.channels, "Opening input stream");

    let stream = match format {
        SampleFormat::F32 => build_stream::<f32>(device, &config, enabled, input),
        SampleFormat::I16 => build_stream::<i16>(device, &config, enabled, input),
        SampleFormat::U16 => build_stream::<u16>(device, &config, enabled, input),
        other => Err(CaptureError::Unsupported(format!("sample format {other:?}"))),
    }?;
    stream.play().map_err(|e| CaptureError::Unavailable(e.to_string()))?;
    Ok((stream, config.sample_rate.0))
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    enabled: Arc<AtomicBool>,
    input: std_mpsc::Sender<CaptureInput>,
) -> Result<Stream, CaptureError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = usize::from(config.channels.max(1));
    let errors = input.clone();

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                if !enabled.load(Ordering::Relaxed) {
                    return;
                }
                let _ = input.send(CaptureInput::Samples(downmix(data, channels)));
            },
            move |err| {
                error!("Input stream failed: {}", err);
                let _ = errors.send(CaptureInput::Stop);
            },
            None,
        )
        .map_err(|e| match e {
            cpal::BuildStreamError::StreamConfigNotSupported => {
                CaptureError::Unsupported(e.to_string())
            }
            other => CaptureError::Unavailable(other.to_string()),
        })
}

/// Average interleaved channels into one.
fn downmix<T>(data: &[T], channels: usize) -> Vec<f32>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    data.chunks(channels)
        .map(|frame| {
            frame.iter().map(|s| s.to_sample::<f32>()).sum::<f32>() / frame.len() as f32
        })
        .collect()
}

fn run_capture(
    label: &str,
    stream: Stream,
    mut resampler: FrameResampler,
    input: std_mpsc::Receiver<CaptureInput>,
    frames: mpsc::UnboundedSender<AudioFrame>,
) {
    while let Ok(CaptureInput::Samples(samples)) = input.recv() {
        let out = match resampler.push(&samples) {
            Ok(out) => out,
            Err(e) => {
                error!(device = %label, "{}", e);
                break;
            }
        };
        if !out.is_empty() && frames.send(AudioFrame::mono(out)).is_err() {
            break;
        }
    }

    drop(stream);
    info!(device = %label, "Microphone capture stopped");
}

/// Converts mono input at the device rate to mono at the mix bus rate, in
/// 20 ms chunks of input.
pub(crate) struct FrameResampler {
    resampler: Option<SincFixedIn<f32>>,
    chunk: usize,
    pending: Vec<f32>,
}

impl FrameResampler {
    pub(crate) fn new(input_rate: u32) -> Result<Self, CaptureError> {
        let chunk = (input_rate / 50).max(1) as usize;
        let resampler = if input_rate == MIX_SAMPLE_RATE {
            None
        } else {
            let ratio = f64::from(MIX_SAMPLE_RATE) / f64::from(input_rate);
            Some(
                SincFixedIn::<f32>::new(ratio, 2.0, RESAMPLER_PARAMETERS, chunk, 1)
                    .map_err(|e| CaptureError::Unsupported(e.to_string()))?,
            )
        };
        Ok(Self {
            resampler,
            chunk,
            pending: Vec::new(),
        })
    }

    /// Queue device samples and return whatever full chunks converted to.
    pub(crate) fn push(&mut self, samples: &[f32]) -> Result<Vec<f32>, CaptureError> {
        let Some(resampler) = self.resampler.as_mut() else {
            return Ok(samples.to_vec());
        };

        self.pending.extend_from_slice(samples);
        let mut out = Vec::new();
        while self.pending.len() >= self.chunk {
            let converted = resampler
                .process(&[&self.pending[..self.chunk]], None)
                .map_err(|e| CaptureError::Unavailable(e.to_string()))?;
            self.pending.drain(..self.chunk);
            if let Some(channel) = converted.into_iter().next() {
                out.extend(channel);
            }
        }
        if self.pending.len() > self.chunk * 50 {
            warn!(queued = self.pending.len(), "Capture conversion falling behind");
        }
        Ok(out)
    }
}
