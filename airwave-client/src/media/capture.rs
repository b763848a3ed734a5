use crate::error::CaptureError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;

/// One tunable capture property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Constraint {
    EchoCancellation,
    NoiseSuppression,
    AutoGainControl,
    ChannelCount,
    SampleRate,
    SampleSize,
}

impl Constraint {
    pub const ALL: [Constraint; 6] = [
        Constraint::EchoCancellation,
        Constraint::NoiseSuppression,
        Constraint::AutoGainControl,
        Constraint::ChannelCount,
        Constraint::SampleRate,
        Constraint::SampleSize,
    ];
}

/// Requested capture settings. `None` leaves a property as the device has it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioConstraints {
    pub echo_cancellation: Option<bool>,
    pub noise_suppression: Option<bool>,
    pub auto_gain_control: Option<bool>,
    pub channel_count: Option<u16>,
    pub sample_rate: Option<u32>,
    pub sample_size: Option<u16>,
}

impl AudioConstraints {
    /// Voice processing on: echo cancellation, noise suppression, gain control.
    pub fn speech() -> Self {
        Self {
            echo_cancellation: Some(true),
            noise_suppression: Some(true),
            auto_gain_control: Some(true),
            ..Default::default()
        }
    }

    /// Voice processing off, stereo at 48 kHz / 24 bit.
    pub fn music() -> Self {
        Self {
            echo_cancellation: Some(false),
            noise_suppression: Some(false),
            auto_gain_control: Some(false),
            channel_count: Some(2),
            sample_rate: Some(48_000),
            sample_size: Some(24),
        }
    }

    pub fn is_set(&self, constraint: Constraint) -> bool {
        match constraint {
            Constraint::EchoCancellation => self.echo_cancellation.is_some(),
            Constraint::NoiseSuppression => self.noise_suppression.is_some(),
            Constraint::AutoGainControl => self.auto_gain_control.is_some(),
            Constraint::ChannelCount => self.channel_count.is_some(),
            Constraint::SampleRate => self.sample_rate.is_some(),
            Constraint::SampleSize => self.sample_size.is_some(),
        }
    }

    pub fn requested(&self) -> Vec<Constraint> {
        Constraint::ALL
            .into_iter()
            .filter(|c| self.is_set(*c))
            .collect()
    }

    pub fn without(mut self, constraint: Constraint) -> Self {
        match constraint {
            Constraint::EchoCancellation => self.echo_cancellation = None,
            Constraint::NoiseSuppression => self.noise_suppression = None,
            Constraint::AutoGainControl => self.auto_gain_control = None,
            Constraint::ChannelCount => self.channel_count = None,
            Constraint::SampleRate => self.sample_rate = None,
            Constraint::SampleSize => self.sample_size = None,
        }
        self
    }

    /// Only `constraint`, as requested here.
    pub fn only(&self, constraint: Constraint) -> Self {
        Constraint::ALL
            .into_iter()
            .filter(|c| *c != constraint)
            .fold(*self, |acc, c| acc.without(c))
    }

    /// Split into what `capabilities` supports and what must be skipped.
    pub fn restricted_to(&self, capabilities: &CaptureCapabilities) -> (Self, Vec<Constraint>) {
        let skipped: Vec<Constraint> = self
            .requested()
            .into_iter()
            .filter(|c| !capabilities.supports(*c))
            .collect();
        let allowed = skipped.iter().fold(*self, |acc, c| acc.without(*c));
        (allowed, skipped)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureCapabilities {
    supported: HashSet<Constraint>,
}

impl CaptureCapabilities {
    pub fn all() -> Self {
        Self {
            supported: Constraint::ALL.into_iter().collect(),
        }
    }

    pub fn none() -> Self {
        Self {
            supported: HashSet::new(),
        }
    }

    pub fn with(mut self, constraint: Constraint) -> Self {
        self.supported.insert(constraint);
        self
    }

    pub fn without(mut self, constraint: Constraint) -> Self {
        self.supported.remove(&constraint);
        self
    }

    pub fn supports(&self, constraint: Constraint) -> bool {
        self.supported.contains(&constraint)
    }
}

impl Default for CaptureCapabilities {
    fn default() -> Self {
        Self::all()
    }
}

/// A block of captured PCM at the mix bus rate, interleaved.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    pub channels: u16,
    pub samples: Vec<f32>,
}

impl AudioFrame {
    pub fn mono(samples: Vec<f32>) -> Self {
        Self {
            channels: 1,
            samples,
        }
    }

    pub fn stereo(samples: Vec<f32>) -> Self {
        Self {
            channels: 2,
            samples,
        }
    }
}

/// A live capture session owned by the mixer.
///
/// The frame stream ends when the capture ends, whether stopped here or
/// from outside (e.g. the user ending a screen share).
pub trait CaptureHandle: Send + Sync {
    fn label(&self) -> String;

    fn capabilities(&self) -> CaptureCapabilities;

    fn apply_constraints(&self, constraints: &AudioConstraints) -> Result<(), CaptureError>;

    fn set_enabled(&self, enabled: bool);

    /// Whether this capture also carries a video component.
    fn has_video(&self) -> bool {
        false
    }

    /// Mute or unmute the video component. There is deliberately no way to
    /// stop it alone: on system-audio shares that ends the audio too.
    fn set_video_enabled(&self, _enabled: bool) {}

    /// Release the whole capture.
    fn stop(&self);

    /// Take the frame stream. Yields `Some` once.
    fn take_frames(&self) -> Option<mpsc::UnboundedReceiver<AudioFrame>>;
}

/// Source of capture handles (microphones, system audio shares).
///
/// Opening may wait indefinitely on a user permission prompt.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    async fn open_microphone(
        &self,
        constraints: &AudioConstraints,
    ) -> Result<Arc<dyn CaptureHandle>, CaptureError>;

    async fn open_system_audio(&self) -> Result<Arc<dyn CaptureHandle>, CaptureError>;
}
