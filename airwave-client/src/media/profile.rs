use crate::media::AudioConstraints;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Microphone,
    SystemAudio,
}

/// Named bundle of capture constraints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureProfile {
    #[default]
    Speech,
    Music,
}

impl CaptureProfile {
    pub fn constraints(self) -> AudioConstraints {
        match self {
            Self::Speech => AudioConstraints::speech(),
            Self::Music => AudioConstraints::music(),
        }
    }
}

/// Outbound encoder bitrate ceiling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutboundQuality {
    High,
    #[default]
    Standard,
    Low,
}

impl OutboundQuality {
    /// Bits per second.
    pub fn bitrate(self) -> u64 {
        match self {
            Self::High => 128_000,
            Self::Standard => 64_000,
            Self::Low => 32_000,
        }
    }
}

impl fmt::Display for OutboundQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::High => "high",
            Self::Standard => "standard",
            Self::Low => "low",
        };
        f.write_str(name)
    }
}

impl FromStr for OutboundQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(Self::High),
            "standard" => Ok(Self::Standard),
            "low" => Ok(Self::Low),
            other => Err(format!("unknown quality '{other}'")),
        }
    }
}

impl FromStr for CaptureProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "speech" => Ok(Self::Speech),
            "music" => Ok(Self::Music),
            other => Err(format!("unknown profile '{other}'")),
        }
    }
}
