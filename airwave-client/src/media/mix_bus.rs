use crate::media::AudioFrame;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

pub const MIX_SAMPLE_RATE: u32 = 48_000;
pub const MIX_CHANNELS: usize = 2;
/// 20 ms at the mix bus rate.
pub const MIX_FRAME_SIZE: usize = 960;

/// Per-source backlog cap: one second of stereo.
const MAX_QUEUED_SAMPLES: usize = MIX_SAMPLE_RATE as usize * MIX_CHANNELS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(pub Uuid);

impl SourceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Default)]
struct SourceQueue {
    samples: VecDeque<f32>,
    paused: bool,
}

/// The mixer's combined output.
///
/// Its identity never changes: sources come and go underneath it, and with
/// none attached it yields silence.
#[derive(Clone)]
pub struct MixedOutput {
    id: Uuid,
    queues: Arc<Mutex<HashMap<SourceId, SourceQueue>>>,
}

impl MixedOutput {
    pub(crate) fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            queues: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn source_count(&self) -> usize {
        self.queues.lock().len()
    }

    pub(crate) fn attach(&self, source: SourceId) {
        self.queues.lock().entry(source).or_default();
    }

    pub(crate) fn detach(&self, source: SourceId) {
        self.queues.lock().remove(&source);
    }

    pub(crate) fn set_paused(&self, source: SourceId, paused: bool) {
        if let Some(queue) = self.queues.lock().get_mut(&source) {
            queue.paused = paused;
            if paused {
                queue.samples.clear();
            }
        }
    }

    /// Queue captured audio for `source`, upmixing mono to stereo.
    pub(crate) fn push(&self, source: SourceId, frame: &AudioFrame) {
        let mut queues = self.queues.lock();
        let Some(queue) = queues.get_mut(&source) else {
            return;
        };
        if queue.paused {
            return;
        }

        match frame.channels {
            1 => {
                for s in &frame.samples {
                    queue.samples.push_back(*s);
                    queue.samples.push_back(*s);
                }
            }
            _ => queue.samples.extend(frame.samples.iter().copied()),
        }

        let overflow = queue.samples.len().saturating_sub(MAX_QUEUED_SAMPLES);
        queue.samples.drain(..overflow);
    }

    /// Mix `frames` stereo frames from every source.
    ///
    /// Samples are summed and clamped to [-1, 1]; a source that has nothing
    /// queued contributes silence.
    pub fn pull(&self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0f32; frames * MIX_CHANNELS];
        let mut queues = self.queues.lock();

        for queue in queues.values_mut() {
            let available = queue.samples.len().min(out.len());
            for (slot, sample) in out.iter_mut().zip(queue.samples.drain(..available)) {
                *slot += sample;
            }
        }

        for sample in &mut out {
            *sample = sample.clamp(-1.0, 1.0);
        }
        out
    }
}
