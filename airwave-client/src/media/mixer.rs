use crate::error::CaptureError;
use crate::media::{
    AudioConstraints, AudioFrame, CaptureDevice, CaptureHandle, CaptureProfile, Constraint,
    MIX_FRAME_SIZE, MixedOutput, OutboundQuality, SourceId, SourceKind,
};
use crate::transport::{EncodingParameters, OutboundSender};
use airwave_core::PeerId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

struct AudioSource {
    kind: SourceKind,
    handle: Arc<dyn CaptureHandle>,
    feeder: Option<JoinHandle<()>>,
}

impl AudioSource {
    fn release(self) {
        if let Some(feeder) = self.feeder {
            feeder.abort();
        }
        self.handle.stop();
    }
}

#[derive(Default)]
struct MixerState {
    sources: HashMap<SourceId, AudioSource>,
    senders: HashMap<PeerId, Arc<dyn OutboundSender>>,
    pump: Option<JoinHandle<()>>,
    paused: bool,
    profile: CaptureProfile,
    quality: OutboundQuality,
}

/// Outcome of applying constraints to the active microphones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileReport {
    pub applied: Vec<SourceId>,
    /// Not supported by the device, never attempted.
    pub skipped: Vec<(SourceId, Constraint)>,
    /// Attempted and rejected.
    pub failed: Vec<(SourceId, Constraint)>,
}

impl ProfileReport {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty() && self.failed.is_empty()
    }
}

/// Combines capture sources into one [`MixedOutput`] and feeds it to the
/// attached outbound senders every 20 ms.
#[derive(Clone)]
pub struct Mixer {
    state: Arc<Mutex<MixerState>>,
    output: MixedOutput,
}

impl Mixer {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MixerState::default())),
            output: MixedOutput::new(),
        }
    }

    pub fn output(&self) -> MixedOutput {
        self.output.clone()
    }

    /// Route a capture into the mix. Returns the new source's id.
    ///
    /// System-audio captures get their video muted, never stopped.
    pub fn add_source(&self, handle: Arc<dyn CaptureHandle>, kind: SourceKind) -> SourceId {
        let id = SourceId::new();
        if kind == SourceKind::SystemAudio && handle.has_video() {
            handle.set_video_enabled(false);
        }
        self.output.attach(id);

        let mut state = self.state.lock();
        if state.paused && kind == SourceKind::Microphone {
            handle.set_enabled(false);
            self.output.set_paused(id, true);
        }

        let feeder = handle
            .take_frames()
            .map(|frames| self.spawn_feeder(id, frames));
        info!(source = %id, ?kind, label = %handle.label(), total = state.sources.len() + 1, "Audio source added");
        state.sources.insert(
            id,
            AudioSource {
                kind,
                handle,
                feeder,
            },
        );
        id
    }

    /// Open a microphone (speech constraints unless given) and add it.
    pub async fn add_microphone(
        &self,
        device: &dyn CaptureDevice,
        constraints: Option<AudioConstraints>,
    ) -> Result<SourceId, CaptureError> {
        let constraints = constraints.unwrap_or_else(AudioConstraints::speech);
        let handle = device.open_microphone(&constraints).await?;
        Ok(self.add_source(handle, SourceKind::Microphone))
    }

    pub async fn add_system_audio(&self, device: &dyn CaptureDevice) -> Result<SourceId, CaptureError> {
        let handle = device.open_system_audio().await?;
        Ok(self.add_source(handle, SourceKind::SystemAudio))
    }

    /// Release a source's capture and take it out of the mix.
    pub fn remove_source(&self, id: SourceId) -> bool {
        let removed = self.state.lock().sources.remove(&id);
        let Some(source) = removed else {
            debug!(source = %id, "Remove of unknown audio source ignored");
            return false;
        };

        let kind = source.kind;
        source.release();
        self.output.detach(id);
        info!(source = %id, ?kind, "Audio source removed");
        true
    }

    pub fn sources(&self) -> Vec<(SourceId, SourceKind)> {
        self.state
            .lock()
            .sources
            .iter()
            .map(|(id, source)| (*id, source.kind))
            .collect()
    }

    pub fn has_source(&self, kind: SourceKind) -> bool {
        self.state.lock().sources.values().any(|s| s.kind == kind)
    }

    /// Apply individual constraints to every active microphone.
    ///
    /// Constraints the device does not support are skipped. If the device
    /// rejects the set as a whole, each constraint is retried on its own.
    pub fn apply_constraints(&self, constraints: &AudioConstraints) -> ProfileReport {
        let microphones: Vec<(SourceId, Arc<dyn CaptureHandle>)> = self
            .state
            .lock()
            .sources
            .iter()
            .filter(|(_, s)| s.kind == SourceKind::Microphone)
            .map(|(id, s)| (*id, s.handle.clone()))
            .collect();

        let mut report = ProfileReport::default();
        for (id, handle) in microphones {
            let (allowed, skipped) = constraints.restricted_to(&handle.capabilities());
            for constraint in skipped {
                debug!(source = %id, ?constraint, "Constraint not supported, skipped");
                report.skipped.push((id, constraint));
            }

            if let Err(e) = handle.apply_constraints(&allowed) {
                warn!(source = %id, "Constraint set rejected, applying one by one: {}", e);
                for constraint in allowed.requested() {
                    if let Err(e) = handle.apply_constraints(&allowed.only(constraint)) {
                        warn!(source = %id, ?constraint, "Constraint failed: {}", e);
                        report.failed.push((id, constraint));
                    }
                }
            }
            report.applied.push(id);
        }
        report
    }

    pub fn apply_profile(&self, profile: CaptureProfile) -> ProfileReport {
        self.state.lock().profile = profile;
        let report = self.apply_constraints(&profile.constraints());
        info!(
            ?profile,
            sources = report.applied.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Capture profile applied"
        );
        report
    }

    pub fn profile(&self) -> CaptureProfile {
        self.state.lock().profile
    }

    /// Mute or unmute every microphone. Returns whether audio is now sent.
    pub fn toggle_pause(&self) -> bool {
        let mut state = self.state.lock();
        state.paused = !state.paused;
        let paused = state.paused;

        for (id, source) in &state.sources {
            if source.kind == SourceKind::Microphone {
                source.handle.set_enabled(!paused);
                self.output.set_paused(*id, paused);
            }
        }
        info!(paused, "Microphone transmission toggled");
        !paused
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    /// Start feeding the mix to `sender`, replacing any sender for `peer`.
    pub fn attach_sender(&self, peer: PeerId, sender: Arc<dyn OutboundSender>) {
        let mut state = self.state.lock();
        state.senders.insert(peer.clone(), sender);
        if state.pump.is_none() {
            state.pump = Some(self.spawn_pump());
        }
        debug!(%peer, senders = state.senders.len(), "Outbound sender attached");
    }

    pub fn detach_sender(&self, peer: &PeerId) {
        let mut state = self.state.lock();
        if state.senders.remove(peer).is_none() {
            return;
        }
        if state.senders.is_empty()
            && let Some(pump) = state.pump.take()
        {
            pump.abort();
        }
        debug!(%peer, senders = state.senders.len(), "Outbound sender detached");
    }

    pub fn sender_count(&self) -> usize {
        self.state.lock().senders.len()
    }

    /// Set the bitrate ceiling on every attached sender.
    ///
    /// Returns false when no sender is attached or one rejected the change.
    pub async fn set_outbound_quality(&self, quality: OutboundQuality) -> bool {
        let senders: Vec<(PeerId, Arc<dyn OutboundSender>)> = self
            .state
            .lock()
            .senders
            .iter()
            .map(|(peer, sender)| (peer.clone(), sender.clone()))
            .collect();
        if senders.is_empty() {
            info!(%quality, "No outbound sender attached, quality not applied");
            return false;
        }

        let bitrate = quality.bitrate();
        let mut applied = true;
        for (peer, sender) in senders {
            let mut encodings = sender.encodings().await;
            if encodings.is_empty() {
                encodings.push(EncodingParameters::default());
            }
            if let Some(first) = encodings.first_mut() {
                first.max_bitrate = Some(bitrate);
            }

            match sender.set_encodings(encodings).await {
                Ok(()) => info!(%peer, bitrate, "Outbound bitrate updated"),
                Err(e) => {
                    warn!(%peer, "Failed to set outbound bitrate: {}", e);
                    applied = false;
                }
            }
        }

        if applied {
            self.state.lock().quality = quality;
        }
        applied
    }

    pub fn quality(&self) -> OutboundQuality {
        self.state.lock().quality
    }

    /// Release every capture and detach every sender.
    pub fn stop_all(&self) {
        let (sources, pump) = {
            let mut state = self.state.lock();
            state.paused = false;
            state.senders.clear();
            (std::mem::take(&mut state.sources), state.pump.take())
        };

        if let Some(pump) = pump {
            pump.abort();
        }
        let count = sources.len();
        for (id, source) in sources {
            source.release();
            self.output.detach(id);
        }
        info!(released = count, "All audio sources stopped");
    }

    fn spawn_feeder(
        &self,
        id: SourceId,
        mut frames: mpsc::UnboundedReceiver<AudioFrame>,
    ) -> JoinHandle<()> {
        let output = self.output.clone();
        let state = Arc::downgrade(&self.state);

        tokio::spawn(async move {
            while let Some(frame) = frames.recv().await {
                output.push(id, &frame);
            }

            output.detach(id);
            let Some(state) = state.upgrade() else {
                return;
            };
            let ended = state.lock().sources.remove(&id);
            if let Some(source) = ended {
                source.handle.stop();
                info!(source = %id, kind = ?source.kind, "Capture ended, audio source removed");
            }
        })
    }

    fn spawn_pump(&self) -> JoinHandle<()> {
        let output = self.output.clone();
        let state = Arc::downgrade(&self.state);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(20));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                let Some(shared) = state.upgrade() else {
                    break;
                };
                let senders: Vec<Arc<dyn OutboundSender>> =
                    shared.lock().senders.values().cloned().collect();
                drop(shared);

                let frame = output.pull(MIX_FRAME_SIZE);
                for sender in senders {
                    if let Err(e) = sender.write_frame(&frame).await {
                        debug!("Dropped outbound audio frame: {}", e);
                    }
                }
            }
        })
    }
}

impl Default for Mixer {
    fn default() -> Self {
        Self::new()
    }
}
