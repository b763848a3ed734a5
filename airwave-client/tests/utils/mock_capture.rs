use airwave_client::{
    AudioConstraints, AudioFrame, CaptureCapabilities, CaptureDevice, CaptureError,
    CaptureHandle,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// In-memory capture that records what the mixer asks of it.
pub struct MockCapture {
    label: String,
    capabilities: CaptureCapabilities,
    has_video: bool,
    reject_sets: bool,
    applied: Mutex<Vec<AudioConstraints>>,
    enabled: AtomicBool,
    video_enabled: Mutex<Option<bool>>,
    stopped: AtomicBool,
    frames_tx: Mutex<Option<mpsc::UnboundedSender<AudioFrame>>>,
    frames_rx: Mutex<Option<mpsc::UnboundedReceiver<AudioFrame>>>,
}

impl MockCapture {
    fn build(label: &str, capabilities: CaptureCapabilities, has_video: bool, reject_sets: bool) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            label: label.to_owned(),
            capabilities,
            has_video,
            reject_sets,
            applied: Mutex::new(Vec::new()),
            enabled: AtomicBool::new(true),
            video_enabled: Mutex::new(None),
            stopped: AtomicBool::new(false),
            frames_tx: Mutex::new(Some(tx)),
            frames_rx: Mutex::new(Some(rx)),
        })
    }

    pub fn microphone() -> Arc<Self> {
        Self::build("mock microphone", CaptureCapabilities::all(), false, false)
    }

    pub fn microphone_with(capabilities: CaptureCapabilities) -> Arc<Self> {
        Self::build("mock microphone", capabilities, false, false)
    }

    /// Accepts constraints only one at a time.
    pub fn picky_microphone() -> Arc<Self> {
        Self::build("picky microphone", CaptureCapabilities::all(), false, true)
    }

    /// Screen share with an audio track and a video track.
    pub fn system_audio() -> Arc<Self> {
        Self::build("mock screen share", CaptureCapabilities::none(), true, false)
    }

    pub fn feed(&self, frame: AudioFrame) {
        if let Some(tx) = self.frames_tx.lock().unwrap().as_ref() {
            let _ = tx.send(frame);
        }
    }

    /// End the capture from outside, like a user stopping a share.
    pub fn end(&self) {
        self.frames_tx.lock().unwrap().take();
    }

    pub fn applied(&self) -> Vec<AudioConstraints> {
        self.applied.lock().unwrap().clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn video_enabled(&self) -> Option<bool> {
        *self.video_enabled.lock().unwrap()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl CaptureHandle for MockCapture {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn capabilities(&self) -> CaptureCapabilities {
        self.capabilities.clone()
    }

    fn apply_constraints(&self, constraints: &AudioConstraints) -> Result<(), CaptureError> {
        if self.reject_sets && constraints.requested().len() > 1 {
            return Err(CaptureError::Unsupported("constraint set".to_owned()));
        }
        self.applied.lock().unwrap().push(*constraints);
        Ok(())
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn has_video(&self) -> bool {
        self.has_video
    }

    fn set_video_enabled(&self, enabled: bool) {
        *self.video_enabled.lock().unwrap() = Some(enabled);
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.frames_tx.lock().unwrap().take();
    }

    fn take_frames(&self) -> Option<mpsc::UnboundedReceiver<AudioFrame>> {
        self.frames_rx.lock().unwrap().take()
    }
}

/// Hands out mock captures, or refuses permission.
#[derive(Default)]
pub struct MockCaptureDevice {
    deny: AtomicBool,
    opened: Mutex<Vec<Arc<MockCapture>>>,
}

impl MockCaptureDevice {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn denying() -> Arc<Self> {
        let device = Self::default();
        device.deny.store(true, Ordering::SeqCst);
        Arc::new(device)
    }

    pub fn opened(&self) -> Vec<Arc<MockCapture>> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl CaptureDevice for MockCaptureDevice {
    async fn open_microphone(
        &self,
        constraints: &AudioConstraints,
    ) -> Result<Arc<dyn CaptureHandle>, CaptureError> {
        if self.deny.load(Ordering::SeqCst) {
            return Err(CaptureError::PermissionDenied("microphone".to_owned()));
        }
        let capture = MockCapture::microphone();
        capture.apply_constraints(constraints)?;
        self.opened.lock().unwrap().push(capture.clone());
        Ok(capture)
    }

    async fn open_system_audio(&self) -> Result<Arc<dyn CaptureHandle>, CaptureError> {
        if self.deny.load(Ordering::SeqCst) {
            return Err(CaptureError::PermissionDenied("display capture".to_owned()));
        }
        let capture = MockCapture::system_audio();
        self.opened.lock().unwrap().push(capture.clone());
        Ok(capture)
    }
}
