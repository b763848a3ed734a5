use airwave_client::{AudioFrame, Mixer, SourceKind};
use std::time::Duration;

use crate::integration::init_tracing;
use crate::utils::{MockCapture, MockCaptureDevice};

#[tokio::test]
async fn test_remove_source_keeps_output_identity() {
    init_tracing();

    let mixer = Mixer::new();
    let output_id = mixer.output().id();
    let device = MockCaptureDevice::new();

    let mic = mixer.add_microphone(device.as_ref(), None).await.unwrap();
    let system = mixer.add_system_audio(device.as_ref()).await.unwrap();
    assert_eq!(mixer.sources().len(), 2);
    assert_eq!(mixer.output().source_count(), 2);

    assert!(mixer.remove_source(mic));
    assert!(!mixer.remove_source(mic));
    assert!(device.opened()[0].is_stopped());
    assert!(!mixer.has_source(SourceKind::Microphone));
    assert!(mixer.has_source(SourceKind::SystemAudio));

    assert!(mixer.remove_source(system));
    assert_eq!(mixer.output().id(), output_id);
    assert_eq!(mixer.output().source_count(), 0);
    // No sources left: the output still exists and carries silence.
    assert!(mixer.output().pull(4).iter().all(|s| *s == 0.0));
}

#[tokio::test]
async fn test_system_audio_mutes_video() {
    init_tracing();

    let mixer = Mixer::new();
    let device = MockCaptureDevice::new();
    mixer.add_system_audio(device.as_ref()).await.unwrap();

    let share = device.opened()[0].clone();
    assert_eq!(share.video_enabled(), Some(false));
    assert!(!share.is_stopped());
}

#[tokio::test]
async fn test_ended_capture_is_removed() {
    init_tracing();

    let mixer = Mixer::new();
    let share = MockCapture::system_audio();
    mixer.add_source(share.clone(), SourceKind::SystemAudio);
    let mic = MockCapture::microphone();
    mixer.add_source(mic.clone(), SourceKind::Microphone);

    share.feed(AudioFrame::stereo(vec![0.5, 0.5]));
    share.end();

    let mut removed = false;
    for _ in 0..50 {
        if !mixer.has_source(SourceKind::SystemAudio) {
            removed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(removed, "ended capture was not removed");
    assert!(share.is_stopped());
    assert!(mixer.has_source(SourceKind::Microphone));
    assert_eq!(mixer.output().source_count(), 1);
}

#[tokio::test]
async fn test_stop_all_releases_everything() {
    init_tracing();

    let mixer = Mixer::new();
    let device = MockCaptureDevice::new();
    mixer.add_microphone(device.as_ref(), None).await.unwrap();
    mixer.add_system_audio(device.as_ref()).await.unwrap();
    mixer.toggle_pause();

    mixer.stop_all();

    assert!(mixer.sources().is_empty());
    assert!(!mixer.is_paused());
    assert!(device.opened().iter().all(|c| c.is_stopped()));
    assert_eq!(mixer.output().source_count(), 0);
}
