use airwave_client::{CandidateDisposition, NegotiationError, Negotiator};
use airwave_core::{IceCandidate, PeerId, SessionDescription};

use crate::integration::init_tracing;
use crate::utils::MockTransportFactory;

#[tokio::test]
async fn test_close_discards_state() {
    init_tracing();

    let factory = MockTransportFactory::new();
    let (mut negotiator, _events) = Negotiator::new(factory.clone());
    let listener = PeerId::from("listener");
    let stranger = PeerId::from("stranger");

    negotiator.create_offer(&listener).await.unwrap();
    negotiator
        .add_candidate(&listener, IceCandidate::new("pending"))
        .await;
    negotiator
        .add_candidate(&stranger, IceCandidate::new("early"))
        .await;

    assert!(negotiator.close(&listener).await);
    assert!(factory.last().is_closed());
    assert!(negotiator.context(&listener).is_none());
    assert!(!negotiator.close(&listener).await);

    negotiator.close_all().await;
    assert!(negotiator.is_empty());
    assert_eq!(negotiator.early_candidates(&stranger), 0);

    // A fresh offer afterwards starts from a clean buffer.
    negotiator.create_offer(&listener).await.unwrap();
    assert_eq!(negotiator.context(&listener).unwrap().pending_candidates(), 0);
}

#[tokio::test]
async fn test_failed_step_tears_down_context() {
    init_tracing();

    let factory = MockTransportFactory::new();
    factory.fail_remote_descriptions();
    let (mut negotiator, _events) = Negotiator::new(factory.clone());
    let broadcaster = PeerId::from("broadcaster");

    let result = negotiator
        .accept_offer(&broadcaster, &SessionDescription::offer("v=0"))
        .await;

    assert!(matches!(result, Err(NegotiationError::Transport(_))));
    assert!(negotiator.context(&broadcaster).is_none());
    assert!(factory.last().is_closed());
}

#[tokio::test]
async fn test_late_candidates_after_close_are_discarded() {
    init_tracing();

    let factory = MockTransportFactory::new();
    let (mut negotiator, _events) = Negotiator::new(factory.clone());
    let listener = PeerId::from("listener");

    negotiator.create_offer(&listener).await.unwrap();
    assert!(negotiator.close(&listener).await);

    for i in 0..5 {
        let disposition = negotiator
            .add_candidate(&listener, IceCandidate::new(format!("late-{i}")))
            .await;
        assert_eq!(disposition, CandidateDisposition::Discarded);
    }
    assert_eq!(negotiator.early_candidates(&listener), 0);

    // A new channel to the same peer takes candidates again.
    negotiator.create_offer(&listener).await.unwrap();
    let disposition = negotiator
        .add_candidate(&listener, IceCandidate::new("fresh"))
        .await;
    assert_eq!(disposition, CandidateDisposition::Buffered);
    assert_eq!(negotiator.context(&listener).unwrap().pending_candidates(), 1);
}
