use crate::error::TransportError;
use crate::media::{MIX_CHANNELS, MIX_SAMPLE_RATE};
use crate::transport::{
    ChannelKey, EncodingParameters, OutboundSender, PeerTransport, TransportConfig,
    TransportEvent, TransportFactory,
};
use airwave_core::{IceCandidate, SdpKind, SessionDescription};
use async_trait::async_trait;
use bytes::Bytes;
use opus::{
    Application as OpusApplication, Bitrate as OpusBitrate, Channels as OpusChannels,
    Encoder as OpusEncoder,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MediaEngine};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::media::Sample;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

/// Opus accepts bitrates in this range; requests outside it are clamped.
const MIN_BITRATE: i32 = 500;
const MAX_BITRATE: i32 = 512_000;
const MAX_PACKET_SIZE: usize = 1500;

/// Builds webrtc-rs backed transports.
#[derive(Debug, Clone, Default)]
pub struct RtcTransportFactory {
    config: TransportConfig,
}

impl RtcTransportFactory {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl TransportFactory for RtcTransportFactory {
    async fn create(
        &self,
        key: ChannelKey,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Arc<dyn PeerTransport>, TransportError> {
        let wrapper = ConnectionWrapper::new(key, self.config.clone(), events).await?;
        Ok(Arc::new(wrapper))
    }
}

pub struct ConnectionWrapper {
    pub key: ChannelKey,
    pub peer_connection: Arc<RTCPeerConnection>,
}

impl ConnectionWrapper {
    /// Set up a peer connection whose callbacks report into `event_tx`.
    pub async fn new(
        key: ChannelKey,
        config: TransportConfig,
        event_tx: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Self, TransportError> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: config
                .ice_servers
                .into_iter()
                .map(|server| RTCIceServer {
                    urls: server.urls,
                    username: server.username.unwrap_or_default(),
                    credential: server.credential.unwrap_or_default(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await?);

        let state_tx = event_tx.clone();
        let key_state = key.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = state_tx.clone();
                let key = key_state.clone();

                Box::pin(async move {
                    info!(channel = %key, "Peer connection state changed: {:?}", s);
                    if let Some(event) = state_event(key, s) {
                        let _ = tx.send(event);
                    }
                })
            },
        ));

        let ice_tx = event_tx.clone();
        let key_ice = key.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();
            let key = key_ice.clone();

            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                let candidate = IceCandidate {
                    candidate: init.candidate,
                    sdp_mid: init.sdp_mid,
                    sdp_m_line_index: init.sdp_mline_index,
                    username_fragment: init.username_fragment,
                };
                let _ = tx.send(TransportEvent::CandidateGenerated(key, candidate));
            })
        }));

        let track_tx = event_tx;
        let key_track = key.clone();
        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let tx = track_tx.clone();
                let key = key_track.clone();

                Box::pin(async move {
                    debug!(channel = %key, "Remote track received");
                    let _ = tx.send(TransportEvent::TrackReceived(key));

                    // Playback is outside this crate; keep the track drained.
                    tokio::spawn(async move { while track.read_rtp().await.is_ok() {} });
                })
            },
        ));

        Ok(Self {
            key,
            peer_connection,
        })
    }
}

/// Only `Failed` and `Closed` end a channel; `Disconnected` can recover.
fn state_event(key: ChannelKey, state: RTCPeerConnectionState) -> Option<TransportEvent> {
    match state {
        RTCPeerConnectionState::Connected => Some(TransportEvent::Connected(key)),
        RTCPeerConnectionState::Disconnected => Some(TransportEvent::Interrupted(key)),
        RTCPeerConnectionState::Failed | RTCPeerConnectionState::Closed => {
            Some(TransportEvent::Disconnected(key))
        }
        _ => None,
    }
}

fn to_rtc(desc: &SessionDescription) -> Result<RTCSessionDescription, TransportError> {
    let sdp = desc.sdp.clone();
    let rtc = match desc.kind {
        SdpKind::Offer => RTCSessionDescription::offer(sdp)?,
        SdpKind::Answer => RTCSessionDescription::answer(sdp)?,
        SdpKind::Pranswer => RTCSessionDescription::pranswer(sdp)?,
        SdpKind::Rollback => {
            return Err(TransportError::Description("rollback".to_owned()));
        }
    };
    Ok(rtc)
}

#[async_trait]
impl PeerTransport for ConnectionWrapper {
    async fn add_local_audio(&self) -> Result<Arc<dyn OutboundSender>, TransportError> {
        let track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: MIX_SAMPLE_RATE,
                channels: MIX_CHANNELS as u16,
                sdp_fmtp_line: "minptime=10;useinbandfec=1".to_owned(),
                ..Default::default()
            },
            "audio".to_owned(),
            format!("airwave-{}", self.key.peer),
        ));
        let sender = RtcAudioSender::new(Arc::clone(&track))?;

        let rtp_sender = self
            .peer_connection
            .add_track(track as Arc<dyn TrackLocal + Send + Sync>)
            .await?;

        // RTCP has to be read for interceptors to run.
        tokio::spawn(async move {
            let mut buf = vec![0u8; 1500];
            while rtp_sender.read(&mut buf).await.is_ok() {}
        });

        Ok(Arc::new(sender))
    }

    async fn create_offer(&self) -> Result<SessionDescription, TransportError> {
        let offer = self.peer_connection.create_offer(None).await?;
        Ok(SessionDescription::offer(offer.sdp))
    }

    async fn create_answer(&self) -> Result<SessionDescription, TransportError> {
        let answer = self.peer_connection.create_answer(None).await?;
        Ok(SessionDescription::answer(answer.sdp))
    }

    async fn set_local_description(&self, desc: &SessionDescription) -> Result<(), TransportError> {
        self.peer_connection
            .set_local_description(to_rtc(desc)?)
            .await?;
        Ok(())
    }

    async fn set_remote_description(
        &self,
        desc: &SessionDescription,
    ) -> Result<(), TransportError> {
        self.peer_connection
            .set_remote_description(to_rtc(desc)?)
            .await?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: &IceCandidate) -> Result<(), TransportError> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate.clone(),
            sdp_mid: candidate.sdp_mid.clone(),
            sdp_mline_index: candidate.sdp_m_line_index,
            username_fragment: candidate.username_fragment.clone(),
        };
        self.peer_connection.add_ice_candidate(init).await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.peer_connection.close().await?;
        Ok(())
    }
}

/// Local Opus track fed from the mix bus.
///
/// The first encoding's `max_bitrate` drives the encoder bitrate; without one
/// the encoder picks its own.
pub struct RtcAudioSender {
    track: Arc<TrackLocalStaticSample>,
    encoder: Mutex<OpusEncoder>,
    encodings: Mutex<Vec<EncodingParameters>>,
}

impl RtcAudioSender {
    pub fn new(track: Arc<TrackLocalStaticSample>) -> Result<Self, TransportError> {
        let encoder = OpusEncoder::new(MIX_SAMPLE_RATE, OpusChannels::Stereo, OpusApplication::Audio)?;
        Ok(Self {
            track,
            encoder: Mutex::new(encoder),
            encodings: Mutex::new(Vec::new()),
        })
    }

    /// The bitrate the encoder is currently targeting.
    pub fn bitrate(&self) -> Result<OpusBitrate, TransportError> {
        Ok(self.encoder.lock().get_bitrate()?)
    }

    fn encode(&self, samples: &[f32]) -> Result<Bytes, TransportError> {
        let mut packet = vec![0u8; MAX_PACKET_SIZE];
        let len = self.encoder.lock().encode_float(samples, &mut packet)?;
        packet.truncate(len);
        Ok(Bytes::from(packet))
    }
}

fn opus_bitrate(encodings: &[EncodingParameters]) -> OpusBitrate {
    match encodings.first().and_then(|e| e.max_bitrate) {
        Some(bits) => OpusBitrate::Bits(
            i32::try_from(bits)
                .unwrap_or(MAX_BITRATE)
                .clamp(MIN_BITRATE, MAX_BITRATE),
        ),
        None => OpusBitrate::Auto,
    }
}

#[async_trait]
impl OutboundSender for RtcAudioSender {
    async fn encodings(&self) -> Vec<EncodingParameters> {
        self.encodings.lock().clone()
    }

    async fn set_encodings(
        &self,
        encodings: Vec<EncodingParameters>,
    ) -> Result<(), TransportError> {
        let bitrate = opus_bitrate(&encodings);
        self.encoder.lock().set_bitrate(bitrate)?;
        debug!(?bitrate, "Opus encoder bitrate set");
        *self.encodings.lock() = encodings;
        Ok(())
    }

    async fn write_frame(&self, samples: &[f32]) -> Result<(), TransportError> {
        let frames = (samples.len() / MIX_CHANNELS) as u64;
        let sample = Sample {
            data: self.encode(samples)?,
            duration: Duration::from_micros(frames * 1_000_000 / u64::from(MIX_SAMPLE_RATE)),
            ..Default::default()
        };
        if let Err(e) = self.track.write_sample(&sample).await {
            warn!("Failed to write audio sample: {}", e);
            return Err(e.into());
        }
        Ok(())
    }
}
