use crate::model::peer::PeerId;
use crate::model::room::RoomSummary;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServerConfig {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
    Pranswer,
    Rollback,
}

/// Session description exchanged during negotiation, `{type, sdp}` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

/// Connectivity candidate in the browser `RTCIceCandidate.toJSON()` shape.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_m_line_index: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            ..Default::default()
        }
    }
}

/// Addressing fields carried by peer-to-peer messages.
///
/// `sender` and `room_id` are stamped by the signaling client on every send.
/// `target` is optional: when present, only that peer acts on the message.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<PeerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<PeerId>,
}

impl Route {
    pub fn to(target: PeerId) -> Self {
        Self {
            target: Some(target),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum SignalMessage {
    Join {
        room_id: String,
        id: PeerId,
    },
    Leave {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<PeerId>,
    },
    GetRooms,
    Joined {
        peer_count: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender: Option<PeerId>,
    },
    RoomsList {
        rooms: Vec<RoomSummary>,
    },
    Hello {
        #[serde(flatten)]
        route: Route,
    },
    Offer {
        #[serde(flatten)]
        route: Route,
        offer: SessionDescription,
    },
    Answer {
        #[serde(flatten)]
        route: Route,
        answer: SessionDescription,
    },
    Ice {
        #[serde(flatten)]
        route: Route,
        ice: IceCandidate,
    },
}

impl SignalMessage {
    pub fn hello() -> Self {
        Self::Hello {
            route: Route::default(),
        }
    }

    /// Wire name of the message kind, as found in its `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::Leave { .. } => "leave",
            Self::GetRooms => "get_rooms",
            Self::Joined { .. } => "joined",
            Self::RoomsList { .. } => "rooms_list",
            Self::Hello { .. } => "hello",
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::Ice { .. } => "ice",
        }
    }

    pub fn route(&self) -> Option<&Route> {
        match self {
            Self::Hello { route }
            | Self::Offer { route, .. }
            | Self::Answer { route, .. }
            | Self::Ice { route, .. } => Some(route),
            _ => None,
        }
    }

    pub fn route_mut(&mut self) -> Option<&mut Route> {
        match self {
            Self::Hello { route }
            | Self::Offer { route, .. }
            | Self::Answer { route, .. }
            | Self::Ice { route, .. } => Some(route),
            _ => None,
        }
    }

    pub fn sender(&self) -> Option<&PeerId> {
        match self {
            Self::Joined { sender, .. } => sender.as_ref(),
            other => other.route().and_then(|r| r.sender.as_ref()),
        }
    }

    pub fn target(&self) -> Option<&PeerId> {
        self.route().and_then(|r| r.target.as_ref())
    }
}
