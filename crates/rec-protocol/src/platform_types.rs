// JSON envelopes and response bodies returned by the platform's HTTP API,
// plus the introspection endpoint's own response shape.

use serde::{Deserialize, Serialize};

/// Generic `{code, message, ttl, data}` envelope every platform endpoint
/// wraps its payload in. `code == 0` is the only success indicator; any
/// other code is a protocol error even on HTTP 200.
#[derive(Debug, Clone, Deserialize)]
pub struct BaseResponse<T> {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub ttl: i64,
    pub data: Option<T>,
}

impl<T> BaseResponse<T> {
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}

/// Live status of a room, as reported by the room-profile endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LiveStatus {
    Inactive = 0,
    Streaming = 1,
    Playback = 2,
}

impl LiveStatus {
    pub fn is_streaming(self) -> bool {
        matches!(self, Self::Streaming)
    }
}

impl<'de> Deserialize<'de> for LiveStatus {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        repr_shim::deserialize(d)
    }
}

impl Serialize for LiveStatus {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        repr_shim::serialize(self, s)
    }
}

impl std::fmt::Display for LiveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LiveStatus::Inactive => "inactive",
            LiveStatus::Streaming => "streaming",
            LiveStatus::Playback => "playback",
        };
        write!(f, "{s}")
    }
}

/// Fields of the room-profile response the core actually consumes.
#[derive(Debug, Clone, Deserialize)]
pub struct RoomProfileData {
    pub room_id: u64,
    pub uid: u64,
    pub title: String,
    pub live_status: LiveStatus,
}

/// One candidate media URL in a streaming-info response.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamUrlEntry {
    pub url: String,
    #[serde(default)]
    pub stream_type: i64,
}

/// Streaming-info response data; the client always selects index 0.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamingUrlInfoData {
    #[serde(default)]
    pub url_info: Vec<StreamUrlEntry>,
}

/// One notification-channel host candidate.
#[derive(Debug, Clone, Deserialize)]
pub struct DanmakuHost {
    pub host: String,
    pub port: u16,
    pub wss_port: u16,
    pub ws_port: u16,
}

/// Notification-server info response data.
#[derive(Debug, Clone, Deserialize)]
pub struct DanmakuServerInfoData {
    pub token: String,
    #[serde(default)]
    pub host_list: Vec<DanmakuHost>,
}

// ---------------------------------------------------------------------------
// Introspection endpoint response shape
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct LiveRoomDto {
    pub id: u64,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskInfoDto {
    pub live_room: LiveRoomDto,
    pub status: String,
}

// The platform sends live_status as a bare integer; decode it through a
// visitor instead of round-tripping through an intermediate numeric type.
mod repr_shim {
    use super::LiveStatus;
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    struct LiveStatusVisitor;

    impl<'de> Visitor<'de> for LiveStatusVisitor {
        type Value = LiveStatus;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an integer live status code (0, 1, or 2)")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<LiveStatus, E> {
            match v {
                0 => Ok(LiveStatus::Inactive),
                1 => Ok(LiveStatus::Streaming),
                2 => Ok(LiveStatus::Playback),
                other => Err(E::custom(format!("unknown live_status {other}"))),
            }
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<LiveStatus, E> {
            self.visit_u64(v as u64)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<LiveStatus, D::Error> {
        d.deserialize_u64(LiveStatusVisitor)
    }

    pub fn serialize<S: Serializer>(v: &LiveStatus, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u8(*v as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_status_is_streaming_only_for_streaming_variant() {
        assert!(LiveStatus::Streaming.is_streaming());
        assert!(!LiveStatus::Inactive.is_streaming());
        assert!(!LiveStatus::Playback.is_streaming());
    }

    #[test]
    fn base_response_ok_requires_zero_code() {
        let ok: BaseResponse<()> = BaseResponse {
            code: 0,
            message: String::new(),
            ttl: 0,
            data: None,
        };
        assert!(ok.is_ok());
    }
}
