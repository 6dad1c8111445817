// Notification-channel JSON payloads carried inside PlainJson frame bodies.

use serde::{Deserialize, Serialize};

/// Authentication payload sent once per notification-channel session,
/// framed as PlainJson with operation `Connect`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthPayload {
    /// Anonymous viewer; always 0.
    pub uid: u64,
    pub room_id: u64,
    pub protocol_version: u16,
    /// Cookie-derived device id (the `buvid3` cookie value).
    pub buvid3: String,
    /// Always `"web"`.
    pub platform: String,
    /// Always 2 for anonymous web viewers.
    #[serde(rename = "type")]
    pub auth_type: u32,
    pub key: String,
}

impl AuthPayload {
    pub fn anonymous(room_id: u64, buvid3: String, key: String) -> Self {
        AuthPayload {
            uid: 0,
            room_id,
            protocol_version: super::frame::ProtocolVersion::Zlib.to_u16(),
            buvid3,
            platform: "web".to_owned(),
            auth_type: 2,
            key,
        }
    }
}

/// Reply body to a `Connect` frame; a successful auth returns `{"code":0}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectReply {
    pub code: i64,
}

impl ConnectReply {
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}

/// Body carried by `AppData` frames: a command tag plus free-form data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppDataEnvelope {
    pub cmd: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Closed set of informational/stateful commands the watcher recognizes.
/// Anything else is logged and discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchCommand {
    Live,
    Preparing,
    WatchedChange,
    InteractWord,
    DanmuMsg,
    OnlineRankChange,
    EntryEffect,
    StopLiveRoomList,
    HotRankChangedV2,
}

impl WatchCommand {
    pub fn parse(cmd: &str) -> Option<Self> {
        match cmd {
            "LIVE" => Some(Self::Live),
            "PREPARING" => Some(Self::Preparing),
            "WATCHED_CHANGE" => Some(Self::WatchedChange),
            "INTERACT_WORD" => Some(Self::InteractWord),
            "DANMU_MSG" => Some(Self::DanmuMsg),
            "ENTRY_EFFECT" => Some(Self::EntryEffect),
            "STOP_LIVE_ROOM_LIST" => Some(Self::StopLiveRoomList),
            "HOT_RANK_CHANGED_V2" => Some(Self::HotRankChangedV2),
            s if s.starts_with("ONLINE_RANK_") => Some(Self::OnlineRankChange),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_reply_ok_only_on_zero_code() {
        assert!(ConnectReply { code: 0 }.is_ok());
        assert!(!ConnectReply { code: 1 }.is_ok());
    }

    #[test]
    fn watch_command_recognizes_online_rank_family() {
        assert_eq!(
            WatchCommand::parse("ONLINE_RANK_V2"),
            Some(WatchCommand::OnlineRankChange)
        );
        assert_eq!(WatchCommand::parse("UNKNOWN_CMD"), None);
    }
}
