// rec-protocol: wire-format types shared by the recorder service.
//
// Covers the binary notification-channel frame codec and the JSON shapes
// exchanged over it and over the platform's plain HTTP API.

pub mod frame;
pub mod notify;
pub mod platform_types;

pub use frame::{Frame, FrameError, Operation, ProtocolVersion};
pub use notify::{AppDataEnvelope, AuthPayload, ConnectReply, WatchCommand};
pub use platform_types::{
    BaseResponse, DanmakuHost, DanmakuServerInfoData, LiveRoomDto, LiveStatus, RoomProfileData,
    StreamUrlEntry, StreamingUrlInfoData, TaskInfoDto,
};
