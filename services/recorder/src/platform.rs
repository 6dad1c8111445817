//! Platform HTTP client: cookie jar, user-agent, IP-family policy, and the
//! typed calls the core needs. Grounded on the reference client's
//! `bilibili` package — anonymous viewer, no authenticated session.

use rec_protocol::{BaseResponse, DanmakuServerInfoData, RoomProfileData, StreamingUrlInfoData};
use reqwest::cookie::CookieStore;
use std::sync::Arc;

use crate::net_probe::{is_family_dial_error, NetProbe, NetworkType};

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) recorder";

const ROOM_PROFILE_URL: &str =
    "https://api.live.bilibili.com/room/v1/Room/get_info";
const STREAMING_URL_URL: &str =
    "https://api.live.bilibili.com/room/v1/Room/playUrl";
const DANMAKU_SERVER_INFO_URL: &str =
    "https://api.live.bilibili.com/xlive/web-room/v1/index/getDanmuInfo";
const DEVICE_COOKIE_URL: &str = "https://data.bilibili.com/v/";

/// A stateful HTTP client for one recording task: cookie jar, user-agent,
/// IP-family policy, all bound together under one cancellation scope by
/// its caller (the `PlatformClient` itself holds no scope; callers race
/// its futures against the task's cancellation token).
pub struct PlatformClient {
    cookie_jar: Arc<reqwest::cookie::Jar>,
    probe: NetProbe,
}

impl PlatformClient {
    pub fn new(allowed_network_types: Vec<NetworkType>) -> Self {
        PlatformClient {
            cookie_jar: Arc::new(reqwest::cookie::Jar::default()),
            probe: NetProbe::new(allowed_network_types),
        }
    }

    /// Issue a throwaway GET that exists solely to populate the cookie jar
    /// with a `buvid3` device-id cookie.
    pub async fn obtain_device_cookie(&self) -> Result<(), PlatformError> {
        let url: reqwest::Url = DEVICE_COOKIE_URL.parse().map_err(|e| {
            PlatformError::RequestConstruction(format!("bad device cookie URL: {e}"))
        })?;
        self.execute_across_families(|client| {
            let url = url.clone();
            Box::pin(async move { client.get(url).send().await })
        })
        .await?;

        if self.buvid3().is_none() {
            return Err(PlatformError::RequestConstruction(
                "device cookie endpoint did not set buvid3".to_owned(),
            ));
        }
        Ok(())
    }

    /// The `buvid3` cookie value, if the jar has one.
    pub fn buvid3(&self) -> Option<String> {
        let url: reqwest::Url = DEVICE_COOKIE_URL.parse().ok()?;
        self.cookie_jar
            .cookies(&url)
            .and_then(|header| {
                header
                    .to_str()
                    .ok()
                    .and_then(|s| {
                        s.split(';').find_map(|kv| {
                            let (k, v) = kv.trim().split_once('=')?;
                            (k == "buvid3").then(|| v.to_owned())
                        })
                    })
            })
    }

    pub async fn get_room_profile(&self, room_id: u64) -> Result<RoomProfileData, PlatformError> {
        let url: reqwest::Url = format!("{ROOM_PROFILE_URL}?room_id={room_id}")
            .parse()
            .map_err(|e| PlatformError::RequestConstruction(format!("{e}")))?;
        self.get_envelope(url).await
    }

    pub async fn get_streaming_info(
        &self,
        room_id: u64,
    ) -> Result<StreamingUrlInfoData, PlatformError> {
        let url: reqwest::Url = format!("{STREAMING_URL_URL}?cid={room_id}&qn=10000&platform=web")
            .parse()
            .map_err(|e| PlatformError::RequestConstruction(format!("{e}")))?;
        self.get_envelope(url).await
    }

    pub async fn get_danmaku_server_info(
        &self,
        room_id: u64,
    ) -> Result<DanmakuServerInfoData, PlatformError> {
        let url: reqwest::Url = format!("{DANMAKU_SERVER_INFO_URL}?id={room_id}")
            .parse()
            .map_err(|e| PlatformError::RequestConstruction(format!("{e}")))?;
        self.get_envelope(url).await
    }

    /// Open an HTTP GET to `media_url` with a room-derived Referer header.
    /// A 404 response is translated to `Err(PlatformError::RoomNotOpen)`;
    /// any other non-200 is `PlatformError::Http`.
    pub async fn open_media_stream(
        &self,
        room_id: u64,
        media_url: &str,
    ) -> Result<reqwest::Response, PlatformError> {
        if !(media_url.starts_with("http://") || media_url.starts_with("https://")) {
            return Err(PlatformError::RequestConstruction(format!(
                "media URL missing http(s) prefix: {media_url}"
            )));
        }
        let referer = format!("https://live.bilibili.com/blanc/{room_id}?liteVersion=true");
        let url: reqwest::Url = media_url
            .parse()
            .map_err(|e| PlatformError::RequestConstruction(format!("{e}")))?;

        let response = self
            .execute_across_families(|client| {
                let url = url.clone();
                let referer = referer.clone();
                Box::pin(async move { client.get(url).header("Referer", referer).send().await })
            })
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(PlatformError::RoomNotOpen);
        }
        if !response.status().is_success() {
            return Err(PlatformError::Http(response.status().as_u16()));
        }
        Ok(response)
    }

    /// Upgrade to a WebSocket on `url`, reusing this client's cookie jar.
    pub async fn open_notify_channel(
        &self,
        url: &str,
    ) -> Result<
        tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
        PlatformError,
    > {
        use tokio_tungstenite::tungstenite::client::IntoClientRequest;

        let mut request = url
            .into_client_request()
            .map_err(|e| PlatformError::RequestConstruction(format!("invalid ws url: {e}")))?;

        if let Some(cookie_url) = DEVICE_COOKIE_URL.parse::<reqwest::Url>().ok() {
            if let Some(header) = self.cookie_jar.cookies(&cookie_url) {
                if let Ok(value) = header.to_str() {
                    if let Ok(header_value) = value.parse() {
                        request.headers_mut().insert("Cookie", header_value);
                    }
                }
            }
        }

        let (ws, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| PlatformError::Dial(e.to_string()))?;
        Ok(ws)
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    async fn get_envelope<T: serde::de::DeserializeOwned>(
        &self,
        url: reqwest::Url,
    ) -> Result<T, PlatformError> {
        let response = self
            .execute_across_families(|client| {
                let url = url.clone();
                Box::pin(async move { client.get(url).send().await })
            })
            .await?;

        if !response.status().is_success() {
            return Err(PlatformError::Http(response.status().as_u16()));
        }

        let envelope: BaseResponse<T> = response
            .json()
            .await
            .map_err(|e| PlatformError::Dial(e.to_string()))?;

        if !envelope.is_ok() {
            return Err(PlatformError::Protocol(envelope.code, envelope.message));
        }
        envelope
            .data
            .ok_or_else(|| PlatformError::Protocol(envelope.code, "empty data field".to_owned()))
    }

    /// Try each dial strategy from the net-probe in order, advancing past
    /// address-family/dial errors; a success short-circuits the sequence.
    async fn execute_across_families<F>(&self, make_request: F) -> Result<reqwest::Response, PlatformError>
    where
        F: for<'a> Fn(
            &'a reqwest::Client,
        ) -> std::pin::Pin<
            Box<dyn std::future::Future<Output = Result<reqwest::Response, reqwest::Error>> + Send + 'a>,
        >,
    {
        let strategies = self
            .probe
            .dial_strategies(USER_AGENT, &self.cookie_jar)
            .map_err(|e| PlatformError::RequestConstruction(e.to_string()))?;

        let mut last_err = None;
        for strategy in &strategies {
            match make_request(&strategy.client).await {
                Ok(response) => return Ok(response),
                Err(e) if is_family_dial_error(&e) => {
                    last_err = Some(e);
                    continue;
                }
                Err(e) => return Err(PlatformError::Dial(e.to_string())),
            }
        }
        Err(PlatformError::Dial(
            last_err.map(|e| e.to_string()).unwrap_or_else(|| "no dial strategies available".to_owned()),
        ))
    }
}

#[derive(Debug)]
pub enum PlatformError {
    /// Programmer error: malformed URL or header. Not retriable.
    RequestConstruction(String),
    /// Dial/transport failure, retriable across family preferences.
    Dial(String),
    /// Non-200 HTTP status.
    Http(u16),
    /// Non-zero envelope code.
    Protocol(i64, String),
    /// 404 on a media GET: the room is not currently streaming.
    RoomNotOpen,
}

impl std::fmt::Display for PlatformError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlatformError::RequestConstruction(s) => write!(f, "request construction error: {s}"),
            PlatformError::Dial(s) => write!(f, "dial/transport error: {s}"),
            PlatformError::Http(status) => write!(f, "unexpected HTTP status: {status}"),
            PlatformError::Protocol(code, message) => {
                write!(f, "protocol error: code={code} message={message}")
            }
            PlatformError::RoomNotOpen => write!(f, "room not open / not streaming"),
        }
    }
}

impl std::error::Error for PlatformError {}
