//! 聊天平台边界: 收到的消息事件和回复出口

mod discord;

pub use discord::DiscordGateway;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected response {status}: {body}")]
    Http { status: u16, body: String },
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        GatewayError::Network(e.to_string())
    }
}

/// 一条频道消息
#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub guild_id: String,
    pub channel_id: String,
    pub channel_name: String,
    pub author_id: String,
    pub author_name: String,
    pub author_is_bot: bool,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: String,
    pub name: String,
    pub guild_id: String,
}

#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn send_reply(&self, channel_id: &str, text: &str) -> Result<(), GatewayError>;

    /// 机器人所在全部服务器的频道
    async fn list_channels(&self) -> Result<Vec<ChannelInfo>, GatewayError>;
}
