use serde::Deserialize;

use crate::chat::MessageEvent;
use crate::error::FaucetError;

#[derive(Debug, Deserialize)]
pub struct Author {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub bot: bool,
}

/// 网关推送过来的消息事件
#[derive(Debug, Deserialize)]
pub struct MessageEventRequest {
    pub guild_id: String,
    pub channel_id: String,
    pub channel_name: String,
    pub author: Author,
    #[serde(default)]
    pub content: String,
}

impl MessageEventRequest {
    pub fn into_event(self) -> Result<MessageEvent, FaucetError> {
        // 作用域和回复都依赖这些字段
        for (field, value) in [
            ("guild_id", &self.guild_id),
            ("channel_id", &self.channel_id),
            ("author.id", &self.author.id),
        ] {
            if value.trim().is_empty() {
                return Err(FaucetError::InvalidEvent(format!("{field} is required")));
            }
        }

        Ok(MessageEvent {
            guild_id: self.guild_id,
            channel_id: self.channel_id,
            channel_name: self.channel_name,
            author_id: self.author.id,
            author_name: self.author.username,
            author_is_bot: self.author.bot,
            content: self.content,
        })
    }
}
