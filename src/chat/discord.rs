use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;

use super::{ChannelInfo, ChatGateway, GatewayError};

/// 文字频道
const GUILD_TEXT: u8 = 0;

#[derive(Debug, Deserialize)]
struct Guild {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Channel {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "type")]
    kind: u8,
}

/// Discord REST 接口
#[derive(Clone)]
pub struct DiscordGateway {
    http: Client,
    base_url: String,
    token: String,
}

impl DiscordGateway {
    pub fn new(base_url: &str, token: &str) -> Result<Self, GatewayError> {
        let http = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn auth(&self) -> String {
        format!("Bot {}", self.token)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, GatewayError> {
        let resp = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .header(reqwest::header::AUTHORIZATION, self.auth())
            .send()
            .await?;
        Ok(check(resp).await?.json::<T>().await?)
    }
}

async fn check(resp: Response) -> Result<Response, GatewayError> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        let body = resp.text().await.unwrap_or_default();
        Err(GatewayError::Http {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl ChatGateway for DiscordGateway {
    async fn send_reply(&self, channel_id: &str, text: &str) -> Result<(), GatewayError> {
        let resp = self
            .http
            .post(format!("{}/channels/{}/messages", self.base_url, channel_id))
            .header(reqwest::header::AUTHORIZATION, self.auth())
            .json(&serde_json::json!({ "content": text }))
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    async fn list_channels(&self) -> Result<Vec<ChannelInfo>, GatewayError> {
        let guilds: Vec<Guild> = self.get_json("/users/@me/guilds").await?;
        let mut channels = Vec::new();
        for guild in guilds {
            let guild_channels: Vec<Channel> = match self
                .get_json(&format!("/guilds/{}/channels", guild.id))
                .await
            {
                Ok(list) => list,
                Err(e) => {
                    tracing::error!(guild = %guild.id, error = %e, "error fetching channels for guild");
                    continue;
                }
            };
            channels.extend(
                guild_channels
                    .into_iter()
                    .filter(|c| c.kind == GUILD_TEXT)
                    .filter_map(|c| {
                        Some(ChannelInfo {
                            id: c.id,
                            name: c.name?,
                            guild_id: guild.id.clone(),
                        })
                    }),
            );
        }
        Ok(channels)
    }
}
