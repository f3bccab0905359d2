use super::replies;
use crate::chat::ChatGateway;
use crate::config::Config;

/// 启动时向所有配置过的频道发一条使用说明，返回成功发送的条数
pub async fn send_welcome(config: &Config, gateway: &dyn ChatGateway) -> usize {
    if config.disable_welcome_message {
        return 0;
    }

    let channels = match gateway.list_channels().await {
        Ok(channels) => channels,
        Err(e) => {
            tracing::error!(error = %e, "error fetching channels");
            return 0;
        }
    };

    let text = replies::welcome(&config.faucet_name, &config.client.account_prefix);
    let mut sent = 0;
    for channel in channels
        .iter()
        .filter(|c| config.channel_coins(&c.name).is_some())
    {
        match gateway.send_reply(&channel.id, &text).await {
            Ok(()) => {
                tracing::info!(channel = %channel.name, channel_id = %channel.id, "sent welcome message");
                sent += 1;
            }
            Err(e) => {
                tracing::error!(channel = %channel.name, error = %e, "error sending welcome message");
            }
        }
    }
    sent
}
