use chrono::{DateTime, Utc};

use super::command::COMMAND_WORD;

fn mention(user_id: &str) -> String {
    format!("<@{}>", user_id)
}

pub fn rate_limited(user_id: &str, retry_at: DateTime<Utc>) -> String {
    format!(
        "{} you can send a request again <t:{}:R>",
        mention(user_id),
        retry_at.timestamp()
    )
}

pub fn usage(user_id: &str) -> String {
    format!(
        "{} invalid request, please use the `{} <address>` command",
        mention(user_id),
        COMMAND_WORD
    )
}

pub fn queued(user_id: &str) -> String {
    format!(
        "{} your request has been sent, the transaction will be broadcasted in a few seconds",
        mention(user_id)
    )
}

pub fn succeeded(user_id: &str, explorer_url: &str, tx_hash: &str) -> String {
    format!(
        "{} your request has been sent, check your transaction {}/{}",
        mention(user_id),
        explorer_url,
        tx_hash
    )
}

pub fn failed(user_id: &str) -> String {
    format!("{} your request has failed, please try again later", mention(user_id))
}

pub fn welcome(faucet_name: &str, account_prefix: &str) -> String {
    format!(
        "Welcome to the {} Faucet! Please use the `{} {}1zxcvaqswdedefr...` command to request tokens.",
        faucet_name, COMMAND_WORD, account_prefix
    )
}
