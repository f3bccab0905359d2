use std::collections::HashMap;
use std::env;
use std::time::Duration;

use crate::error::ConfigError;

/// 未配置间隔的频道使用的默认冷却时间 (120h)
pub const DEFAULT_CHANNEL_INTERVAL: Duration = Duration::from_secs(120 * 3600);

const DEFAULT_DISPATCH_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ChannelConfig {
    pub coins: String,
}

impl ChannelConfig {
    /// 规范化币种字符串: 去掉空白和千分位下划线
    /// 例如 `10_000_000ustars, 1uatom` -> `10000000ustars,1uatom`
    pub fn parse(raw: &str) -> Self {
        let coins = raw
            .split(',')
            .map(|coin| coin.trim().replace('_', ""))
            .collect::<Vec<_>>()
            .join(",");
        Self { coins }
    }
}

/// 链客户端相关配置 (FAUCET_CLIENT_*)
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub rpc_endpoint: String,
    pub api_endpoint: String,
    pub signer_endpoint: String,
    pub account_prefix: String,
    pub gas_amount: u64,
    pub gas_prices: String,
    pub coin_type: u32,
    pub chain_id: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// 频道名 -> 每次发放的币
    /// FAUCET_CHANNEL_AMOUNTS="faucet:10_000_000ustars;private-faucet:10_000_000ustars"
    pub channel_coins: HashMap<String, ChannelConfig>,
    /// 频道名 -> 冷却时间
    /// FAUCET_CHANNEL_INTERVAL="faucet:1h;private-faucet:190h"
    pub channel_intervals: HashMap<String, Duration>,
    pub bot_token: String,
    pub bot_user_id: Option<String>,
    pub discord_api_url: String,
    pub webhook_secret: String,
    pub client: ClientConfig,
    pub faucet_address: String,
    pub faucet_name: String,
    pub explorer_url: String,
    pub store_path: String,
    pub dispatch_delay: Duration,
    pub disable_welcome_message: bool,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 从任意键值来源构建配置，测试时不必修改进程环境变量
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let client = ClientConfig {
            rpc_endpoint: required("FAUCET_CLIENT_RPC_ENDPOINT")?,
            api_endpoint: required("FAUCET_CLIENT_API_ENDPOINT")?,
            signer_endpoint: required("FAUCET_CLIENT_SIGNER_ENDPOINT")?,
            account_prefix: required("FAUCET_CLIENT_ACCOUNT_PREFIX")?,
            gas_amount: parse_or("FAUCET_CLIENT_GAS_AMOUNT", optional("FAUCET_CLIENT_GAS_AMOUNT"), 500_000)?,
            gas_prices: required("FAUCET_CLIENT_GAS_PRICES")?,
            coin_type: parse_or("FAUCET_CLIENT_COIN_TYPE", optional("FAUCET_CLIENT_COIN_TYPE"), 118)?,
            chain_id: required("FAUCET_CLIENT_CHAIN_ID")?,
        };

        let channel_coins = match optional("FAUCET_CHANNEL_AMOUNTS") {
            Some(raw) => parse_map("FAUCET_CHANNEL_AMOUNTS", &raw, |v| Ok(ChannelConfig::parse(v)))?,
            None => HashMap::new(),
        };
        let channel_intervals = match optional("FAUCET_CHANNEL_INTERVAL") {
            Some(raw) => parse_map("FAUCET_CHANNEL_INTERVAL", &raw, |v| {
                humantime::parse_duration(v).map_err(|e| e.to_string())
            })?,
            None => HashMap::new(),
        };

        let dispatch_delay = match optional("FAUCET_DISPATCH_DELAY") {
            Some(raw) => humantime::parse_duration(raw.trim()).map_err(|e| ConfigError::Invalid {
                key: "FAUCET_DISPATCH_DELAY",
                reason: e.to_string(),
            })?,
            None => DEFAULT_DISPATCH_DELAY,
        };

        Ok(Config {
            channel_coins,
            channel_intervals,
            bot_token: required("FAUCET_BOT_TOKEN")?,
            bot_user_id: optional("FAUCET_BOT_USER_ID"),
            discord_api_url: optional("FAUCET_DISCORD_API_URL")
                .unwrap_or_else(|| "https://discord.com/api/v10".into()),
            webhook_secret: required("FAUCET_WEBHOOK_SECRET")?,
            client,
            faucet_address: required("FAUCET_ADDRESS")?,
            faucet_name: optional("FAUCET_NAME").unwrap_or_else(|| "Stargaze".into()),
            explorer_url: optional("FAUCET_EXPLORER_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_default(),
            store_path: optional("FAUCET_STORE_PATH").unwrap_or_else(|| "faucet-data".into()),
            dispatch_delay,
            disable_welcome_message: parse_or(
                "DISABLE_WELCOME_MESSAGE",
                optional("DISABLE_WELCOME_MESSAGE"),
                false,
            )?,
            server_host: optional("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            server_port: parse_or("SERVER_PORT", optional("SERVER_PORT"), 3000)?,
            api_base_uri: optional("API_BASE_URI").unwrap_or_else(|| "/api".into()),
        })
    }

    /// 频道是否开启了水龙头，未配置的频道直接忽略
    pub fn channel_coins(&self, channel_name: &str) -> Option<&ChannelConfig> {
        self.channel_coins.get(channel_name)
    }

    pub fn channel_interval(&self, channel_name: &str) -> Duration {
        self.channel_intervals
            .get(channel_name)
            .copied()
            .unwrap_or(DEFAULT_CHANNEL_INTERVAL)
    }

    pub fn store_file(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.store_path).join("faucet.db")
    }
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(v) => v.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// 解析 `name:value;name:value` 格式，名称中允许任意字符 (只按第一个 ':' 切分)
fn parse_map<T, F>(key: &'static str, raw: &str, parse_value: F) -> Result<HashMap<String, T>, ConfigError>
where
    F: Fn(&str) -> Result<T, String>,
{
    let mut map = HashMap::new();
    for item in raw.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        let (name, value) = item.split_once(':').ok_or_else(|| ConfigError::Invalid {
            key,
            reason: format!("invalid map item: {item}"),
        })?;
        let value = parse_value(value.trim()).map_err(|reason| ConfigError::Invalid { key, reason })?;
        map.insert(name.trim().to_string(), value);
    }
    Ok(map)
}
