use std::time::Duration;

use async_trait::async_trait;
use bech32::FromBase32;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{LedgerClient, LedgerError};
use crate::config::ClientConfig;

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct AccountInfoResponse {
    info: AccountInfo,
}

#[derive(Debug, Deserialize)]
struct AccountInfo {
    account_number: String,
    sequence: String,
}

#[derive(Debug, Serialize)]
struct SignAndBroadcastRequest<'a> {
    chain_id: &'a str,
    rpc_endpoint: &'a str,
    from_address: &'a str,
    to_address: &'a str,
    amount: &'a str,
    gas: u64,
    fee: &'a str,
    coin_type: u32,
    account_number: u64,
    sequence: u64,
}

#[derive(Debug, Deserialize)]
struct SignAndBroadcastResponse {
    #[serde(default)]
    tx_hash: String,
    #[serde(default)]
    code: u32,
    #[serde(default)]
    raw_log: String,
}

/// 通过 REST 查询账户序号，再交给签名服务签名并广播
///
/// 私钥只存在于签名服务中，这里只负责拼装参数。
#[derive(Clone)]
pub struct RestLedgerClient {
    http: Client,
    config: ClientConfig,
    faucet_address: String,
    fee: String,
}

impl RestLedgerClient {
    pub fn new(config: ClientConfig, faucet_address: String) -> Result<Self, LedgerError> {
        let fee = fee_for(&config.gas_prices, config.gas_amount)?;
        let http = Client::builder().timeout(SEND_TIMEOUT).build()?;
        Ok(Self {
            http,
            config,
            faucet_address,
            fee,
        })
    }

    pub fn faucet_address(&self) -> &str {
        &self.faucet_address
    }

    async fn account_info(&self) -> Result<(u64, u64), LedgerError> {
        let url = format!(
            "{}/cosmos/auth/v1beta1/account_info/{}",
            self.config.api_endpoint.trim_end_matches('/'),
            self.faucet_address
        );
        let resp = self.http.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LedgerError::Http {
                status: status.as_u16(),
                body,
            });
        }
        let info = resp.json::<AccountInfoResponse>().await?.info;
        let parse = |field: &str, raw: &str| {
            raw.parse::<u64>()
                .map_err(|e| LedgerError::Network(format!("bad {field} {raw:?}: {e}")))
        };
        Ok((
            parse("account_number", &info.account_number)?,
            parse("sequence", &info.sequence)?,
        ))
    }
}

#[async_trait]
impl LedgerClient for RestLedgerClient {
    fn validate_address(&self, address: &str) -> bool {
        let Ok((hrp, data, _variant)) = bech32::decode(address) else {
            return false;
        };
        if hrp != self.config.account_prefix {
            return false;
        }
        matches!(Vec::<u8>::from_base32(&data), Ok(bytes) if bytes.len() == 20 || bytes.len() == 32)
    }

    async fn send(&self, to: &str, amount: &str) -> Result<String, LedgerError> {
        if !self.validate_address(to) {
            return Err(LedgerError::InvalidAddress(to.to_string()));
        }
        let (account_number, sequence) = self.account_info().await?;

        let body = SignAndBroadcastRequest {
            chain_id: &self.config.chain_id,
            rpc_endpoint: &self.config.rpc_endpoint,
            from_address: &self.faucet_address,
            to_address: to,
            amount,
            gas: self.config.gas_amount,
            fee: &self.fee,
            coin_type: self.config.coin_type,
            account_number,
            sequence,
        };
        let url = format!("{}/send", self.config.signer_endpoint.trim_end_matches('/'));
        let resp = self.http.post(&url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LedgerError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let result = resp.json::<SignAndBroadcastResponse>().await?;
        if result.code != 0 {
            return Err(LedgerError::Broadcast {
                tx_hash: result.tx_hash,
                code: result.code,
                log: result.raw_log,
            });
        }
        Ok(result.tx_hash)
    }
}

/// 手续费 = gas 单价 × gas 数量，向上取整
/// `fee_for("0.025ustars", 200000)` -> `5000ustars`
pub fn fee_for(gas_prices: &str, gas_amount: u64) -> Result<String, LedgerError> {
    let gas_prices = gas_prices.trim();
    let split = gas_prices
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .ok_or_else(|| LedgerError::Coin(format!("missing denom in {gas_prices:?}")))?;
    let (price, denom) = gas_prices.split_at(split);
    if price.is_empty() || !denom.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return Err(LedgerError::Coin(format!("invalid gas price {gas_prices:?}")));
    }

    let (int_part, frac_part) = price.split_once('.').unwrap_or((price, ""));
    if (int_part.is_empty() && frac_part.is_empty()) || frac_part.contains('.') || frac_part.len() > 18 {
        return Err(LedgerError::Coin(format!("invalid gas price {gas_prices:?}")));
    }
    let overflow = || LedgerError::Coin(format!("gas price overflow {gas_prices:?}"));
    let digits = |s: &str| -> Result<u128, LedgerError> {
        if s.is_empty() {
            Ok(0)
        } else {
            s.parse::<u128>().map_err(|_| overflow())
        }
    };

    let scale = 10u128.pow(frac_part.len() as u32);
    let scaled_price = digits(int_part)?
        .checked_mul(scale)
        .and_then(|v| v.checked_add(digits(frac_part).ok()?))
        .ok_or_else(overflow)?;
    let total = scaled_price
        .checked_mul(gas_amount as u128)
        .ok_or_else(overflow)?;
    Ok(format!("{}{}", total.div_ceil(scale), denom))
}
