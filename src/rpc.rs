// src/rpc.rs
use std::{future::Future, time::Duration};

use alloy::{
    primitives::{Address, B256},
    providers::{DynProvider, Provider, ProviderBuilder},
    sol,
};
use eyre::{eyre, Result, WrapErr};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::{config::Config, parser::lower_hex};

sol! {
    #[sol(rpc)]
    interface IERC20Metadata {
        function name() external view returns (string);
    }

    #[sol(rpc)]
    interface IUniswapV2Factory {
        function getPair(address tokenA, address tokenB) external view returns (address pair);
    }
}

/// Chain reads needed to enrich a newly sighted token
pub trait ChainReader: Send + Sync {
    /// ERC20 `name()`
    fn token_name(&self, token: Address) -> impl Future<Output = Result<String>> + Send;

    /// Sender of the earliest transfer into `token`, or empty when there is none.
    /// A best-effort guess, not a verified contract-creation lookup.
    fn deployer_address(&self, token: Address) -> impl Future<Output = Result<String>> + Send;

    /// Liquidity pair of `token` against WETH, or empty
    fn pair_address(&self, token: Address) -> impl Future<Output = Result<String>> + Send;
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RpcResponse<T> {
    Success { result: T },
    Error { error: RpcError },
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct AssetTransfers {
    transfers: Vec<AssetTransfer>,
}

#[derive(Debug, Deserialize)]
struct AssetTransfer {
    hash: String,
}

/// Alchemy-backed chain reads: contract calls through an alloy HTTP provider,
/// Alchemy's enhanced API through plain JSON-RPC.
#[derive(Clone)]
pub struct AlchemyRpc {
    client: Client,
    rpc_url: String,
    provider: DynProvider,
    uniswap_factory: Address,
    weth: Address,
}

impl AlchemyRpc {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(15)).build()?;
        let url = cfg
            .rpc_http_url
            .parse()
            .wrap_err("RPC_HTTP_URL is not a valid URL")?;
        let provider = ProviderBuilder::new().connect_http(url).erased();

        Ok(Self {
            client,
            rpc_url: cfg.rpc_http_url.clone(),
            provider,
            uniswap_factory: cfg.uniswap_factory,
            weth: cfg.weth_address,
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params
        });

        debug!("📡 Sending {}", method);

        let resp = self.client.post(&self.rpc_url).json(&payload).send().await?;
        if !resp.status().is_success() {
            return Err(eyre!("RPC error: HTTP {}", resp.status()));
        }
        let text = resp.text().await?;

        match serde_json::from_str::<RpcResponse<T>>(&text)? {
            RpcResponse::Success { result } => Ok(result),
            RpcResponse::Error { error } => Err(eyre!(
                "{} failed ({}): {}",
                method,
                error.code,
                error.message
            )),
        }
    }

    /// Hash of the lowest-block transfer into `token`
    async fn first_transfer_hash(&self, token: Address) -> Result<Option<String>> {
        let transfers: AssetTransfers = self
            .call(
                "alchemy_getAssetTransfers",
                json!([{
                    "fromBlock": "0x0",
                    "toBlock": "latest",
                    "toAddress": lower_hex(&token),
                    "excludeZeroValue": false,
                    "category": ["external", "erc20", "erc721", "erc1155"],
                    "order": "asc",
                    "maxCount": "0x1"
                }]),
            )
            .await?;
        Ok(transfers.transfers.into_iter().next().map(|t| t.hash))
    }
}

impl ChainReader for AlchemyRpc {
    async fn token_name(&self, token: Address) -> Result<String> {
        let contract = IERC20Metadata::new(token, self.provider.clone());
        let name = contract.name().call().await?;
        Ok(name)
    }

    async fn deployer_address(&self, token: Address) -> Result<String> {
        let Some(hash) = self.first_transfer_hash(token).await? else {
            return Ok(String::new());
        };
        let hash: B256 = hash.parse().wrap_err("bad transfer hash")?;
        let receipt = self.provider.get_transaction_receipt(hash).await?;
        Ok(receipt.map(|r| lower_hex(&r.from)).unwrap_or_default())
    }

    async fn pair_address(&self, token: Address) -> Result<String> {
        let factory = IUniswapV2Factory::new(self.uniswap_factory, self.provider.clone());
        let pair = factory.getPair(token, self.weth).call().await?;
        if pair.is_zero() {
            return Ok(String::new());
        }
        Ok(lower_hex(&pair))
    }
}
