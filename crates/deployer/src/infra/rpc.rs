use {
    crate::traits::{Connector, FeeEstimate, Provider, ProviderError, Receipt},
    alloy::{
        network::{ReceiptResponse, TransactionBuilder},
        primitives::{Address, Bytes, TxHash, U256},
        providers::{DynProvider, Provider as _, ProviderBuilder},
        rpc::{client::ClientBuilder, types::TransactionRequest},
        transports::{
            RpcError,
            TransportError,
            http::{Http, reqwest},
        },
    },
    anyhow::Context,
    std::{sync::Arc, time::Duration},
    url::Url,
};

/// Connects to nodes over JSON-RPC/HTTP.
#[derive(Clone, Copy, Debug)]
pub struct RpcConnector {
    /// Applies to every request, so a node that stops answering surfaces as a
    /// transport error instead of a hang.
    timeout: Duration,
}

impl RpcConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Connector for RpcConnector {
    fn connect(&self, url: &Url) -> anyhow::Result<Arc<dyn Provider>> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .context("failed to build HTTP client")?;
        let http = Http::with_client(client, url.clone());
        let is_local = http.guess_local();
        let client = ClientBuilder::default().transport(http, is_local);
        let provider = ProviderBuilder::new().connect_client(client).erased();
        Ok(Arc::new(RpcProvider::new(provider)))
    }
}

#[derive(Clone, Debug)]
pub struct RpcProvider(DynProvider);

impl RpcProvider {
    pub fn new(provider: DynProvider) -> Self {
        Self(provider)
    }
}

/// Node error responses are the node's verdict on the request. Everything
/// else means the request never got a proper answer.
fn classify(err: TransportError) -> ProviderError {
    match err {
        RpcError::ErrorResp(payload) => ProviderError::Rejected(payload.message.to_string()),
        err => ProviderError::Transport(err.to_string()),
    }
}

#[async_trait::async_trait]
impl Provider for RpcProvider {
    async fn chain_id(&self) -> Result<u64, ProviderError> {
        self.0.get_chain_id().await.map_err(classify)
    }

    async fn balance(&self, address: Address) -> Result<U256, ProviderError> {
        self.0.get_balance(address).await.map_err(classify)
    }

    async fn nonce(&self, address: Address) -> Result<u64, ProviderError> {
        self.0
            .get_transaction_count(address)
            .pending()
            .await
            .map_err(classify)
    }

    async fn estimate_gas(&self, from: Address, input: Bytes) -> Result<u64, ProviderError> {
        let tx = TransactionRequest::default()
            .from(from)
            .with_deploy_code(input);
        self.0.estimate_gas(tx).await.map_err(classify)
    }

    async fn estimate_fees(&self) -> Result<FeeEstimate, ProviderError> {
        let estimate = self.0.estimate_eip1559_fees().await.map_err(classify)?;
        Ok(FeeEstimate {
            max_fee_per_gas: estimate.max_fee_per_gas,
            max_priority_fee_per_gas: estimate.max_priority_fee_per_gas,
        })
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<TxHash, ProviderError> {
        let pending = self.0.send_raw_transaction(&raw).await.map_err(classify)?;
        Ok(*pending.tx_hash())
    }

    async fn receipt(&self, hash: TxHash) -> Result<Option<Receipt>, ProviderError> {
        let Some(receipt) = self
            .0
            .get_transaction_receipt(hash)
            .await
            .map_err(classify)?
        else {
            return Ok(None);
        };
        // Some nodes return receipts of pending transactions without a block.
        let Some(block_number) = receipt.block_number else {
            return Ok(None);
        };
        Ok(Some(Receipt {
            transaction_hash: receipt.transaction_hash,
            block_number,
            success: receipt.status(),
            contract_address: receipt.contract_address,
            gas_used: receipt.gas_used,
        }))
    }

    async fn block_number(&self) -> Result<u64, ProviderError> {
        self.0.get_block_number().await.map_err(classify)
    }
}
