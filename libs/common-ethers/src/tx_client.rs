use std::{str::FromStr, sync::Arc};

use alloy_primitives::{Address, Bytes, Selector};
use async_trait::async_trait;
use common::log_msg;
use ethers::{
    middleware::SignerMiddleware,
    providers::{Http, Middleware, MiddlewareError, Provider},
    signers::{LocalWallet, Signer},
    types::{TransactionReceipt, TransactionRequest, U256, U64},
    utils::get_contract_address,
};
use eyre::Context;
use mason::ledger::{CallReceipt, DeployReceipt, LedgerClient, LedgerError, LedgerLog};
use tokio::sync::Mutex;

use crate::{ToAlloy, ToEthers};

type Client = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Signs and sends transactions from one account, one at a time.
///
/// The nonce is fetched once and then tracked locally. The lock is held until
/// the receipt arrives, so a second transaction is never in flight.
pub struct TxClient {
    client: Arc<Client>,
    nonce: Mutex<Option<U256>>,
}

impl TxClient {
    pub async fn try_new_from_url(
        rpc_url: &str,
        get_private_key: impl Fn() -> String,
    ) -> eyre::Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)?;
        let priv_key = get_private_key();
        let wallet = LocalWallet::from_str(&priv_key).context("Invalid private key")?;
        let chain_id = provider
            .get_chainid()
            .await
            .context("Failed to fetch chain id")?
            .as_u64();
        log_msg!("Connected to {} (chain {})", rpc_url, chain_id);
        Ok(Self {
            client: Arc::new(SignerMiddleware::new(
                provider,
                wallet.with_chain_id(chain_id),
            )),
            nonce: Mutex::new(None),
        })
    }

    pub fn client(&self) -> Arc<Client> {
        self.client.clone()
    }

    pub fn address(&self) -> Address {
        self.client.address().to_alloy()
    }

    /// Re-read the account nonce from the node.
    pub async fn begin(&self) -> Result<(), LedgerError> {
        let mut nonce = self.nonce.lock().await;
        nonce.replace(self.fetch_nonce().await?);
        Ok(())
    }

    async fn fetch_nonce(&self) -> Result<U256, LedgerError> {
        self.client
            .get_transaction_count(self.client.address(), None)
            .await
            .map_err(LedgerError::transport)
    }

    async fn send(&self, tx: TransactionRequest) -> Result<TransactionReceipt, LedgerError> {
        let mut guard = self.nonce.lock().await;
        let nonce = match *guard {
            Some(nonce) => nonce,
            None => self.fetch_nonce().await?,
        };
        tracing::trace!(nonce = %nonce, to = ?tx.to, "Sending transaction");

        let pending = self
            .client
            .send_transaction(tx.nonce(nonce), None)
            .await
            .map_err(LedgerError::transport)?;
        guard.replace(nonce + 1);

        let tx_hash = pending.tx_hash();
        let receipt = pending.await.map_err(LedgerError::transport)?;
        receipt.ok_or_else(|| {
            guard.take();
            LedgerError::Rejected(format!("transaction {:?} dropped", tx_hash))
        })
    }
}

fn succeeded(receipt: &TransactionReceipt) -> bool {
    receipt.status == Some(U64::one())
}

#[async_trait]
impl LedgerClient for TxClient {
    fn identity(&self) -> Address {
        self.address()
    }

    async fn estimate_address(&self) -> Result<Address, LedgerError> {
        let nonce = match *self.nonce.lock().await {
            Some(nonce) => nonce,
            None => self.fetch_nonce().await?,
        };
        Ok(get_contract_address(self.client.address(), nonce).to_alloy())
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, LedgerError> {
        let code = self
            .client
            .get_code(address.to_ethers(), None)
            .await
            .map_err(LedgerError::transport)?;
        Ok(code.to_alloy())
    }

    async fn broadcast_deployment(&self, payload: Bytes) -> Result<DeployReceipt, LedgerError> {
        let receipt = self
            .send(TransactionRequest::new().data(payload.to_ethers()))
            .await?;
        Ok(DeployReceipt {
            tx_hash: receipt.transaction_hash.to_alloy(),
            address: receipt.contract_address.map(ToAlloy::to_alloy),
            status: succeeded(&receipt),
        })
    }

    async fn broadcast_call(
        &self,
        to: Address,
        selector: Selector,
        args: Bytes,
    ) -> Result<CallReceipt, LedgerError> {
        let data = [selector.as_slice(), args.as_ref()].concat();
        let receipt = self
            .send(TransactionRequest::new().to(to.to_ethers()).data(data.to_ethers()))
            .await?;
        Ok(CallReceipt {
            tx_hash: receipt.transaction_hash.to_alloy(),
            status: succeeded(&receipt),
            return_data: Bytes::new(),
            logs: receipt
                .logs
                .iter()
                .map(|log| LedgerLog {
                    address: log.address.to_alloy(),
                    topics: log.topics.iter().map(|t| t.to_alloy()).collect(),
                    data: log.data.clone().to_alloy(),
                })
                .collect(),
        })
    }

    async fn read(&self, to: Address, selector: Selector, args: Bytes) -> Result<Bytes, LedgerError> {
        let data = [selector.as_slice(), args.as_ref()].concat();
        let tx = TransactionRequest::new()
            .from(self.client.address())
            .to(to.to_ethers())
            .data(data.to_ethers());
        let output = self
            .client
            .call(&tx.into(), None)
            .await
            .map_err(read_error)?;
        Ok(output.to_alloy())
    }
}

/// A revert reported by the node is a rejection, anything else is transport.
fn read_error<E: MiddlewareError + 'static>(err: E) -> LedgerError {
    match err.as_error_response() {
        Some(response) if response.is_revert() => LedgerError::Rejected(response.message.clone()),
        _ => LedgerError::transport(err),
    }
}

#[cfg(test)]
mod tests {
    use ethers::providers::{HttpClientError, JsonRpcError, ProviderError};

    use super::*;

    #[test]
    fn test_read_error_classification() {
        let revert = ProviderError::from(HttpClientError::JsonRpcError(JsonRpcError {
            code: 3,
            message: "execution reverted: Diamond: Function does not exist".to_owned(),
            data: None,
        }));
        assert!(matches!(read_error(revert), LedgerError::Rejected(msg) if msg.contains("Function does not exist")));

        let transport = ProviderError::CustomError("connection refused".to_owned());
        assert!(matches!(read_error(transport), LedgerError::Transport(_)));
    }
}
