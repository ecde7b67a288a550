//! Ledger client seam.
//!
//! Everything that touches a chain goes through [`LedgerClient`]. The
//! orchestration code awaits every receipt before moving on, so an
//! implementation never sees two in-flight transactions from the same run.
//!
use alloy_primitives::{Address, Bytes, Selector, B256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;

use crate::error::MasonError;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger transport failure: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("ledger rejected request: {0}")]
    Rejected(String),
}

impl LedgerError {
    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport(Box::new(err))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployReceipt {
    pub tx_hash: B256,
    pub address: Option<Address>,
    pub status: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallReceipt {
    pub tx_hash: B256,
    pub status: bool,
    pub return_data: Bytes,
    pub logs: Vec<LedgerLog>,
}

#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Account that signs every transaction.
    fn identity(&self) -> Address;

    /// Address the next ordinary (non-deterministic) deployment will land at.
    async fn estimate_address(&self) -> Result<Address, LedgerError>;

    async fn code_at(&self, address: Address) -> Result<Bytes, LedgerError>;

    async fn broadcast_deployment(&self, payload: Bytes) -> Result<DeployReceipt, LedgerError>;

    async fn broadcast_call(
        &self,
        to: Address,
        selector: Selector,
        args: Bytes,
    ) -> Result<CallReceipt, LedgerError>;

    /// Read-only call, nothing is broadcast.
    async fn read(&self, to: Address, selector: Selector, args: Bytes)
        -> Result<Bytes, LedgerError>;
}

pub async fn has_code<L>(ledger: &L, address: Address) -> Result<bool, LedgerError>
where
    L: LedgerClient + ?Sized,
{
    Ok(!ledger.code_at(address).await?.is_empty())
}

pub async fn send_call<L, C>(ledger: &L, to: Address, call: &C) -> Result<CallReceipt, LedgerError>
where
    L: LedgerClient + ?Sized,
    C: SolCall + Sync,
{
    ledger
        .broadcast_call(to, Selector::from(C::SELECTOR), {
            let mut buf = Vec::new();
            call.abi_encode_raw(&mut buf);
            buf.into()
        })
        .await
}

/// Broadcast and fail with [`MasonError::CallReverted`] on a failed receipt.
pub async fn send_call_checked<L, C>(
    ledger: &L,
    to: Address,
    call: &C,
) -> Result<CallReceipt, MasonError>
where
    L: LedgerClient + ?Sized,
    C: SolCall + Sync,
{
    let receipt = send_call(ledger, to, call).await?;
    if !receipt.status {
        return Err(MasonError::CallReverted {
            call: C::SIGNATURE.to_owned(),
            tx_reference: receipt.tx_hash,
        });
    }
    Ok(receipt)
}

pub async fn read_call<L, C>(ledger: &L, to: Address, call: &C) -> Result<C::Return, MasonError>
where
    L: LedgerClient + ?Sized,
    C: SolCall + Sync,
{
    let data = ledger
        .read(to, Selector::from(C::SELECTOR), {
            let mut buf = Vec::new();
            call.abi_encode_raw(&mut buf);
            buf.into()
        })
        .await?;
    Ok(C::abi_decode_returns(&data, true)?)
}
