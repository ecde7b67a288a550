use alloy_primitives::{Selector, B256};
use common::part_id::PartIdError;

use crate::ledger::LedgerError;

#[derive(Debug, thiserror::Error)]
pub enum MasonError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("deployment of `{facet_name}` failed: {reason}")]
    DeploymentFailed { facet_name: String, reason: String },

    #[error("selector {selector} is claimed by both `{facet_a}` and `{facet_b}`")]
    SelectorCollision {
        selector: Selector,
        facet_a: String,
        facet_b: String,
    },

    #[error("diamond upgrade failed in transaction {tx_reference}")]
    UpgradeFailed { tx_reference: B256 },

    #[error("call `{call}` reverted in transaction {tx_reference}")]
    CallReverted { call: String, tx_reference: B256 },

    #[error("no facet named `{0}`")]
    UnknownFacet(String),

    #[error("no known address for `{0}`")]
    UnknownAddress(String),

    #[error("artifact error: {0}")]
    Artifact(String),

    #[error(transparent)]
    PartId(#[from] PartIdError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Abi(#[from] alloy_sol_types::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl MasonError {
    /// Errors raised before anything was sent to the ledger.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::InvalidPayload(_)
                | Self::SelectorCollision { .. }
                | Self::PartId(_)
                | Self::UnknownFacet(_)
                | Self::UnknownAddress(_)
                | Self::Artifact(_)
        )
    }
}

pub type Result<T, E = MasonError> = core::result::Result<T, E>;
