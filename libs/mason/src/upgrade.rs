use alloy_primitives::{Address, Bytes, Selector, B256};
use alloy_sol_types::SolEvent;
use common::log_msg;

use crate::{
    cut::{selector_count, to_facet_cuts, validate_cut_set, CutEntry},
    error::{MasonError, Result},
    interfaces::{IDiamondCut, IDiamondLoupe},
    ledger::{read_call, send_call, LedgerClient},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetSelectors {
    pub facet_address: Address,
    pub selectors: Vec<Selector>,
}

/// Diamond dispatch table as reported by its loupe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiamondState {
    pub address: Address,
    pub facets: Vec<FacetSelectors>,
}

impl DiamondState {
    pub fn facet_of(&self, selector: Selector) -> Option<Address> {
        self.facets
            .iter()
            .find(|f| f.selectors.contains(&selector))
            .map(|f| f.facet_address)
    }

    pub fn selector_count(&self) -> usize {
        self.facets.iter().map(|f| f.selectors.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeOutcome {
    pub tx_hash: B256,
    /// `None` when the diamond could not be read back through its loupe.
    pub state: Option<DiamondState>,
}

pub async fn read_diamond_state<L>(ledger: &L, diamond: Address) -> Result<DiamondState>
where
    L: LedgerClient + ?Sized,
{
    let facets = read_call(ledger, diamond, &IDiamondLoupe::facetsCall {})
        .await?
        .facets_
        .into_iter()
        .map(|f| FacetSelectors {
            facet_address: f.facetAddress,
            selectors: f.functionSelectors,
        })
        .collect();
    Ok(DiamondState {
        address: diamond,
        facets,
    })
}

/// Install `cut` into the diamond and run the initializer, in one transaction.
///
/// The ledger either applies all of it or none of it. A failed receipt is
/// reported as [`MasonError::UpgradeFailed`] and never retried here: sending
/// the same cut again would try to add selectors that may already be there.
pub async fn apply_cut<L>(
    ledger: &L,
    diamond: Address,
    cut: &[CutEntry],
    init_address: Address,
    init_calldata: Bytes,
) -> Result<UpgradeOutcome>
where
    L: LedgerClient + ?Sized,
{
    validate_cut_set(cut)?;
    if init_address.is_zero() && !init_calldata.is_empty() {
        return Err(MasonError::InvalidPayload(
            "initializer calldata given without initializer address".to_owned(),
        ));
    }
    if !init_address.is_zero() && init_calldata.is_empty() {
        return Err(MasonError::InvalidPayload(
            "initializer address given without calldata".to_owned(),
        ));
    }

    log_msg!(
        "Cutting diamond {} ({} facets, {} selectors, init {})",
        diamond,
        cut.len(),
        selector_count(cut),
        init_address
    );

    let call = IDiamondCut::diamondCutCall {
        _diamondCut: to_facet_cuts(cut),
        _init: init_address,
        _calldata: init_calldata,
    };
    let receipt = send_call(ledger, diamond, &call).await?;
    tracing::debug!(diamond = %diamond, tx = %receipt.tx_hash, status = receipt.status, "Diamond cut");
    if !receipt.status {
        return Err(MasonError::UpgradeFailed {
            tx_reference: receipt.tx_hash,
        });
    }

    let emitted = receipt
        .logs
        .iter()
        .any(|log| log.address == diamond && log.topics.first() == Some(&IDiamondCut::DiamondCut::SIGNATURE_HASH));
    if !emitted {
        tracing::warn!(diamond = %diamond, tx = %receipt.tx_hash, "No DiamondCut event in receipt");
    }

    log_msg!("Completed diamond cut in {}", receipt.tx_hash);
    // The cut is committed at this point, a failed readback must not hide that.
    let state = match read_diamond_state(ledger, diamond).await {
        Ok(state) => Some(state),
        Err(err) => {
            tracing::warn!(diamond = %diamond, tx = %receipt.tx_hash, %err, "Cannot read diamond state back");
            None
        }
    };
    Ok(UpgradeOutcome {
        tx_hash: receipt.tx_hash,
        state,
    })
}
