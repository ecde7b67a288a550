use std::collections::{hash_map::Entry, BTreeMap, BTreeSet, HashMap};

use alloy_primitives::{keccak256, Address, Selector};
use serde::{Deserialize, Serialize};

use crate::{
    deployer::DeployedFacets,
    error::{MasonError, Result},
    facet::FacetDescriptor,
    interfaces::FacetCut,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FacetCutAction {
    Add = 0,
    Replace = 1,
    Remove = 2,
}

impl TryFrom<u8> for FacetCutAction {
    type Error = MasonError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Add),
            1 => Ok(Self::Replace),
            2 => Ok(Self::Remove),
            x => Err(MasonError::InvalidPayload(format!(
                "unknown facet cut action {}",
                x
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CutEntry {
    pub facet_address: Address,
    pub action: FacetCutAction,
    pub selectors: Vec<Selector>,
}

impl CutEntry {
    pub fn add(facet_address: Address, selectors: Vec<Selector>) -> Self {
        Self {
            facet_address,
            action: FacetCutAction::Add,
            selectors,
        }
    }

    pub fn replace(facet_address: Address, selectors: Vec<Selector>) -> Self {
        Self {
            facet_address,
            action: FacetCutAction::Replace,
            selectors,
        }
    }

    /// Removal entries always point at the zero address.
    pub fn remove(selectors: Vec<Selector>) -> Self {
        Self {
            facet_address: Address::ZERO,
            action: FacetCutAction::Remove,
            selectors,
        }
    }
}

impl From<&CutEntry> for FacetCut {
    fn from(entry: &CutEntry) -> Self {
        FacetCut {
            facetAddress: entry.facet_address,
            action: entry.action as u8,
            functionSelectors: entry.selectors.clone(),
        }
    }
}

impl TryFrom<FacetCut> for CutEntry {
    type Error = MasonError;

    fn try_from(cut: FacetCut) -> Result<Self> {
        Ok(Self {
            facet_address: cut.facetAddress,
            action: cut.action.try_into()?,
            selectors: cut.functionSelectors,
        })
    }
}

pub fn to_facet_cuts(cut: &[CutEntry]) -> Vec<FacetCut> {
    cut.iter().map(FacetCut::from).collect()
}

/// First four bytes of `keccak256(signature)`.
pub fn selector(signature: &str) -> Selector {
    Selector::from_slice(&keccak256(signature.as_bytes())[..4])
}

pub fn selector_count(cut: &[CutEntry]) -> usize {
    cut.iter().map(|entry| entry.selectors.len()).sum()
}

/// Signatures to leave out of a facet's contribution, by facet name.
///
/// Naming a signature the facet does not expose is not an error, the entry is
/// simply ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemovalSpec(BTreeMap<String, BTreeSet<String>>);

impl RemovalSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remove(mut self, facet: impl Into<String>, signature: impl Into<String>) -> Self {
        self.insert(facet, signature);
        self
    }

    pub fn insert(&mut self, facet: impl Into<String>, signature: impl Into<String>) {
        self.0
            .entry(facet.into())
            .or_default()
            .insert(signature.into());
    }

    pub fn removed_from(&self, facet: &str) -> Option<&BTreeSet<String>> {
        self.0.get(facet)
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeSet::is_empty)
    }
}

/// Selectors each facet contributes once `removal` is applied, in the order
/// the facets are given. Needs no addresses, so collisions surface before
/// anything is deployed.
///
/// Facets left with no selectors are skipped. Two facets exposing the same
/// selector is an error, there is no way to tell which one the diamond should
/// dispatch to.
pub fn facet_selectors<'a, I>(
    facets: I,
    removal: &RemovalSpec,
) -> Result<Vec<(&'a str, Vec<Selector>)>>
where
    I: IntoIterator<Item = (&'a str, &'a [String])>,
{
    let mut owners: HashMap<Selector, &str> = HashMap::new();
    let mut contributions = Vec::new();

    for (name, signatures) in facets {
        let removed = removal.removed_from(name);

        if let Some(removed) = removed {
            for signature in removed {
                if !signatures.contains(signature) {
                    tracing::debug!(facet = name, signature = %signature, "Removed function not exposed by facet");
                }
            }
        }

        let mut selectors = Vec::new();
        for signature in signatures {
            if removed.map_or(false, |x| x.contains(signature)) {
                continue;
            }
            let fun_sel = selector(signature);
            match owners.entry(fun_sel) {
                Entry::Occupied(owner) => {
                    return Err(MasonError::SelectorCollision {
                        selector: fun_sel,
                        facet_a: (*owner.get()).to_owned(),
                        facet_b: name.to_owned(),
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(name);
                }
            }
            selectors.push(fun_sel);
        }

        if selectors.is_empty() {
            tracing::debug!(facet = name, "Facet contributes no selectors, left out of cut");
            continue;
        }
        contributions.push((name, selectors));
    }

    Ok(contributions)
}

/// Build one `Add` entry per facet, in the order the facets are given, see
/// [`facet_selectors()`].
pub fn build_cut_set(
    facets: &[FacetDescriptor],
    deployed: &DeployedFacets,
    removal: &RemovalSpec,
) -> Result<Vec<CutEntry>> {
    if let Some(missing) = facets.iter().find(|f| !deployed.contains_key(f.name())) {
        return Err(MasonError::UnknownFacet(missing.name().to_owned()));
    }
    let named = facets.iter().map(|f| (f.name(), f.function_signatures()));
    Ok(facet_selectors(named, removal)?
        .into_iter()
        .map(|(name, selectors)| CutEntry::add(deployed[name].address, selectors))
        .collect())
}

/// Check a cut set before it is sent anywhere.
pub fn validate_cut_set(cut: &[CutEntry]) -> Result<()> {
    let mut owners: HashMap<Selector, Address> = HashMap::new();
    for entry in cut {
        if entry.selectors.is_empty() {
            return Err(MasonError::InvalidPayload(format!(
                "cut entry for {} has no selectors",
                entry.facet_address
            )));
        }
        match entry.action {
            FacetCutAction::Remove if !entry.facet_address.is_zero() => {
                return Err(MasonError::InvalidPayload(
                    "remove entry must use the zero address".to_owned(),
                ));
            }
            FacetCutAction::Add | FacetCutAction::Replace if entry.facet_address.is_zero() => {
                return Err(MasonError::InvalidPayload(format!(
                    "{:?} entry must name a facet address",
                    entry.action
                )));
            }
            _ => {}
        }
        for fun_sel in &entry.selectors {
            if let Some(owner) = owners.insert(*fun_sel, entry.facet_address) {
                return Err(MasonError::SelectorCollision {
                    selector: *fun_sel,
                    facet_a: owner.to_string(),
                    facet_b: entry.facet_address.to_string(),
                });
            }
        }
    }
    Ok(())
}
