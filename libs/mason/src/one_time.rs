//! Deploy everything a collection diamond shares with every other one.
//!
//! Libraries come first since facets link against them, then the diamond-cut
//! facet (installed by the diamond's constructor, so never part of the cut),
//! then the facets. The result carries the cut set ready for
//! [`crate::upgrade::apply_cut()`] or a factory constructor.
//!
use std::collections::{BTreeMap, BTreeSet};

use alloy_primitives::Address;
use common::log_msg;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    artifact::ArtifactRegistry,
    cut::{build_cut_set, facet_selectors, selector_count, CutEntry, RemovalSpec},
    deployer::{DeployedFacetRecord, DeployedFacets, FacetDeployer},
    error::{MasonError, Result},
    facet::{DeployStrategy, FacetDescriptor},
    ledger::LedgerClient,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OneTimeDeployPlan {
    /// Appended to every contract name to form its CREATE2 salt.
    pub version_suffix: String,
    pub libraries: Vec<String>,
    pub diamond_cut_facet: String,
    pub diamond_loupe_facet: String,
    pub facet_names: Vec<String>,
    pub use_normal_deploy: BTreeSet<String>,
    pub to_be_removed_functions: RemovalSpec,
    /// Work out addresses only, broadcast nothing.
    pub already_deployed: bool,
}

impl Default for OneTimeDeployPlan {
    fn default() -> Self {
        Self {
            version_suffix: String::new(),
            libraries: vec![
                "LightmValidatorLib".to_owned(),
                "RMRKMultiAssetRenderUtils".to_owned(),
            ],
            diamond_cut_facet: "DiamondCutFacet".to_owned(),
            diamond_loupe_facet: "DiamondLoupeFacet".to_owned(),
            facet_names: [
                "DiamondLoupeFacet",
                "LightmEquippableMultiAssetFacet",
                "LightmEquippableNestableFacet",
                "LightmEquippableFacet",
                "RMRKCollectionMetadataFacet",
                "LightmImpl",
            ]
            .map(String::from)
            .to_vec(),
            use_normal_deploy: BTreeSet::new(),
            to_be_removed_functions: RemovalSpec::new(),
            already_deployed: false,
        }
    }
}

impl OneTimeDeployPlan {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn strategy_for(&self, name: &str) -> DeployStrategy {
        if self.use_normal_deploy.contains(name) {
            DeployStrategy::Normal
        } else {
            DeployStrategy::deterministic(name, &self.version_suffix)
        }
    }

    fn check(&self) -> Result<()> {
        if !self.facet_names.contains(&self.diamond_loupe_facet) {
            return Err(MasonError::UnknownFacet(self.diamond_loupe_facet.clone()));
        }
        if self.facet_names.contains(&self.diamond_cut_facet) {
            return Err(MasonError::InvalidPayload(format!(
                "{} is installed by the diamond constructor and cannot be cut in",
                self.diamond_cut_facet
            )));
        }
        let mut names = BTreeSet::new();
        if let Some(dup) = self
            .contract_names()
            .find(|name| !names.insert(*name))
        {
            return Err(MasonError::InvalidPayload(format!("{} listed twice", dup)));
        }
        Ok(())
    }

    /// Libraries, the cut facet and the facets, in deployment order.
    pub fn contract_names(&self) -> impl Iterator<Item = &str> {
        self.libraries
            .iter()
            .chain(std::iter::once(&self.diamond_cut_facet))
            .chain(self.facet_names.iter())
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneTimeDeployResult {
    pub diamond_cut_facet_address: Address,
    pub diamond_loupe_facet_address: Address,
    pub library_addresses: IndexMap<String, Address>,
    pub facets: DeployedFacets,
    pub cut: Vec<CutEntry>,
}

impl OneTimeDeployResult {
    pub fn facet_address(&self, name: &str) -> Result<Address> {
        self.facets
            .get(name)
            .map(|record| record.address)
            .ok_or_else(|| MasonError::UnknownFacet(name.to_owned()))
    }

    pub fn library_address(&self, name: &str) -> Result<Address> {
        self.library_addresses
            .get(name)
            .copied()
            .ok_or_else(|| MasonError::UnknownAddress(name.to_owned()))
    }
}

async fn place<L>(
    deployer: &FacetDeployer<'_, L>,
    descriptor: &FacetDescriptor,
    already_deployed: bool,
) -> Result<DeployedFacetRecord>
where
    L: LedgerClient + ?Sized,
{
    if already_deployed {
        Ok(DeployedFacetRecord {
            name: descriptor.name().to_owned(),
            address: deployer.resolve(descriptor)?,
            was_freshly_deployed: false,
        })
    } else {
        deployer.deploy_facet(descriptor).await
    }
}

/// Deploy (or locate) libraries, the cut facet and every facet of `plan`,
/// then build the cut set.
///
/// `known` supplies addresses of normal-strategy contracts for runs with
/// `already_deployed` set.
pub async fn one_time_deploy<L>(
    ledger: &L,
    registry: &ArtifactRegistry,
    create2_deployer: Address,
    plan: &OneTimeDeployPlan,
    known: &BTreeMap<String, Address>,
) -> Result<OneTimeDeployResult>
where
    L: LedgerClient + ?Sized,
{
    plan.check()?;
    for name in plan.contract_names() {
        registry.get(name)?;
    }
    let signatures = plan
        .facet_names
        .iter()
        .map(|name| -> Result<_> { Ok((name.as_str(), registry.get(name)?.function_signatures())) })
        .collect::<Result<Vec<_>>>()?;
    facet_selectors(
        signatures.iter().map(|(name, sigs)| (*name, sigs.as_slice())),
        &plan.to_be_removed_functions,
    )?;

    let deployer = FacetDeployer::new(ledger, create2_deployer)
        .with_known_addresses(known.iter().map(|(k, v)| (k.clone(), *v)));

    let mut library_addresses = IndexMap::new();
    for name in &plan.libraries {
        let descriptor = registry.descriptor(name, plan.strategy_for(name), &library_addresses)?;
        let record = place(&deployer, &descriptor, plan.already_deployed).await?;
        library_addresses.insert(record.name, record.address);
    }

    let cut_facet = registry.descriptor(
        &plan.diamond_cut_facet,
        plan.strategy_for(&plan.diamond_cut_facet),
        &library_addresses,
    )?;
    let diamond_cut_facet_address = place(&deployer, &cut_facet, plan.already_deployed)
        .await?
        .address;

    let descriptors = plan
        .facet_names
        .iter()
        .map(|name| registry.descriptor(name, plan.strategy_for(name), &library_addresses))
        .collect::<Result<Vec<_>>>()?;
    let facets = deployer
        .deploy_facet_set(&descriptors, plan.already_deployed)
        .await?;

    let cut = build_cut_set(&descriptors, &facets, &plan.to_be_removed_functions)?;
    let diamond_loupe_facet_address = facets
        .get(&plan.diamond_loupe_facet)
        .map(|record| record.address)
        .ok_or_else(|| MasonError::UnknownFacet(plan.diamond_loupe_facet.clone()))?;

    log_msg!(
        "One-time deployment ready: {} libraries, {} facets, {} selectors",
        library_addresses.len(),
        facets.len(),
        selector_count(&cut)
    );

    Ok(OneTimeDeployResult {
        diamond_cut_facet_address,
        diamond_loupe_facet_address,
        library_addresses,
        facets,
        cut,
    })
}
