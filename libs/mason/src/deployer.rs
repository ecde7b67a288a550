use std::collections::{BTreeMap, HashSet};

use alloy_primitives::{Address, U256};
use common::log_msg;
use indexmap::IndexMap;

use crate::{
    address::derive_payload_address,
    artifact::ArtifactRegistry,
    error::{MasonError, Result},
    facet::{DeployStrategy, FacetDescriptor},
    interfaces::ICreate2Deployer,
    ledger::{has_code, send_call, LedgerClient},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedFacetRecord {
    pub name: String,
    pub address: Address,
    pub was_freshly_deployed: bool,
}

/// Deployed facets by name, in the order they were deployed.
pub type DeployedFacets = IndexMap<String, DeployedFacetRecord>;

/// Deploys facets at most once.
///
/// Deterministic facets are deployed through the CREATE2 deployer contract
/// and reused when their address already hosts code. Normal facets are
/// deployed on every run, callers that need them reused must pass their
/// addresses via [`FacetDeployer::with_known_addresses()`] and run with
/// `already_deployed` set.
///
/// Facets are deployed one after another, every receipt is awaited before the
/// next transaction is submitted.
pub struct FacetDeployer<'a, L: ?Sized> {
    ledger: &'a L,
    create2_deployer: Address,
    known: BTreeMap<String, Address>,
}

impl<'a, L> FacetDeployer<'a, L>
where
    L: LedgerClient + ?Sized,
{
    pub fn new(ledger: &'a L, create2_deployer: Address) -> Self {
        Self {
            ledger,
            create2_deployer,
            known: BTreeMap::new(),
        }
    }

    pub fn with_known_addresses(
        mut self,
        known: impl IntoIterator<Item = (String, Address)>,
    ) -> Self {
        self.known.extend(known);
        self
    }

    pub fn create2_deployer(&self) -> Address {
        self.create2_deployer
    }

    /// Address of an already deployed facet, without touching the ledger.
    pub fn resolve(&self, descriptor: &FacetDescriptor) -> Result<Address> {
        match descriptor.strategy() {
            DeployStrategy::Deterministic { salt } => Ok(derive_payload_address(
                self.create2_deployer,
                salt,
                descriptor.payload(),
            )),
            DeployStrategy::Normal => self
                .known
                .get(descriptor.name())
                .copied()
                .ok_or_else(|| MasonError::UnknownAddress(descriptor.name().to_owned())),
        }
    }

    pub async fn deploy_facet(&self, descriptor: &FacetDescriptor) -> Result<DeployedFacetRecord> {
        let name = descriptor.name();
        let failed = |reason: String| MasonError::DeploymentFailed {
            facet_name: name.to_owned(),
            reason,
        };

        let (address, was_freshly_deployed) = match descriptor.strategy() {
            DeployStrategy::Deterministic { salt } => {
                let address =
                    derive_payload_address(self.create2_deployer, salt, descriptor.payload());

                if has_code(self.ledger, address).await? {
                    log_msg!("{} already deployed at {}", name, address);
                    (address, false)
                } else {
                    log_msg!("Deploying {} to {}", name, address);
                    let call = ICreate2Deployer::deployCall {
                        value: U256::ZERO,
                        salt,
                        code: descriptor.payload().init_code(),
                    };
                    let receipt = send_call(self.ledger, self.create2_deployer, &call)
                        .await
                        .map_err(|err| failed(err.to_string()))?;
                    tracing::debug!(facet = name, tx = %receipt.tx_hash, status = receipt.status, "CREATE2 deployment");
                    if !receipt.status {
                        return Err(failed(format!("transaction {} reverted", receipt.tx_hash)));
                    }
                    if !has_code(self.ledger, address).await? {
                        return Err(failed(format!("no code at {} after deployment", address)));
                    }
                    (address, true)
                }
            }
            DeployStrategy::Normal => {
                let expected = self.ledger.estimate_address().await?;
                log_msg!("Deploying {} (expected at {})", name, expected);
                let receipt = self
                    .ledger
                    .broadcast_deployment(descriptor.payload().init_code())
                    .await
                    .map_err(|err| failed(err.to_string()))?;
                tracing::debug!(facet = name, tx = %receipt.tx_hash, status = receipt.status, "CREATE deployment");
                if !receipt.status {
                    return Err(failed(format!("transaction {} reverted", receipt.tx_hash)));
                }
                let address = receipt.address.ok_or_else(|| {
                    failed(format!("receipt {} has no contract address", receipt.tx_hash))
                })?;
                (address, true)
            }
        };

        Ok(DeployedFacetRecord {
            name: name.to_owned(),
            address,
            was_freshly_deployed,
        })
    }

    /// Deploy every facet in order, or with `already_deployed` only work out
    /// where they live.
    ///
    /// A failure stops the run. Facets deployed before it stay deployed and a
    /// retry picks them up again.
    pub async fn deploy_facet_set(
        &self,
        descriptors: &[FacetDescriptor],
        already_deployed: bool,
    ) -> Result<DeployedFacets> {
        let mut names = HashSet::new();
        if let Some(dup) = descriptors.iter().find(|d| !names.insert(d.name())) {
            return Err(MasonError::InvalidPayload(format!(
                "facet {} listed twice",
                dup.name()
            )));
        }

        let mut deployed = DeployedFacets::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let record = if already_deployed {
                DeployedFacetRecord {
                    name: descriptor.name().to_owned(),
                    address: self.resolve(descriptor)?,
                    was_freshly_deployed: false,
                }
            } else {
                self.deploy_facet(descriptor).await?
            };
            deployed.insert(record.name.clone(), record);
        }

        let fresh = deployed.values().filter(|r| r.was_freshly_deployed).count();
        log_msg!(
            "Facets ready: {} deployed, {} reused",
            fresh,
            deployed.len() - fresh
        );
        Ok(deployed)
    }
}

/// Name of the CREATE2 deployer contract in the artifact registry.
pub const CREATE2_DEPLOYER: &str = "Create2Deployer";

/// Reuse the CREATE2 deployer at `known` if it has code, otherwise deploy a
/// new one from its artifact.
pub async fn ensure_create2_deployer<L>(
    ledger: &L,
    registry: &ArtifactRegistry,
    known: Option<Address>,
) -> Result<Address>
where
    L: LedgerClient + ?Sized,
{
    if let Some(address) = known {
        if has_code(ledger, address).await? {
            log_msg!("Using {} at {}", CREATE2_DEPLOYER, address);
            return Ok(address);
        }
        log_msg!("No code at {} address {}, deploying a new one", CREATE2_DEPLOYER, address);
    }
    let descriptor = registry.descriptor(CREATE2_DEPLOYER, DeployStrategy::Normal, &IndexMap::new())?;
    let record = FacetDeployer::new(ledger, Address::ZERO)
        .deploy_facet(&descriptor)
        .await?;
    Ok(record.address)
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{bytes, Bytes};

    use super::*;
    use crate::{artifact::CompiledArtifact, testing::MockLedger};

    fn det(name: &str, code: Bytes) -> FacetDescriptor {
        FacetDescriptor::new(
            name,
            code,
            DeployStrategy::deterministic(name, "-test"),
            vec![format!("{}()", name.to_lowercase())],
        )
        .unwrap()
    }

    fn facet_set() -> Vec<FacetDescriptor> {
        vec![
            det("Alpha", bytes!("600a")),
            det("Beta", bytes!("600b")),
            det("Gamma", bytes!("600c")),
        ]
    }

    #[tokio::test]
    async fn test_second_run_reuses_everything() {
        let ledger = MockLedger::new();
        let create2 = ledger.install_create2_deployer();
        let deployer = FacetDeployer::new(&ledger, create2);
        let facets = facet_set();

        let first = deployer.deploy_facet_set(&facets, false).await.unwrap();
        assert!(first.values().all(|r| r.was_freshly_deployed));
        assert_eq!(ledger.broadcasts(), 3);

        let second = deployer.deploy_facet_set(&facets, false).await.unwrap();
        assert!(second.values().all(|r| !r.was_freshly_deployed));
        assert_eq!(ledger.broadcasts(), 3);

        for (a, b) in first.values().zip(second.values()) {
            assert_eq!(a.address, b.address);
        }
        assert_eq!(
            first.keys().collect::<Vec<_>>(),
            vec!["Alpha", "Beta", "Gamma"]
        );
    }

    #[tokio::test]
    async fn test_addresses_match_prediction() {
        let ledger = MockLedger::new();
        let create2 = ledger.install_create2_deployer();
        let deployer = FacetDeployer::new(&ledger, create2);
        let facets = facet_set();

        let deployed = deployer.deploy_facet_set(&facets, false).await.unwrap();
        for facet in &facets {
            assert_eq!(
                Some(deployed[facet.name()].address),
                facet.predicted_address(create2)
            );
        }
    }

    #[tokio::test]
    async fn test_already_deployed_never_broadcasts() {
        let ledger = MockLedger::new();
        let create2 = ledger.install_create2_deployer();
        let normal_address = ledger.install_contract();
        let mut facets = facet_set();
        facets.push(
            FacetDescriptor::new("Notes", bytes!("600d"), DeployStrategy::Normal, vec![]).unwrap(),
        );

        let deployer = FacetDeployer::new(&ledger, create2)
            .with_known_addresses([("Notes".to_owned(), normal_address)]);
        let deployed = deployer.deploy_facet_set(&facets, true).await.unwrap();
        assert_eq!(ledger.broadcasts(), 0);
        assert_eq!(deployed["Notes"].address, normal_address);
        assert_eq!(
            Some(deployed["Beta"].address),
            facets[1].predicted_address(create2)
        );
        assert!(deployed.values().all(|r| !r.was_freshly_deployed));

        let err = FacetDeployer::new(&ledger, create2)
            .deploy_facet_set(&facets, true)
            .await
            .unwrap_err();
        assert!(matches!(err, MasonError::UnknownAddress(x) if x == "Notes"));
    }

    #[tokio::test]
    async fn test_normal_strategy_always_deploys() {
        let ledger = MockLedger::new();
        let create2 = ledger.install_create2_deployer();
        let deployer = FacetDeployer::new(&ledger, create2);
        let notes =
            FacetDescriptor::new("Notes", bytes!("600d"), DeployStrategy::Normal, vec![]).unwrap();

        let expected = ledger.estimate_address().await.unwrap();
        let first = deployer.deploy_facet(&notes).await.unwrap();
        let second = deployer.deploy_facet(&notes).await.unwrap();
        assert_eq!(first.address, expected);
        assert!(first.was_freshly_deployed && second.was_freshly_deployed);
        assert_ne!(first.address, second.address);
    }

    #[tokio::test]
    async fn test_failure_keeps_earlier_facets() {
        let ledger = MockLedger::new();
        let create2 = ledger.install_create2_deployer();
        let deployer = FacetDeployer::new(&ledger, create2);
        let facets = facet_set();
        let beta_code = facets[1].payload().init_code();
        ledger.reject_init_code(beta_code.clone());

        let err = deployer.deploy_facet_set(&facets, false).await.unwrap_err();
        match err {
            MasonError::DeploymentFailed { facet_name, .. } => assert_eq!(facet_name, "Beta"),
            x => panic!("unexpected error: {:?}", x),
        }
        let alpha = facets[0].predicted_address(create2).unwrap();
        assert!(has_code(&ledger, alpha).await.unwrap());

        ledger.accept_init_code(&beta_code);
        let deployed = deployer.deploy_facet_set(&facets, false).await.unwrap();
        assert!(!deployed["Alpha"].was_freshly_deployed);
        assert!(deployed["Beta"].was_freshly_deployed);
        assert!(deployed["Gamma"].was_freshly_deployed);
    }

    #[tokio::test]
    async fn test_normal_deploy_failure() {
        let ledger = MockLedger::new();
        let notes =
            FacetDescriptor::new("Notes", bytes!("600d"), DeployStrategy::Normal, vec![]).unwrap();
        ledger.reject_init_code(notes.payload().init_code());

        let err = FacetDeployer::new(&ledger, Address::ZERO)
            .deploy_facet(&notes)
            .await
            .unwrap_err();
        assert!(matches!(err, MasonError::DeploymentFailed { facet_name, .. } if facet_name == "Notes"));
    }

    #[tokio::test]
    async fn test_duplicate_names_rejected_before_broadcast() {
        let ledger = MockLedger::new();
        let create2 = ledger.install_create2_deployer();
        let facets = vec![det("Alpha", bytes!("600a")), det("Alpha", bytes!("600b"))];

        let err = FacetDeployer::new(&ledger, create2)
            .deploy_facet_set(&facets, false)
            .await
            .unwrap_err();
        assert!(matches!(err, MasonError::InvalidPayload(_)));
        assert_eq!(ledger.broadcasts(), 0);
    }

    #[tokio::test]
    async fn test_ensure_create2_deployer() {
        let ledger = MockLedger::new();
        let existing = ledger.install_create2_deployer();
        let mut registry = ArtifactRegistry::new();
        registry.insert(
            CompiledArtifact::from_json(r#"{ "contractName": "Create2Deployer", "bytecode": "0x60c2" }"#)
                .unwrap(),
        );

        assert_eq!(
            ensure_create2_deployer(&ledger, &ArtifactRegistry::new(), Some(existing))
                .await
                .unwrap(),
            existing
        );
        assert_eq!(ledger.broadcasts(), 0);

        let fresh = ensure_create2_deployer(&ledger, &registry, Some(Address::repeat_byte(7)))
            .await
            .unwrap();
        assert_ne!(fresh, existing);
        assert!(has_code(&ledger, fresh).await.unwrap());
        assert_eq!(ledger.broadcasts(), 1);

        let err = ensure_create2_deployer(&ledger, &ArtifactRegistry::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, MasonError::Artifact(_)));
    }
}
