use std::collections::BTreeMap;

use alloy_primitives::Address;
use common::log_msg;
use mason::{
    address_book::AddressBook,
    artifact::ArtifactRegistry,
    deployer::{ensure_create2_deployer, CREATE2_DEPLOYER},
    ledger::LedgerClient,
    one_time::{one_time_deploy, OneTimeDeployPlan, OneTimeDeployResult},
};

/// State shared by the steps of one run. Addresses produced by a step are
/// written to the address book as soon as they are known.
pub struct Deployment<'a, L: ?Sized, B> {
    pub ledger: &'a L,
    pub registry: ArtifactRegistry,
    pub plan: OneTimeDeployPlan,
    book: B,
    create2_deployer: Option<Address>,
    one_time: Option<OneTimeDeployResult>,
}

impl<'a, L, B> Deployment<'a, L, B>
where
    L: LedgerClient + ?Sized,
    B: AddressBook,
{
    pub fn new(
        ledger: &'a L,
        registry: ArtifactRegistry,
        plan: OneTimeDeployPlan,
        book: B,
        create2_deployer: Option<Address>,
    ) -> Self {
        Self {
            ledger,
            registry,
            plan,
            book,
            create2_deployer,
            one_time: None,
        }
    }

    pub fn into_book(self) -> B {
        self.book
    }

    pub fn record(&mut self, name: &str, address: Address) {
        tracing::debug!(name, address = %address, "Recording address");
        self.book.set(name, address);
    }

    pub async fn create2_deployer(&mut self) -> eyre::Result<Address> {
        let known = self.create2_deployer.or_else(|| self.book.get(CREATE2_DEPLOYER));
        let address = ensure_create2_deployer(self.ledger, &self.registry, known).await?;
        self.create2_deployer = Some(address);
        self.record(CREATE2_DEPLOYER, address);
        Ok(address)
    }

    /// Result of the one-time deployment, running it on first use.
    pub async fn one_time(&mut self) -> eyre::Result<OneTimeDeployResult> {
        if let Some(result) = &self.one_time {
            return Ok(result.clone());
        }

        let create2_deployer = self.create2_deployer().await?;
        let known: BTreeMap<String, Address> = self
            .plan
            .use_normal_deploy
            .iter()
            .filter_map(|name| Some((name.clone(), self.book.get(name)?)))
            .collect();
        let result = one_time_deploy(
            self.ledger,
            &self.registry,
            create2_deployer,
            &self.plan,
            &known,
        )
        .await?;

        for (name, address) in &result.library_addresses {
            self.book.set(name, *address);
        }
        let cut_facet = self.plan.diamond_cut_facet.clone();
        self.record(&cut_facet, result.diamond_cut_facet_address);
        for record in result.facets.values() {
            self.book.set(&record.name, record.address);
        }

        log_msg!(
            "One-time deployment: cut facet {}, loupe facet {}",
            result.diamond_cut_facet_address,
            result.diamond_loupe_facet_address
        );
        self.one_time = Some(result.clone());
        Ok(result)
    }
}
