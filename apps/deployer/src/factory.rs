use alloy_primitives::Address;
use common::log_msg;
use mason::{
    address::encode_constructor_args,
    address_book::AddressBook,
    cut::{selector_count, to_facet_cuts},
    deployer::FacetDeployer,
    interfaces::FactoryConstructParams,
    ledger::LedgerClient,
};

use crate::deployment::Deployment;

const FACTORY: &str = "LightmUniversalFactory";
const INIT_CONTRACT: &str = "LightmInit";

/// Deterministically deploy the universal factory, which builds collection
/// diamonds on chain from the one-time facets and their cut.
pub async fn run_step<L, B>(deployment: &mut Deployment<'_, L, B>) -> eyre::Result<Address>
where
    L: LedgerClient + ?Sized,
    B: AddressBook,
{
    log_msg!("Step: factory");
    let create2_deployer = deployment.create2_deployer().await?;
    let one_time = deployment.one_time().await?;
    let deployer = FacetDeployer::new(deployment.ledger, create2_deployer);

    let init = deployment.registry.descriptor(
        INIT_CONTRACT,
        deployment.plan.strategy_for(INIT_CONTRACT),
        &one_time.library_addresses,
    )?;
    let init_address = deployer.deploy_facet(&init).await?.address;
    deployment.record(INIT_CONTRACT, init_address);

    let params = FactoryConstructParams {
        validatorLibAddress: one_time.library_address("LightmValidatorLib")?,
        maRenderUtilsAddress: one_time.library_address("RMRKMultiAssetRenderUtils")?,
        diamondCutFacetAddress: one_time.diamond_cut_facet_address,
        diamondLoupeFacetAddress: one_time.diamond_loupe_facet_address,
        nestableFacetAddress: one_time.facet_address("LightmEquippableNestableFacet")?,
        multiAssetFacetAddress: one_time.facet_address("LightmEquippableMultiAssetFacet")?,
        equippableFacetAddress: one_time.facet_address("LightmEquippableFacet")?,
        collectionMetadataFacetAddress: one_time.facet_address("RMRKCollectionMetadataFacet")?,
        initContractAddress: init_address,
        implContractAddress: one_time.facet_address("LightmImpl")?,
        cuts: to_facet_cuts(&one_time.cut),
    };

    let factory = deployment
        .registry
        .descriptor(
            FACTORY,
            deployment.plan.strategy_for(FACTORY),
            &one_time.library_addresses,
        )?
        .with_constructor_args(encode_constructor_args(&(params,)))?;
    let record = deployer.deploy_facet(&factory).await?;
    deployment.record(FACTORY, record.address);

    log_msg!(
        "{} at {} with {} function selectors",
        FACTORY,
        record.address,
        selector_count(&one_time.cut)
    );
    Ok(record.address)
}
