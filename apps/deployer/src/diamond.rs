use alloy_primitives::Address;
use alloy_sol_types::SolCall;
use common::log_msg;
use indexmap::IndexMap;
use mason::{
    address::encode_constructor_args,
    address_book::AddressBook,
    cut::selector_count,
    deployer::FacetDeployer,
    facet::DeployStrategy,
    interfaces::{CollectionInit, ICollectionInit},
    ledger::LedgerClient,
    upgrade::apply_cut,
};

use crate::deployment::Deployment;

pub struct CollectionParams {
    pub owner: Address,
    pub init_contract: String,
    pub name: String,
    pub symbol: String,
    pub fallback_uri: String,
    pub collection_metadata_uri: String,
}

/// Deploy a collection diamond owning the one-time facets and cut them in,
/// initialising the collection in the same transaction.
pub async fn run_step<L, B>(
    deployment: &mut Deployment<'_, L, B>,
    params: &CollectionParams,
) -> eyre::Result<Address>
where
    L: LedgerClient + ?Sized,
    B: AddressBook,
{
    log_msg!("Step: diamond");
    let one_time = deployment.one_time().await?;
    let deployer = FacetDeployer::new(deployment.ledger, Address::ZERO);

    let diamond = deployment
        .registry
        .descriptor("Diamond", DeployStrategy::Normal, &IndexMap::new())?
        .with_constructor_args(encode_constructor_args(&(
            params.owner,
            one_time.diamond_cut_facet_address,
        )))?;
    let diamond_address = deployer.deploy_facet(&diamond).await?.address;
    log_msg!("Diamond deployed: {}", diamond_address);
    deployment.record("Diamond", diamond_address);

    let init = deployment.registry.descriptor(
        &params.init_contract,
        DeployStrategy::Normal,
        &one_time.library_addresses,
    )?;
    let init_address = deployer.deploy_facet(&init).await?.address;
    log_msg!("{} deployed: {}", params.init_contract, init_address);
    deployment.record(&params.init_contract, init_address);

    let calldata = ICollectionInit::initCall {
        _initStruct: CollectionInit {
            name: params.name.clone(),
            symbol: params.symbol.clone(),
            fallbackURI: params.fallback_uri.clone(),
            collectionMetadataURI: params.collection_metadata_uri.clone(),
        },
        owner: params.owner,
    }
    .abi_encode();

    let outcome = apply_cut(
        deployment.ledger,
        diamond_address,
        &one_time.cut,
        init_address,
        calldata.into(),
    )
    .await?;
    match &outcome.state {
        Some(state) => log_msg!(
            "Diamond {} serves {} selectors ({} cut) after {}",
            diamond_address,
            state.selector_count(),
            selector_count(&one_time.cut),
            outcome.tx_hash
        ),
        None => log_msg!(
            "Diamond {} cut with {} selectors in {}",
            diamond_address,
            selector_count(&one_time.cut),
            outcome.tx_hash
        ),
    }
    Ok(diamond_address)
}
