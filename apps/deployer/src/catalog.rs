use std::{fs, path::Path};

use alloy_primitives::Address;
use common::log_msg;
use eyre::Context;
use indexmap::IndexMap;
use mason::{
    address::encode_constructor_args,
    address_book::AddressBook,
    catalog::{populate_catalog, CatalogPart},
    deployer::FacetDeployer,
    facet::DeployStrategy,
    ledger::LedgerClient,
};

use crate::deployment::Deployment;

const CATALOG: &str = "LightmCatalogImplementer";

pub struct CatalogParams<'a> {
    pub address: Option<Address>,
    pub metadata_uri: &'a str,
    pub media_type: &'a str,
    pub parts: &'a Path,
}

/// Add the parts listed in a JSON file to a catalog, deploying the catalog
/// first when there is none yet.
pub async fn run_step<L, B>(
    deployment: &mut Deployment<'_, L, B>,
    params: &CatalogParams<'_>,
) -> eyre::Result<Address>
where
    L: LedgerClient + ?Sized,
    B: AddressBook,
{
    log_msg!("Step: catalog");
    let json = fs::read_to_string(params.parts)
        .with_context(|| format!("Failed to read {}", params.parts.display()))?;
    let parts: Vec<CatalogPart> = serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse {}", params.parts.display()))?;
    mason::catalog::validate_parts(&parts)?;

    let address = match params.address {
        Some(address) => address,
        None => {
            let descriptor = deployment
                .registry
                .descriptor(CATALOG, DeployStrategy::Normal, &IndexMap::new())?
                .with_constructor_args(encode_constructor_args(&(
                    params.metadata_uri.to_owned(),
                    params.media_type.to_owned(),
                )))?;
            let record = FacetDeployer::new(deployment.ledger, Address::ZERO)
                .deploy_facet(&descriptor)
                .await?;
            log_msg!("Deployed catalog at {}", record.address);
            record.address
        }
    };
    deployment.record(CATALOG, address);

    populate_catalog(deployment.ledger, address, &parts).await?;
    log_msg!("Catalog {} now holds {} more parts", address, parts.len());
    Ok(address)
}
