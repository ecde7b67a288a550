use std::{fs, path::PathBuf};

use alloy_primitives::Address;
use clap::Parser;
use common::{
    log::init_logging,
    log_msg,
    part_id::{decode_part_id, encode_part_id, PartKind},
};
use common_ethers::TxClient;
use eyre::{eyre, Context, OptionExt};
use mason::{
    address_book::JsonAddressBook, artifact::ArtifactRegistry, one_time::OneTimeDeployPlan,
};

mod catalog;
mod deployment;
mod diamond;
mod factory;

use deployment::Deployment;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(short, long)]
    rpc_url: Option<String>,

    #[arg(short, long, env = "DEPLOYER_PRIVATE_KEY", hide_env_values = true)]
    private_key: Option<String>,

    /// Hardhat `artifacts/` directory
    #[arg(long, default_value = "artifacts")]
    artifacts: PathBuf,

    /// One-time deployment plan (JSON)
    #[arg(long)]
    plan: Option<PathBuf>,

    #[arg(long, default_value = "deployed-addresses.json")]
    address_book: PathBuf,

    #[arg(long)]
    create2_deployer: Option<Address>,

    #[arg(long)]
    owner: Option<Address>,

    #[arg(long, default_value = "LightmInit")]
    init_contract: String,

    #[arg(long, default_value = "Test")]
    name: String,

    #[arg(long, default_value = "TEST")]
    symbol: String,

    #[arg(long, default_value = "")]
    fallback_uri: String,

    #[arg(long, default_value = "")]
    collection_metadata_uri: String,

    #[arg(long)]
    catalog_address: Option<Address>,

    #[arg(long, default_value = "")]
    catalog_metadata_uri: String,

    #[arg(long, default_value = "image/png")]
    catalog_type: String,

    /// Catalog parts (JSON array)
    #[arg(long)]
    catalog_parts: Option<PathBuf>,

    /// Part ids to encode, as `class:sequence:fixed|slot`
    #[arg(long, value_delimiter = ',')]
    part: Vec<String>,

    #[arg(short, long, value_delimiter = ',')]
    step: Vec<String>,
}

fn encode_parts(parts: &[String]) -> eyre::Result<()> {
    for part in parts {
        let fields: Vec<&str> = part.split(':').collect();
        let [class_id, sequence_id, kind] = fields[..] else {
            return Err(eyre!("Expected class:sequence:kind, got {}", part));
        };
        let id = encode_part_id(
            class_id.parse().context("Invalid class id")?,
            sequence_id.parse().context("Invalid sequence id")?,
            kind.parse::<PartKind>()?,
        )?;
        let (class_id, sequence_id, kind) = decode_part_id(id)?;
        log_msg!(
            "Part {}: class {} sequence {} {:?} ({})",
            id,
            class_id,
            sequence_id,
            kind,
            id.as_u64()
        );
    }
    Ok(())
}

/// Whether any of the steps talks to the chain. No steps at all is an error.
fn needs_ledger(steps: &[String]) -> eyre::Result<bool> {
    if steps.is_empty() {
        return Err(eyre!(
            "No step given, expected some of: create2, one-time, diamond, factory, catalog, part-id"
        ));
    }
    Ok(steps.iter().any(|s| s != "part-id"))
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    init_logging();
    let cli = Cli::parse();

    if !needs_ledger(&cli.step)? {
        encode_parts(&cli.part)?;
        log_msg!("Done.");
        return Ok(());
    }

    let rpc_url = cli.rpc_url.clone().unwrap_or("http://localhost:8545".to_owned());
    let private_key = cli
        .private_key
        .clone()
        .ok_or_eyre("Private key is required")?;
    let get_private_key = || -> String { private_key.clone() };

    let client = TxClient::try_new_from_url(&rpc_url, get_private_key).await?;
    client.begin().await?;

    let registry = ArtifactRegistry::load_dir(&cli.artifacts)
        .with_context(|| format!("Failed to load artifacts from {}", cli.artifacts.display()))?;
    let plan = match &cli.plan {
        Some(path) => OneTimeDeployPlan::from_json(&fs::read_to_string(path)?)?,
        None => OneTimeDeployPlan::default(),
    };
    let book = JsonAddressBook::open(&cli.address_book)?;

    let mut deployment = Deployment::new(&client, registry, plan, book, cli.create2_deployer);

    let result = run_steps(&cli, &client, &mut deployment).await;

    let mut book = deployment.into_book();
    book.save()?;
    log_msg!("Address book saved to {}", book.path().display());

    result?;
    log_msg!("Done.");
    Ok(())
}

async fn run_steps(
    cli: &Cli,
    client: &TxClient,
    deployment: &mut Deployment<'_, TxClient, JsonAddressBook>,
) -> eyre::Result<()> {
    for s in &cli.step {
        match s.as_str() {
            "create2" => {
                let address = deployment.create2_deployer().await?;
                log_msg!("Create2Deployer: {}", address);
            }
            "one-time" => {
                deployment.one_time().await?;
            }
            "diamond" => {
                let params = diamond::CollectionParams {
                    owner: cli.owner.unwrap_or(client.address()),
                    init_contract: cli.init_contract.clone(),
                    name: cli.name.clone(),
                    symbol: cli.symbol.clone(),
                    fallback_uri: cli.fallback_uri.clone(),
                    collection_metadata_uri: cli.collection_metadata_uri.clone(),
                };
                diamond::run_step(deployment, &params).await?;
            }
            "factory" => {
                factory::run_step(deployment).await?;
            }
            "catalog" => {
                let params = catalog::CatalogParams {
                    address: cli.catalog_address,
                    metadata_uri: &cli.catalog_metadata_uri,
                    media_type: &cli.catalog_type,
                    parts: cli
                        .catalog_parts
                        .as_deref()
                        .ok_or_eyre("Catalog parts file is required")?,
                };
                catalog::run_step(deployment, &params).await?;
            }
            "part-id" => {
                encode_parts(&cli.part)?;
            }
            x => {
                Err(eyre!("No such step: {}", x))?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steps(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_needs_ledger() {
        assert!(needs_ledger(&[]).is_err());
        assert!(!needs_ledger(&steps(&["part-id"])).unwrap());
        assert!(needs_ledger(&steps(&["part-id", "catalog"])).unwrap());
        assert!(needs_ledger(&steps(&["create2"])).unwrap());
    }

    #[test]
    fn test_encode_parts() {
        assert!(encode_parts(&steps(&["1:1:fixed", "2:1:slot"])).is_ok());
        assert!(encode_parts(&steps(&["1:1"])).is_err());
        assert!(encode_parts(&steps(&["1:1:hat"])).is_err());
        assert!(encode_parts(&steps(&["70000:1:fixed"])).is_err());
    }
}
