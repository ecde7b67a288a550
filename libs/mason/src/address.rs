//! Deterministic (CREATE2) address derivation.
//!
//! ```text
//! payload = bytecode ++ abi_encode(constructor_args)
//! address = keccak256(0xff ++ deployer ++ salt ++ keccak256(payload))[12..]
//! ```
//!
//! Nothing here talks to a ledger, callers use it to decide whether a
//! deployment is needed at all.
//!
use alloy_primitives::{keccak256, Address, Bytes, B256};
use alloy_sol_types::{abi::TokenSeq, SolType, SolValue};

use crate::error::{MasonError, Result};

/// Bytecode plus ABI-encoded constructor arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployPayload {
    bytecode: Bytes,
    constructor_args: Bytes,
}

impl DeployPayload {
    pub fn new(bytecode: Bytes, constructor_args: Bytes) -> Result<Self> {
        if bytecode.is_empty() {
            return Err(MasonError::InvalidPayload(
                "bytecode image is empty".to_owned(),
            ));
        }
        Ok(Self {
            bytecode,
            constructor_args,
        })
    }

    pub fn bytecode(&self) -> &Bytes {
        &self.bytecode
    }

    pub fn constructor_args(&self) -> &Bytes {
        &self.constructor_args
    }

    /// Full init code submitted to the chain.
    pub fn init_code(&self) -> Bytes {
        [self.bytecode.as_ref(), self.constructor_args.as_ref()]
            .concat()
            .into()
    }

    pub fn init_code_hash(&self) -> B256 {
        keccak256(self.init_code())
    }
}

/// Encode constructor arguments the way the ABI expects them after the
/// bytecode, i.e. as a parameter list.
///
/// A single struct argument must be passed as a one-element tuple: `(params,)`.
pub fn encode_constructor_args<T: SolValue>(args: &T) -> Bytes
where
    for<'a> <<T as SolValue>::SolType as SolType>::Token<'a>: TokenSeq<'a>,
{
    args.abi_encode_params().into()
}

/// Salt used for a named contract, `keccak256(name ++ version_suffix)`.
pub fn salt_for(name: &str, version_suffix: &str) -> B256 {
    keccak256(format!("{}{}", name, version_suffix))
}

pub fn derive_address(
    deployer: Address,
    salt: B256,
    bytecode: &[u8],
    constructor_args: &[u8],
) -> Result<Address> {
    let payload = DeployPayload::new(
        Bytes::copy_from_slice(bytecode),
        Bytes::copy_from_slice(constructor_args),
    )?;
    Ok(derive_payload_address(deployer, salt, &payload))
}

pub fn derive_payload_address(deployer: Address, salt: B256, payload: &DeployPayload) -> Address {
    deployer.create2(salt.0, payload.init_code_hash().0)
}
