use alloy_primitives::{Address, Bytes, B256};

use crate::{
    address::{derive_payload_address, salt_for, DeployPayload},
    error::Result,
};

/// How a contract gets its address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployStrategy {
    /// CREATE2 through the deployer contract, address known in advance.
    Deterministic { salt: B256 },
    /// Plain CREATE from the signing account. The address depends on the
    /// account nonce, so re-running deploys again.
    Normal,
}

impl DeployStrategy {
    pub fn deterministic(name: &str, version_suffix: &str) -> Self {
        Self::Deterministic {
            salt: salt_for(name, version_suffix),
        }
    }

    pub fn is_deterministic(&self) -> bool {
        matches!(self, Self::Deterministic { .. })
    }
}

/// A compiled facet (or library) ready to be deployed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetDescriptor {
    name: String,
    payload: DeployPayload,
    strategy: DeployStrategy,
    function_signatures: Vec<String>,
}

impl FacetDescriptor {
    pub fn new(
        name: impl Into<String>,
        bytecode: Bytes,
        strategy: DeployStrategy,
        function_signatures: Vec<String>,
    ) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            payload: DeployPayload::new(bytecode, Bytes::new())?,
            strategy,
            function_signatures,
        })
    }

    pub fn with_constructor_args(self, constructor_args: Bytes) -> Result<Self> {
        Ok(Self {
            payload: DeployPayload::new(self.payload.bytecode().clone(), constructor_args)?,
            ..self
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload(&self) -> &DeployPayload {
        &self.payload
    }

    pub fn strategy(&self) -> DeployStrategy {
        self.strategy
    }

    pub fn function_signatures(&self) -> &[String] {
        &self.function_signatures
    }

    /// Address a deterministic deployment through `create2_deployer` ends up
    /// at, `None` for [`DeployStrategy::Normal`].
    pub fn predicted_address(&self, create2_deployer: Address) -> Option<Address> {
        match self.strategy {
            DeployStrategy::Deterministic { salt } => Some(derive_payload_address(
                create2_deployer,
                salt,
                &self.payload,
            )),
            DeployStrategy::Normal => None,
        }
    }
}
