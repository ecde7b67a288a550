use alloy_primitives::{Address, Bytes, B256};
use ethers::types::{self as eth};

pub mod tx_client;

pub use tx_client::TxClient;

/// Conversion from ethers types into the primitives `mason` works with.
pub trait ToAlloy {
    type Output;

    fn to_alloy(self) -> Self::Output;
}

/// Conversion from `mason` primitives into ethers types.
pub trait ToEthers {
    type Output;

    fn to_ethers(self) -> Self::Output;
}

impl ToAlloy for eth::H160 {
    type Output = Address;

    fn to_alloy(self) -> Address {
        Address::from(self.0)
    }
}

impl ToAlloy for eth::H256 {
    type Output = B256;

    fn to_alloy(self) -> B256 {
        B256::from(self.0)
    }
}

impl ToAlloy for eth::Bytes {
    type Output = Bytes;

    fn to_alloy(self) -> Bytes {
        Bytes::from(self.0)
    }
}

impl ToEthers for Address {
    type Output = eth::H160;

    fn to_ethers(self) -> eth::H160 {
        eth::H160(self.0 .0)
    }
}

impl ToEthers for Bytes {
    type Output = eth::Bytes;

    fn to_ethers(self) -> eth::Bytes {
        eth::Bytes(self.0)
    }
}

impl ToEthers for Vec<u8> {
    type Output = eth::Bytes;

    fn to_ethers(self) -> eth::Bytes {
        eth::Bytes::from(self)
    }
}
