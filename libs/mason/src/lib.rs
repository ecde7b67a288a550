//! Deterministic deployment and cut orchestration for ERC-2535 diamonds.
//!
//! Facets are deployed at most once through a CREATE2 deployer contract, their
//! selectors are gathered into a cut set and the cut is installed into a
//! diamond in a single transaction. All chain access goes through
//! [`ledger::LedgerClient`].

pub mod address;
pub mod address_book;
pub mod artifact;
pub mod catalog;
pub mod cut;
pub mod deployer;
pub mod error;
pub mod facet;
pub mod interfaces;
pub mod ledger;
pub mod one_time;
pub mod upgrade;

#[cfg(test)]
mod testing;

pub use error::{MasonError, Result};
