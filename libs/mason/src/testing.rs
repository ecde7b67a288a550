//! In-memory ledger for tests.
//!
//! Knows three kinds of contracts: a CREATE2 deployer, ERC-2535 diamonds and
//! plain contracts that accept and record any call. A diamond cut is applied
//! to a copy of the selector table and only committed when every entry and
//! the initializer succeed.
//!
use std::{
    collections::{HashMap, HashSet},
    sync::{Mutex, MutexGuard},
};

use alloy_primitives::{address, keccak256, Address, Bytes, Selector, B256, U256};
use alloy_sol_types::{SolCall, SolEvent};
use async_trait::async_trait;
use indexmap::IndexMap;

use crate::{
    cut::{CutEntry, FacetCutAction},
    interfaces::{Facet, ICreate2Deployer, IDiamondCut, IDiamondLoupe},
    ledger::{CallReceipt, DeployReceipt, LedgerClient, LedgerError, LedgerLog},
};

pub(crate) const DETERMINISTIC_DEPLOYER: Address = address!("4e59b44847b379578588920cA78FbF26c0B4956C");

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RecordedCall {
    pub to: Address,
    pub selector: Selector,
    pub args: Bytes,
}

#[derive(Default)]
struct MockState {
    nonce: u64,
    tx_count: u64,
    broadcasts: usize,
    code: HashMap<Address, Bytes>,
    create2_deployers: HashSet<Address>,
    diamonds: HashMap<Address, IndexMap<Selector, Address>>,
    rejected_code: HashSet<Bytes>,
    failing_initializers: HashSet<Address>,
    calls: Vec<RecordedCall>,
}

impl MockState {
    fn next_tx(&mut self) -> B256 {
        self.tx_count += 1;
        self.broadcasts += 1;
        keccak256(self.tx_count.to_be_bytes())
    }

    fn has_code(&self, address: &Address) -> bool {
        self.code.get(address).map_or(false, |code| !code.is_empty())
    }

    fn apply_cut(
        &self,
        table: &mut IndexMap<Selector, Address>,
        entries: Vec<CutEntry>,
    ) -> Result<(), &'static str> {
        for entry in entries {
            match entry.action {
                FacetCutAction::Add | FacetCutAction::Replace => {
                    if entry.facet_address.is_zero() {
                        return Err("facet can't be address(0)");
                    }
                    if !self.has_code(&entry.facet_address) {
                        return Err("new facet has no code");
                    }
                }
                FacetCutAction::Remove => {
                    if !entry.facet_address.is_zero() {
                        return Err("remove facet address must be address(0)");
                    }
                }
            }
            for fun_sel in entry.selectors {
                match (entry.action, table.get(&fun_sel)) {
                    (FacetCutAction::Add, None) => {
                        table.insert(fun_sel, entry.facet_address);
                    }
                    (FacetCutAction::Add, Some(_)) => {
                        return Err("can't add function that already exists")
                    }
                    (FacetCutAction::Replace, Some(old)) if *old != entry.facet_address => {
                        table.insert(fun_sel, entry.facet_address);
                    }
                    (FacetCutAction::Replace, _) => return Err("can't replace function"),
                    (FacetCutAction::Remove, Some(_)) => {
                        table.shift_remove(&fun_sel);
                    }
                    (FacetCutAction::Remove, None) => {
                        return Err("can't remove function that doesn't exist")
                    }
                }
            }
        }
        Ok(())
    }
}

pub(crate) struct MockLedger {
    identity: Address,
    state: Mutex<MockState>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            identity: address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266"),
            state: Mutex::new(MockState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    fn next_create_address(&self, state: &mut MockState) -> Address {
        let address = self.identity.create(state.nonce);
        state.nonce += 1;
        address
    }

    pub fn install_create2_deployer(&self) -> Address {
        let mut state = self.state();
        state.code.insert(DETERMINISTIC_DEPLOYER, Bytes::from_static(&[0xc2]));
        state.create2_deployers.insert(DETERMINISTIC_DEPLOYER);
        DETERMINISTIC_DEPLOYER
    }

    pub fn install_diamond(&self) -> Address {
        let mut state = self.state();
        let address = self.next_create_address(&mut state);
        state.code.insert(address, Bytes::from_static(&[0xd1]));
        state.diamonds.insert(address, IndexMap::new());
        address
    }

    pub fn install_contract(&self) -> Address {
        let mut state = self.state();
        let address = self.next_create_address(&mut state);
        state.code.insert(address, Bytes::from_static(&[0xc0]));
        address
    }

    pub fn reject_init_code(&self, init_code: Bytes) {
        self.state().rejected_code.insert(init_code);
    }

    pub fn accept_init_code(&self, init_code: &Bytes) {
        self.state().rejected_code.remove(init_code);
    }

    pub fn fail_initializer(&self, address: Address) {
        self.state().failing_initializers.insert(address);
    }

    pub fn broadcasts(&self) -> usize {
        self.state().broadcasts
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state().calls.clone()
    }

    pub fn diamond_table(&self, diamond: Address) -> IndexMap<Selector, Address> {
        self.state()
            .diamonds
            .get(&diamond)
            .cloned()
            .unwrap_or_default()
    }

    fn reverted(tx_hash: B256) -> CallReceipt {
        CallReceipt {
            tx_hash,
            status: false,
            return_data: Bytes::new(),
            logs: Vec::new(),
        }
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    fn identity(&self) -> Address {
        self.identity
    }

    async fn estimate_address(&self) -> Result<Address, LedgerError> {
        Ok(self.identity.create(self.state().nonce))
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, LedgerError> {
        Ok(self.state().code.get(&address).cloned().unwrap_or_default())
    }

    async fn broadcast_deployment(&self, payload: Bytes) -> Result<DeployReceipt, LedgerError> {
        let mut state = self.state();
        let tx_hash = state.next_tx();
        let address = self.next_create_address(&mut state);
        if payload.is_empty() || state.rejected_code.contains(&payload) {
            return Ok(DeployReceipt {
                tx_hash,
                address: None,
                status: false,
            });
        }
        state.code.insert(address, payload);
        Ok(DeployReceipt {
            tx_hash,
            address: Some(address),
            status: true,
        })
    }

    async fn broadcast_call(
        &self,
        to: Address,
        selector: Selector,
        args: Bytes,
    ) -> Result<CallReceipt, LedgerError> {
        let mut state = self.state();
        let tx_hash = state.next_tx();
        state.nonce += 1;

        if state.create2_deployers.contains(&to) && selector == Selector::from(ICreate2Deployer::deployCall::SELECTOR)
        {
            let call = ICreate2Deployer::deployCall::abi_decode_raw(&args, true)
                .map_err(|err| LedgerError::Rejected(err.to_string()))?;
            let target = to.create2(call.salt.0, keccak256(&call.code).0);
            if call.value != U256::ZERO
                || state.has_code(&target)
                || state.rejected_code.contains(&call.code)
            {
                return Ok(Self::reverted(tx_hash));
            }
            state.code.insert(target, call.code);
            return Ok(CallReceipt {
                tx_hash,
                status: true,
                return_data: Bytes::new(),
                logs: Vec::new(),
            });
        }

        if state.diamonds.contains_key(&to) && selector == Selector::from(IDiamondCut::diamondCutCall::SELECTOR) {
            let call = IDiamondCut::diamondCutCall::abi_decode_raw(&args, true)
                .map_err(|err| LedgerError::Rejected(err.to_string()))?;
            let entries: Result<Vec<CutEntry>, _> = call
                ._diamondCut
                .iter()
                .cloned()
                .map(CutEntry::try_from)
                .collect();
            let Ok(entries) = entries else {
                return Ok(Self::reverted(tx_hash));
            };
            let mut table = state.diamonds[&to].clone();
            if state.apply_cut(&mut table, entries).is_err() {
                return Ok(Self::reverted(tx_hash));
            }
            if call._init.is_zero() != call._calldata.is_empty()
                || (!call._init.is_zero()
                    && (!state.has_code(&call._init)
                        || state.failing_initializers.contains(&call._init)))
            {
                return Ok(Self::reverted(tx_hash));
            }
            state.diamonds.insert(to, table);

            let event = IDiamondCut::DiamondCut {
                _diamondCut: call._diamondCut,
                _init: call._init,
                _calldata: call._calldata,
            }
            .encode_log_data();
            return Ok(CallReceipt {
                tx_hash,
                status: true,
                return_data: Bytes::new(),
                logs: vec![LedgerLog {
                    address: to,
                    topics: event.topics().to_vec(),
                    data: event.data,
                }],
            });
        }

        state.calls.push(RecordedCall { to, selector, args });
        Ok(CallReceipt {
            tx_hash,
            status: true,
            return_data: Bytes::new(),
            logs: Vec::new(),
        })
    }

    async fn read(
        &self,
        to: Address,
        selector: Selector,
        _args: Bytes,
    ) -> Result<Bytes, LedgerError> {
        let state = self.state();
        let facets_selector = Selector::from(IDiamondLoupe::facetsCall::SELECTOR);
        match state.diamonds.get(&to) {
            // A diamond only answers the loupe once a loupe facet is cut in.
            Some(table) if selector == facets_selector && table.contains_key(&facets_selector) => {
                let mut facets: IndexMap<Address, Vec<Selector>> = IndexMap::new();
                for (fun_sel, facet) in table {
                    facets.entry(*facet).or_default().push(*fun_sel);
                }
                let facets: Vec<Facet> = facets
                    .into_iter()
                    .map(|(facet_address, selectors)| Facet {
                        facetAddress: facet_address,
                        functionSelectors: selectors,
                    })
                    .collect();
                Ok(IDiamondLoupe::facetsCall::abi_encode_returns(&(facets,)).into())
            }
            Some(_) => Err(LedgerError::Rejected(
                "Diamond: Function does not exist".to_owned(),
            )),
            None => Err(LedgerError::Rejected("execution reverted".to_owned())),
        }
    }
}
