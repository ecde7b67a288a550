use std::{
    collections::BTreeMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use alloy_primitives::Address;

use crate::error::Result;

/// Where deployment steps record the addresses they produce.
pub trait AddressBook {
    fn get(&self, key: &str) -> Option<Address>;

    fn set(&mut self, key: &str, address: Address);

    fn require(&self, key: &str) -> Result<Address> {
        self.get(key)
            .ok_or_else(|| crate::error::MasonError::UnknownAddress(key.to_owned()))
    }
}

impl AddressBook for BTreeMap<String, Address> {
    fn get(&self, key: &str) -> Option<Address> {
        BTreeMap::get(self, key).copied()
    }

    fn set(&mut self, key: &str, address: Address) {
        self.insert(key.to_owned(), address);
    }
}

/// Flat `{ "name": "0x..." }` JSON file. Changes stay in memory until
/// [`JsonAddressBook::save()`].
#[derive(Debug)]
pub struct JsonAddressBook {
    path: PathBuf,
    entries: BTreeMap<String, Address>,
    dirty: bool,
}

impl JsonAddressBook {
    /// A missing file opens as an empty book.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_owned();
        let entries = match fs::read_to_string(&path) {
            Ok(json) => serde_json::from_str(&json)?,
            Err(err) if err.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => Err(err)?,
        };
        Ok(Self {
            path,
            entries,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &BTreeMap<String, Address> {
        &self.entries
    }

    pub fn save(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        fs::write(&self.path, serde_json::to_string_pretty(&self.entries)?)?;
        self.dirty = false;
        tracing::debug!(path = %self.path.display(), entries = self.entries.len(), "Saved address book");
        Ok(())
    }
}

impl AddressBook for JsonAddressBook {
    fn get(&self, key: &str) -> Option<Address> {
        self.entries.get(key).copied()
    }

    fn set(&mut self, key: &str, address: Address) {
        if self.entries.insert(key.to_owned(), address) != Some(address) {
            self.dirty = true;
        }
    }
}
