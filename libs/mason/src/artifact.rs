//! Compiled contract artifacts (Hardhat layout).
//!
//! Function signatures are taken from the `abi` array in declaration order,
//! which keeps selector lists and cut sets reproducible between runs.
//!
use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::Path,
};

use alloy_primitives::{hex, Address, Bytes};
use indexmap::IndexMap;
use itertools::Itertools;
use serde::Deserialize;

use crate::{
    error::{MasonError, Result},
    facet::{DeployStrategy, FacetDescriptor},
};

#[derive(Debug, Clone, Deserialize)]
pub struct AbiParam {
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub components: Vec<AbiParam>,
}

impl AbiParam {
    /// Type as it appears in a canonical signature, tuples expanded.
    pub fn canonical_type(&self) -> String {
        match self.ty.strip_prefix("tuple") {
            Some(array_suffix) => format!(
                "({}){}",
                self.components.iter().map(|c| c.canonical_type()).join(","),
                array_suffix
            ),
            None => self.ty.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AbiItem {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub inputs: Vec<AbiParam>,
}

impl AbiItem {
    pub fn function_signature(&self) -> Option<String> {
        if self.kind != "function" {
            return None;
        }
        let name = self.name.as_deref()?;
        Some(format!(
            "{}({})",
            name,
            self.inputs.iter().map(|p| p.canonical_type()).join(",")
        ))
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LinkOffset {
    pub start: usize,
    pub length: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledArtifact {
    pub contract_name: String,
    #[serde(default)]
    pub abi: Vec<AbiItem>,
    pub bytecode: String,
    /// source file => library name => placeholder positions (in bytes)
    #[serde(default)]
    pub link_references: BTreeMap<String, BTreeMap<String, Vec<LinkOffset>>>,
}

impl CompiledArtifact {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn function_signatures(&self) -> Vec<String> {
        self.abi
            .iter()
            .filter_map(|item| item.function_signature())
            .collect()
    }

    pub fn library_names(&self) -> impl Iterator<Item = &str> {
        self.link_references
            .values()
            .flat_map(|libs| libs.keys().map(String::as_str))
    }

    /// Bytecode with every library placeholder replaced by its address.
    pub fn linked_bytecode(&self, libraries: &IndexMap<String, Address>) -> Result<Bytes> {
        let mut code = self
            .bytecode
            .strip_prefix("0x")
            .unwrap_or(&self.bytecode)
            .to_owned();
        // Link offsets index into the hex text, which must be one byte per char.
        if !code.is_ascii() {
            return Err(MasonError::Artifact(format!(
                "{}: bytecode is not hex text",
                self.contract_name
            )));
        }

        for (library, offsets) in self.link_references.values().flatten() {
            let address = libraries.get(library).ok_or_else(|| {
                MasonError::Artifact(format!(
                    "{} needs library {} which was not supplied",
                    self.contract_name, library
                ))
            })?;
            let address_hex = hex::encode(address);
            for offset in offsets {
                let (start, end) = (offset.start * 2, (offset.start + offset.length) * 2);
                if offset.length != Address::len_bytes() || end > code.len() {
                    return Err(MasonError::Artifact(format!(
                        "{}: bad link reference for {} at {}",
                        self.contract_name, library, offset.start
                    )));
                }
                code.replace_range(start..end, &address_hex);
            }
        }

        if code.contains("__") {
            return Err(MasonError::Artifact(format!(
                "{}: bytecode has unresolved library placeholders",
                self.contract_name
            )));
        }

        let bytes = hex::decode(&code)
            .map_err(|err| MasonError::Artifact(format!("{}: {}", self.contract_name, err)))?;
        Ok(bytes.into())
    }
}

/// Artifacts by contract name.
#[derive(Debug, Default, Clone)]
pub struct ArtifactRegistry {
    artifacts: HashMap<String, CompiledArtifact>,
}

impl ArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, artifact: CompiledArtifact) {
        self.artifacts
            .insert(artifact.contract_name.clone(), artifact);
    }

    /// Walk a Hardhat `artifacts/` tree. Debug files and `build-info` are
    /// skipped, as is any JSON that is not a contract artifact.
    pub fn load_dir(path: impl AsRef<Path>) -> Result<Self> {
        let mut registry = Self::new();
        registry.load_dir_into(path.as_ref())?;
        tracing::debug!(count = registry.artifacts.len(), "Loaded artifacts");
        Ok(registry)
    }

    fn load_dir_into(&mut self, dir: &Path) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let file_name = path
                .file_name()
                .and_then(|x| x.to_str())
                .unwrap_or_default();
            if path.is_dir() {
                if file_name != "build-info" {
                    self.load_dir_into(&path)?;
                }
                continue;
            }
            if !file_name.ends_with(".json") || file_name.ends_with(".dbg.json") {
                continue;
            }
            let json = fs::read_to_string(&path)?;
            if let Ok(artifact) = serde_json::from_str::<CompiledArtifact>(&json) {
                self.insert(artifact);
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&CompiledArtifact> {
        self.artifacts
            .get(name)
            .ok_or_else(|| MasonError::Artifact(format!("no artifact for {}", name)))
    }

    pub fn descriptor(
        &self,
        name: &str,
        strategy: DeployStrategy,
        libraries: &IndexMap<String, Address>,
    ) -> Result<FacetDescriptor> {
        let artifact = self.get(name)?;
        FacetDescriptor::new(
            name,
            artifact.linked_bytecode(libraries)?,
            strategy,
            artifact.function_signatures(),
        )
    }
}
