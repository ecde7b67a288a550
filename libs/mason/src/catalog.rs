use std::collections::HashSet;

use alloy_primitives::Address;
use common::{
    log_msg,
    part_id::{decode_part_id, PartId, PartKind},
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{MasonError, Result},
    interfaces::{CatalogPartData, ICatalog, IntakeStruct},
    ledger::{send_call_checked, LedgerClient},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogPart {
    pub part_id: PartId,
    pub kind: PartKind,
    pub z: u8,
    #[serde(default)]
    pub equippable: Vec<Address>,
    #[serde(default)]
    pub metadata_uri: String,
    /// Let any collection equip into this slot.
    #[serde(default)]
    pub equippable_to_all: bool,
}

impl From<&CatalogPart> for IntakeStruct {
    fn from(part: &CatalogPart) -> Self {
        IntakeStruct {
            partId: part.part_id.as_u64(),
            part: CatalogPartData {
                itemType: part.kind.item_type(),
                z: part.z,
                equippable: part.equippable.clone(),
                metadataURI: part.metadata_uri.clone(),
            },
        }
    }
}

pub fn validate_parts(parts: &[CatalogPart]) -> Result<()> {
    let mut seen = HashSet::new();
    for part in parts {
        if !seen.insert(part.part_id) {
            return Err(MasonError::InvalidPayload(format!(
                "part {} listed twice",
                part.part_id
            )));
        }
        let (_, _, kind) = decode_part_id(part.part_id)?;
        if kind != part.kind {
            return Err(MasonError::InvalidPayload(format!(
                "part {} encodes {:?} but is declared {:?}",
                part.part_id, kind, part.kind
            )));
        }
        if part.equippable_to_all && part.kind != PartKind::Slot {
            return Err(MasonError::InvalidPayload(format!(
                "part {} is not a slot and cannot be equippable to all",
                part.part_id
            )));
        }
    }
    Ok(())
}

/// Add `parts` to the catalog and open up slots marked equippable-to-all.
pub async fn populate_catalog<L>(ledger: &L, catalog: Address, parts: &[CatalogPart]) -> Result<()>
where
    L: LedgerClient + ?Sized,
{
    validate_parts(parts)?;

    log_msg!("Adding {} parts to catalog {}", parts.len(), catalog);
    let call = ICatalog::addPartListCall {
        partIntake: parts.iter().map(IntakeStruct::from).collect(),
    };
    send_call_checked(ledger, catalog, &call).await?;

    for part in parts.iter().filter(|p| p.equippable_to_all) {
        log_msg!("Setting part {} equippable to all", part.part_id);
        let call = ICatalog::setEquippableToAllCall {
            partId: part.part_id.as_u64(),
        };
        send_call_checked(ledger, catalog, &call).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use alloy_primitives::Selector;
    use alloy_sol_types::SolCall;
    use common::part_id::encode_part_id;

    use super::*;
    use crate::testing::MockLedger;

    fn demo_parts() -> Vec<CatalogPart> {
        vec![
            CatalogPart {
                part_id: encode_part_id(1, 1, PartKind::Fixed).unwrap(),
                kind: PartKind::Fixed,
                z: 1,
                equippable: vec![],
                metadata_uri: "ipfs://body.json".to_owned(),
                equippable_to_all: false,
            },
            CatalogPart {
                part_id: encode_part_id(2, 1, PartKind::Slot).unwrap(),
                kind: PartKind::Slot,
                z: 2,
                equippable: vec![],
                metadata_uri: "ipfs://head.json".to_owned(),
                equippable_to_all: true,
            },
            CatalogPart {
                part_id: encode_part_id(3, 1, PartKind::Slot).unwrap(),
                kind: PartKind::Slot,
                z: 3,
                equippable: vec![],
                metadata_uri: String::new(),
                equippable_to_all: false,
            },
        ]
    }

    #[tokio::test]
    async fn test_populate_catalog() {
        let ledger = MockLedger::new();
        let catalog = ledger.install_contract();
        let parts = demo_parts();

        populate_catalog(&ledger, catalog, &parts).await.unwrap();

        let calls = ledger.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[0].selector,
            Selector::from(ICatalog::addPartListCall::SELECTOR)
        );
        let added = ICatalog::addPartListCall::abi_decode_raw(&calls[0].args, true).unwrap();
        assert_eq!(added.partIntake.len(), 3);
        assert_eq!(added.partIntake[0].part.itemType, 2);
        assert_eq!(added.partIntake[1].part.itemType, 1);
        assert_eq!(added.partIntake[1].partId, 0x0002000000018000);

        let opened = ICatalog::setEquippableToAllCall::abi_decode_raw(&calls[1].args, true).unwrap();
        assert_eq!(opened.partId, parts[1].part_id.as_u64());
    }

    #[tokio::test]
    async fn test_invalid_parts_rejected_locally() {
        let ledger = MockLedger::new();
        let catalog = ledger.install_contract();

        let mut parts = demo_parts();
        parts[2].part_id = parts[1].part_id;
        assert!(matches!(
            populate_catalog(&ledger, catalog, &parts).await,
            Err(MasonError::InvalidPayload(_))
        ));

        let mut parts = demo_parts();
        parts[0].kind = PartKind::Slot;
        assert!(matches!(
            populate_catalog(&ledger, catalog, &parts).await,
            Err(MasonError::InvalidPayload(_))
        ));

        let mut parts = demo_parts();
        parts[0].part_id = PartId::from_u64(parts[0].part_id.as_u64() | 1);
        assert!(matches!(
            populate_catalog(&ledger, catalog, &parts).await,
            Err(MasonError::PartId(_))
        ));

        assert_eq!(ledger.broadcasts(), 0);
    }

    #[test]
    fn test_parts_from_json() {
        let parts: Vec<CatalogPart> = serde_json::from_str(
            r#"[{ "partId": 562949953519616, "kind": "slot", "z": 2, "equippableToAll": true }]"#,
        )
        .unwrap();
        assert_eq!(parts[0].part_id.to_string(), "0x0002000000018000");
        assert!(validate_parts(&parts).is_ok());
    }
}
