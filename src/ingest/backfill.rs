//! Back-fill pass of the collection aggregation: splice the loaded
//! membership singleton onto every persisted collection document.

use crate::constants::{collections, COLLECTION_ENTITIES_REF, ENTITY_FIELD, REF_NAME_FIELD};
use crate::error::IngestResult;
use crate::record::entity_name;
use crate::store::DocumentStore;
use serde_json::Value;
use std::collections::BTreeMap;

/// Read the membership singleton back from the store. A missing singleton
/// means no collection has members.
pub fn load_membership(store: &dyn DocumentStore) -> IngestResult<BTreeMap<String, Vec<String>>> {
    let mut membership = BTreeMap::new();
    let Some(Value::Object(mut doc)) =
        store.find_by_name(collections::COLLECTION_ENTITIES, COLLECTION_ENTITIES_REF)?
    else {
        return Ok(membership);
    };
    doc.remove(REF_NAME_FIELD);

    for (collection, members) in doc {
        let members: Vec<String> = members
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        membership.insert(collection, members);
    }
    Ok(membership)
}

/// Set `Entities` on every stored collection that has derived members and
/// replace it in place. Collections without members are left untouched.
/// Returns how many documents were rewritten.
pub fn backfill_collections(store: &dyn DocumentStore) -> IngestResult<usize> {
    let membership = load_membership(store)?;
    let mut rewritten = 0;

    for mut doc in store.read_all(collections::COLLECTIONS)? {
        let Some(name) = entity_name(&doc).map(str::to_string) else {
            continue;
        };
        let Some(members) = membership.get(&name).filter(|m| !m.is_empty()) else {
            continue;
        };
        if let Some(map) = doc.as_object_mut() {
            map.insert(
                "Entities".to_string(),
                Value::Array(members.iter().cloned().map(Value::String).collect()),
            );
        }
        store.upsert_by_name(collections::COLLECTIONS, &name, &doc)?;
        rewritten += 1;
    }

    log_ingest_info!(
        "back-filled {} documents on [{}] by [{}]",
        rewritten,
        collections::COLLECTIONS,
        ENTITY_FIELD
    );
    Ok(rewritten)
}
