//! Retarget marked moves from one store to another

use anyhow::Result;
use log::{info, warn};
use serde_json::{Value, json};

use super::SyncContext;
use crate::api::ms::models::{row_meta, row_str};
use crate::api::{Meta, Operation};
use crate::report::SyncReport;

/// Whether the move carries an attribute with this name
pub fn has_marker(document: &Value, marker: &str) -> bool {
    document
        .get("attributes")
        .and_then(Value::as_array)
        .is_some_and(|attrs| attrs.iter().any(|attr| row_str(attr, "name") == Some(marker)))
}

pub fn targets_store(document: &Value, store: &Meta) -> bool {
    document
        .get("targetStore")
        .and_then(row_meta)
        .is_some_and(|meta| meta.href == store.href)
}

/// Moves into `from` that carry the marker
pub fn moves_to_retarget<'a>(moves: &'a [Value], from: &Meta, marker: &str) -> Vec<&'a Value> {
    moves
        .iter()
        .filter(|doc| targets_store(doc, from) && has_marker(doc, marker))
        .collect()
}

/// `id` of the row, or the UUID at the end of its meta href
pub fn move_id(document: &Value) -> Option<String> {
    row_str(document, "id").map(str::to_string).or_else(|| {
        row_meta(document)
            .and_then(|meta| meta.id())
            .map(|id| id.to_string())
    })
}

pub fn retarget_payload(to: &Meta) -> Value {
    json!({ "targetStore": to.wrap() })
}

pub async fn run(ctx: &SyncContext) -> Result<SyncReport> {
    let mut report = SyncReport::new("stores");
    let sync = &ctx.config.sync;
    let from = sync.move_from()?;
    let to = sync.move_to()?;
    let marker = &sync.move_marker_attribute;

    info!("Loading moves");
    let moves = ctx.ms.list_all("move", None).await?;
    let selected = moves_to_retarget(&moves, from, marker);
    info!("{} of {} moves carry '{}'", selected.len(), moves.len(), marker);

    for doc in selected {
        let Some(id) = move_id(doc) else {
            warn!("Move without id skipped");
            report.skip();
            continue;
        };
        let op = Operation::update("move", id, retarget_payload(to));
        let result = ctx.ms.execute(&op).await?;
        report.record(&result);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(id: &str) -> Meta {
        serde_json::from_value(json!({
            "href": format!("https://h/entity/store/{}", id),
            "type": "store"
        }))
        .unwrap()
    }

    fn doc(id: &str, target: &str, attributes: Value) -> Value {
        json!({
            "id": id,
            "targetStore": { "meta": { "href": format!("https://h/entity/store/{}", target) } },
            "attributes": attributes,
        })
    }

    #[test]
    fn test_moves_to_retarget() {
        let moves = vec![
            doc("1", "from", json!([{ "name": "ID поставки", "value": "42" }])),
            doc("2", "from", json!([{ "name": "Комментарий", "value": "x" }])),
            doc("3", "other", json!([{ "name": "ID поставки", "value": "43" }])),
            json!({ "id": "4", "targetStore": { "meta": { "href": "https://h/entity/store/from" } } }),
        ];

        let selected = moves_to_retarget(&moves, &store("from"), "ID поставки");
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0]["id"], "1");
    }

    #[test]
    fn test_move_id_falls_back_to_meta() {
        let with_id = json!({ "id": "abc" });
        assert_eq!(move_id(&with_id).as_deref(), Some("abc"));

        let meta_only = json!({
            "meta": { "href": "https://h/entity/move/7944ef04-f831-11e5-7a69-971500188b19" }
        });
        assert_eq!(
            move_id(&meta_only).as_deref(),
            Some("7944ef04-f831-11e5-7a69-971500188b19")
        );
        assert!(move_id(&json!({})).is_none());
    }

    #[test]
    fn test_retarget_payload() {
        let payload = retarget_payload(&store("to"));
        assert_eq!(payload["targetStore"]["meta"]["href"], "https://h/entity/store/to");
        assert_eq!(payload["targetStore"]["meta"]["type"], "store");
    }
}
