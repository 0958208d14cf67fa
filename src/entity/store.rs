use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

use super::records::{ChangeRecord, Entity, EntityKind, Record};

/// Key of one stored record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey {
    pub kind: EntityKind,
    pub id: String,
}

impl EntityKey {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

/// In-memory `(kind, id) -> record` map with per-kind insertion order.
///
/// Storing an existing key replaces the value in place, so re-ingesting a
/// snapshot or delta is idempotent and keeps the original ordering.
#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    entities: HashMap<EntityKind, IndexMap<String, Record>>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert plain records and apply change records. Returns the touched keys.
    pub fn store<I>(&mut self, records: I) -> Vec<EntityKey>
    where
        I: IntoIterator<Item = Record>,
    {
        records
            .into_iter()
            .filter_map(|record| self.store_record(record))
            .collect()
    }

    pub fn store_record(&mut self, record: Record) -> Option<EntityKey> {
        match record {
            Record::Unknown => None,
            record if record.is_change() => self.apply_change(record),
            record => {
                let kind = record.kind()?;
                let id = record.id()?.to_string();
                self.entities
                    .entry(kind)
                    .or_default()
                    .insert(id.clone(), record);
                Some(EntityKey { kind, id })
            }
        }
    }

    pub fn insert<E: Entity>(&mut self, entity: E) {
        self.store_record(entity.into_record());
    }

    pub fn get_record(&self, kind: EntityKind, id: &str) -> Option<&Record> {
        self.entities.get(&kind)?.get(id)
    }

    pub fn get<E: Entity>(&self, id: &str) -> Option<&E> {
        self.get_record(E::KIND, id).and_then(E::from_record)
    }

    pub fn contains(&self, kind: EntityKind, id: &str) -> bool {
        self.get_record(kind, id).is_some()
    }

    pub fn get_all_in_order<E: Entity>(&self) -> Vec<&E> {
        self.iter::<E>().collect()
    }

    pub fn iter<'a, E: Entity + 'a>(&'a self) -> impl Iterator<Item = &'a E> + 'a {
        self.entities
            .get(&E::KIND)
            .into_iter()
            .flat_map(|map| map.values())
            .filter_map(E::from_record)
    }

    pub fn records_in_order(&self, kind: EntityKind) -> Vec<&Record> {
        self.entities
            .get(&kind)
            .map(|map| map.values().collect())
            .unwrap_or_default()
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.entities.get(&kind).map_or(0, IndexMap::len)
    }

    pub fn len(&self) -> usize {
        self.entities.values().map(IndexMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove one record; later records keep their relative order.
    pub fn remove(&mut self, kind: EntityKind, id: &str) -> Option<Record> {
        self.entities.get_mut(&kind)?.shift_remove(id)
    }

    pub fn clear(&mut self) {
        self.entities.clear();
    }

    /// Wipe and repopulate from a full snapshot.
    pub fn replace_all<I>(&mut self, records: I) -> Vec<EntityKey>
    where
        I: IntoIterator<Item = Record>,
    {
        self.clear();
        self.store(records)
    }

    /// Apply a CREATE, UPDATE or DELETE. Plain records are ignored here.
    pub fn apply_change(&mut self, record: Record) -> Option<EntityKey> {
        match record {
            Record::Create(change) => self.apply_create(change),
            Record::Update(change) => self.apply_update(change),
            Record::Delete(change) => self.apply_delete(change),
            _ => None,
        }
    }

    fn apply_create(&mut self, change: ChangeRecord) -> Option<EntityKey> {
        let Some(entity) = change.entity else {
            debug!("CREATE for {} {} without entity", change.entity_type, change.id);
            return None;
        };
        match serde_json::from_value::<Record>(entity) {
            Ok(record) if record.kind().is_some() => self.store_record(record),
            Ok(_) => None,
            Err(err) => {
                warn!("Failed to decode created {} {}: {}", change.entity_type, change.id, err);
                None
            }
        }
    }

    // Merge changed properties into the stored JSON form and decode again.
    fn apply_update(&mut self, change: ChangeRecord) -> Option<EntityKey> {
        let kind = EntityKind::from_wire(&change.entity_type)?;
        let changed = change.changed_properties?;
        let existing = self.get_record(kind, &change.id)?;

        let mut value = match serde_json::to_value(existing) {
            Ok(value) => value,
            Err(err) => {
                warn!("Failed to encode {} {}: {}", change.entity_type, change.id, err);
                return None;
            }
        };
        if let Value::Object(map) = &mut value {
            for (field, new_value) in changed {
                map.insert(field, new_value);
            }
        }

        match serde_json::from_value::<Record>(value) {
            Ok(updated) if updated.id() == Some(change.id.as_str()) => self.store_record(updated),
            Ok(_) => {
                warn!("UPDATE for {} {} changed its identity, ignored", change.entity_type, change.id);
                None
            }
            Err(err) => {
                warn!("Failed to apply UPDATE to {} {}: {}", change.entity_type, change.id, err);
                None
            }
        }
    }

    fn apply_delete(&mut self, change: ChangeRecord) -> Option<EntityKey> {
        let kind = EntityKind::from_wire(&change.entity_type)?;
        self.remove(kind, &change.id)?;
        Some(EntityKey { kind, id: change.id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::records::{BettingOfferRecord, SportRecord};
    use serde_json::json;

    fn sport(id: &str, name: &str) -> Record {
        Record::Sport(SportRecord {
            id: id.to_string(),
            name: name.to_string(),
            short_name: None,
            is_virtual: false,
            is_top_sport: false,
            number_of_events: None,
            number_of_live_events: None,
        })
    }

    fn offer(id: &str, odds: f64) -> Record {
        serde_json::from_value(json!({
            "_type": "BETTING_OFFER", "id": id, "outcomeId": "o1", "odds": odds
        }))
        .unwrap()
    }

    fn change(kind: &str, value: serde_json::Value) -> Record {
        let mut value = value;
        value["_type"] = json!(kind);
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_upsert_keeps_insertion_order() {
        let mut store = EntityStore::new();
        store.store(vec![sport("1", "Football"), sport("2", "Tennis")]);
        store.store(vec![sport("1", "Soccer")]);

        let names: Vec<_> = store
            .get_all_in_order::<SportRecord>()
            .into_iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["Soccer", "Tennis"]);
        assert_eq!(store.count(EntityKind::Sport), 2);
    }

    #[test]
    fn test_update_merges_changed_properties() {
        let mut store = EntityStore::new();
        store.store(vec![offer("bo1", 1.5)]);

        let touched = store.store(vec![change(
            "UPDATE",
            json!({"entityType": "BETTING_OFFER", "id": "bo1", "changedProperties": {"odds": 2.25}}),
        )]);

        assert_eq!(touched, vec![EntityKey::new(EntityKind::BettingOffer, "bo1")]);
        let stored = store.get::<BettingOfferRecord>("bo1").unwrap();
        assert_eq!(stored.odds, 2.25);
        assert_eq!(stored.outcome_id, "o1");
    }

    #[test]
    fn test_update_for_missing_entity_is_ignored() {
        let mut store = EntityStore::new();
        let touched = store.store(vec![change(
            "UPDATE",
            json!({"entityType": "BETTING_OFFER", "id": "nope", "changedProperties": {"odds": 2.0}}),
        )]);
        assert!(touched.is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn test_bad_update_keeps_previous_value() {
        let mut store = EntityStore::new();
        store.store(vec![offer("bo1", 1.5)]);
        store.store(vec![change(
            "UPDATE",
            json!({"entityType": "BETTING_OFFER", "id": "bo1", "changedProperties": {"odds": "high"}}),
        )]);
        assert_eq!(store.get::<BettingOfferRecord>("bo1").unwrap().odds, 1.5);
    }

    #[test]
    fn test_create_and_delete() {
        let mut store = EntityStore::new();
        store.store(vec![sport("1", "Football"), sport("2", "Tennis"), sport("3", "Golf")]);
        store.store(vec![
            change("DELETE", json!({"entityType": "SPORT", "id": "2"})),
            change(
                "CREATE",
                json!({"entityType": "SPORT", "id": "4",
                       "entity": {"_type": "SPORT", "id": "4", "name": "Darts"}}),
            ),
        ]);

        let ids: Vec<_> = store
            .get_all_in_order::<SportRecord>()
            .into_iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(ids, vec!["1", "3", "4"]);
    }

    #[test]
    fn test_replace_all_drops_stale_entities() {
        let mut store = EntityStore::new();
        store.store(vec![sport("1", "Football"), offer("bo1", 1.5)]);
        store.replace_all(vec![sport("2", "Tennis")]);

        assert!(!store.contains(EntityKind::Sport, "1"));
        assert!(!store.contains(EntityKind::BettingOffer, "bo1"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_apply_change_ignores_plain_records() {
        let mut store = EntityStore::new();
        assert!(store.apply_change(sport("1", "Football")).is_none());
        assert!(store.is_empty());

        store.store(vec![sport("1", "Football")]);
        let removed = store.apply_change(change("DELETE", json!({"entityType": "SPORT", "id": "1"})));
        assert_eq!(removed, Some(EntityKey::new(EntityKind::Sport, "1")));
        assert!(store.is_empty());
    }
}
