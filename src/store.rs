use chrono::TimeDelta;
use serde_json::json;

use crate::map_host::{MapHost, PolygonStyle};
use crate::record::{Action, AnnotationRecord, ShapeId};
use crate::storage::{KeyValueStorage, StorageError};
use crate::tooltip::{self, Locale, TooltipOptions};

pub const RECORDS_KEY: &str = "plantingRecords";
pub const DEFAULT_EXPIRY_DAYS: i64 = 7;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Annotated shapes, mirrored write-through into a single storage entry.
#[derive(Debug)]
pub struct AnnotationStore<S> {
    storage: S,
    ttl: TimeDelta,
    records: Vec<AnnotationRecord>,
}

fn parse_records(blob: &str) -> Vec<AnnotationRecord> {
    let records: Vec<AnnotationRecord> = match serde_json::from_str(blob) {
        Ok(records) => records,
        Err(err) => {
            tracing::warn!(%err, "saved annotations are malformed, ignoring them");
            return Vec::new();
        }
    };
    let total = records.len();
    let valid: Vec<_> = records.into_iter().filter(AnnotationRecord::is_valid).collect();
    if valid.len() != total {
        tracing::warn!(dropped = total - valid.len(), "dropping saved shapes with too few vertices");
    }
    valid
}

impl<S: KeyValueStorage> AnnotationStore<S> {
    /// Reads the saved list. Never fails: anything unreadable counts as no records.
    pub fn load(storage: S, ttl: TimeDelta) -> Self {
        let records = match storage.get(RECORDS_KEY) {
            Ok(Some(blob)) => parse_records(&blob),
            Ok(None) => Vec::new(),
            Err(err) => {
                tracing::warn!(%err, "could not read saved annotations");
                Vec::new()
            }
        };
        tracing::info!(count = records.len(), "loaded annotations");
        Self {
            storage,
            ttl,
            records,
        }
    }

    pub fn records(&self) -> &[AnnotationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: ShapeId) -> Option<&AnnotationRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string(&self.records)?)
    }

    /// Records as a GeoJSON feature collection, rings closed and in lon/lat order.
    pub fn to_geojson(&self) -> serde_json::Value {
        let features: Vec<serde_json::Value> = self
            .records
            .iter()
            .map(|record| {
                let mut ring: Vec<[f64; 2]> =
                    record.coordinates().iter().map(|p| [p.lng, p.lat]).collect();
                if let Some(first) = ring.first().copied() {
                    ring.push(first);
                }
                json!({
                    "type": "Feature",
                    "id": record.id.to_string(),
                    "geometry": { "type": "Polygon", "coordinates": [ring] },
                    "properties": {
                        "count": record.count,
                        "action": record.action,
                        "area_m2": record.area_m2(),
                    },
                })
            })
            .collect();
        json!({ "type": "FeatureCollection", "features": features })
    }

    fn persist(&mut self) -> Result<(), StoreError> {
        let blob = self.to_json()?;
        self.storage.set(RECORDS_KEY, &blob, self.ttl)?;
        tracing::debug!(count = self.records.len(), bytes = blob.len(), "persisted annotations");
        Ok(())
    }

    pub fn append(&mut self, record: AnnotationRecord) -> Result<(), StoreError> {
        tracing::info!(id = %record.id, vertices = record.coordinates().len(), "appending annotation");
        self.records.push(record);
        self.persist()
    }

    /// Sets count and action on the record for `id`. Returns `false` when no record matches.
    pub fn update_matching(
        &mut self,
        id: ShapeId,
        count: u32,
        action: Action,
    ) -> Result<bool, StoreError> {
        let Some(record) = self.records.iter_mut().find(|r| r.id == id) else {
            tracing::warn!(%id, "no saved annotation for shape");
            return Ok(false);
        };
        record.count = count;
        record.action = action;
        tracing::info!(%id, count, ?action, "updated annotation");
        self.persist()?;
        Ok(true)
    }

    /// Forgets every record, in memory and in storage.
    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.records.clear();
        self.storage.remove(RECORDS_KEY)?;
        tracing::info!("cleared annotations");
        Ok(())
    }

    /// Draws every saved shape with its tooltip.
    pub fn restore_all<M: MapHost + ?Sized>(&self, map: &mut M, style: PolygonStyle, locale: Locale) {
        for record in &self.records {
            map.add_polygon(record.id, record.coordinates(), style);
            map.bind_tooltip(
                record.id,
                tooltip::label(record.count, record.action, record.coordinates(), locale),
                TooltipOptions::default(),
            );
        }
    }

    pub fn into_storage(self) -> S {
        self.storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map_host::testing::RecordingMap;
    use crate::record::LatLng;
    use crate::storage::{FileStorage, MemoryStorage};
    use chrono::Utc;

    fn triangle() -> Vec<LatLng> {
        vec![
            LatLng::new(53.0, 69.0),
            LatLng::new(53.1, 69.0),
            LatLng::new(53.05, 69.1),
        ]
    }

    fn square(offset: f64) -> Vec<LatLng> {
        vec![
            LatLng::new(offset, offset),
            LatLng::new(offset, offset + 0.1),
            LatLng::new(offset + 0.1, offset + 0.1),
            LatLng::new(offset + 0.1, offset),
        ]
    }

    fn week() -> TimeDelta {
        TimeDelta::days(DEFAULT_EXPIRY_DAYS)
    }

    fn reload(store: AnnotationStore<MemoryStorage>) -> AnnotationStore<MemoryStorage> {
        AnnotationStore::load(store.into_storage(), week())
    }

    #[test]
    fn empty_storage_loads_nothing() {
        let store = AnnotationStore::load(MemoryStorage::new(), week());
        assert!(store.is_empty());
    }

    #[test]
    fn malformed_blob_loads_nothing() {
        let storage = MemoryStorage::with_raw(RECORDS_KEY, "not json");
        let store = AnnotationStore::load(storage, week());
        assert!(store.is_empty());

        let mut map = RecordingMap::default();
        store.restore_all(&mut map, PolygonStyle::default(), Locale::En);
        assert!(map.polygons.is_empty());
        assert!(map.tooltips.is_empty());
    }

    #[test]
    fn records_survive_reload_in_order() {
        let mut store = AnnotationStore::load(MemoryStorage::new(), week());
        let mut expected = Vec::new();
        for (i, offset) in [0.0, 1.0, 2.0].into_iter().enumerate() {
            let mut record = AnnotationRecord::new(ShapeId::new(), square(offset)).unwrap();
            record.count = i as u32 * 10;
            record.action = if i % 2 == 0 { Action::Planting } else { Action::Cutting };
            expected.push(record.clone());
            store.append(record).unwrap();
        }

        let store = reload(store);
        assert_eq!(store.records(), expected.as_slice());
    }

    #[test]
    fn every_write_refreshes_week_long_expiry() {
        let mut store = AnnotationStore::load(MemoryStorage::new(), week());
        let before = Utc::now();
        let record = AnnotationRecord::new(ShapeId::new(), triangle()).unwrap();
        let id = record.id;
        store.append(record).unwrap();

        let first = store.storage.expires(RECORDS_KEY).expect("blob written");
        assert!(first >= before + week());
        assert!(first <= Utc::now() + week());

        assert!(store.update_matching(id, 3, Action::Planting).unwrap());
        let second = store.storage.expires(RECORDS_KEY).expect("blob rewritten");
        assert!(second >= first);
        assert!(second <= Utc::now() + week());
    }

    #[test]
    fn failed_write_reports_storage_error() {
        let mut store = AnnotationStore::load(MemoryStorage::new(), TimeDelta::MAX);
        let record = AnnotationRecord::new(ShapeId::new(), triangle()).unwrap();
        let err = store.append(record).expect_err("expiry cannot be stamped");
        assert!(matches!(
            err,
            StoreError::Storage(StorageError::ExpiryOutOfRange(_))
        ));
    }

    #[test]
    fn appended_record_reloads_with_defaults() {
        let mut store = AnnotationStore::load(MemoryStorage::new(), week());
        let id = ShapeId::new();
        store
            .append(AnnotationRecord::new(id, triangle()).unwrap())
            .unwrap();

        let store = reload(store);
        let record = store.get(id).expect("record persisted");
        assert_eq!(record.count, 0);
        assert_eq!(record.action, Action::Unset);
        assert_eq!(record.coordinates(), triangle().as_slice());
    }

    #[test]
    fn append_leaves_existing_records_alone() {
        let mut store = AnnotationStore::load(MemoryStorage::new(), week());
        let first = AnnotationRecord::new(ShapeId::new(), square(0.0)).unwrap();
        store.append(first.clone()).unwrap();
        store
            .append(AnnotationRecord::new(ShapeId::new(), square(0.0)).unwrap())
            .unwrap();

        assert_eq!(store.records()[0], first);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn update_matching_persists() {
        let mut store = AnnotationStore::load(MemoryStorage::new(), week());
        let id = ShapeId::new();
        store
            .append(AnnotationRecord::new(id, triangle()).unwrap())
            .unwrap();

        assert!(store.update_matching(id, 5, Action::Cutting).unwrap());

        let store = reload(store);
        let record = store.get(id).unwrap();
        assert_eq!((record.count, record.action), (5, Action::Cutting));
        assert_eq!(record.coordinates(), triangle().as_slice());
    }

    #[test]
    fn update_without_match_is_a_no_op() {
        let mut store = AnnotationStore::load(MemoryStorage::new(), week());
        let id = ShapeId::new();
        store
            .append(AnnotationRecord::new(id, triangle()).unwrap())
            .unwrap();

        assert!(!store.update_matching(ShapeId::new(), 9, Action::Planting).unwrap());
        assert_eq!(store.get(id).unwrap().count, 0);
    }

    #[test]
    fn identical_rings_are_updated_independently() {
        let mut store = AnnotationStore::load(MemoryStorage::new(), week());
        let (a, b) = (ShapeId::new(), ShapeId::new());
        store.append(AnnotationRecord::new(a, triangle()).unwrap()).unwrap();
        store.append(AnnotationRecord::new(b, triangle()).unwrap()).unwrap();

        store.update_matching(b, 3, Action::Planting).unwrap();

        assert_eq!(store.get(a).unwrap().count, 0);
        assert_eq!(store.get(b).unwrap().count, 3);
    }

    #[test]
    fn legacy_blob_is_readable() {
        let blob = r#"[{"count":4,"action":"cutting","coordinates":[[53.0,69.0],[53.1,69.0],[53.05,69.1]]}]"#;
        let store = AnnotationStore::load(MemoryStorage::with_raw(RECORDS_KEY, blob), week());
        assert_eq!(store.len(), 1);
        assert_eq!(store.records()[0].action, Action::Cutting);
    }

    #[test]
    fn degenerate_saved_shapes_are_dropped() {
        let blob = r#"[{"count":1,"action":"planting","coordinates":[[0,0],[1,1]]},
                       {"count":2,"action":"planting","coordinates":[[0,0],[1,1],[1,0]]}]"#;
        let store = AnnotationStore::load(MemoryStorage::with_raw(RECORDS_KEY, blob), week());
        assert_eq!(store.len(), 1);
        assert_eq!(store.records()[0].count, 2);
    }

    #[test]
    fn restore_draws_each_record_with_tooltip() {
        let mut store = AnnotationStore::load(MemoryStorage::new(), week());
        let id = ShapeId::new();
        store.append(AnnotationRecord::new(id, triangle()).unwrap()).unwrap();
        store.update_matching(id, 7, Action::Planting).unwrap();

        let mut map = RecordingMap::default();
        store.restore_all(&mut map, PolygonStyle::default(), Locale::En);

        assert_eq!(map.polygons.len(), 1);
        assert_eq!(map.polygons[0].1, triangle());
        let (text, options) = &map.tooltips[&id];
        assert!(text.starts_with("Trees: 7\nAction: Planting\n"));
        assert_eq!(*options, TooltipOptions::default());
    }

    #[test]
    fn geojson_export_closes_rings() {
        let mut store = AnnotationStore::load(MemoryStorage::new(), week());
        let id = ShapeId::new();
        store.append(AnnotationRecord::new(id, triangle()).unwrap()).unwrap();
        store.update_matching(id, 5, Action::Cutting).unwrap();

        let geojson = store.to_geojson();
        assert_eq!(geojson["type"], "FeatureCollection");
        let feature = &geojson["features"][0];
        assert_eq!(feature["id"], id.to_string());
        assert_eq!(feature["properties"]["action"], "cutting");
        assert_eq!(feature["properties"]["count"], 5);
        let ring = feature["geometry"]["coordinates"][0].as_array().unwrap();
        assert_eq!(ring.len(), 4);
        assert_eq!(ring[0], json!([69.0, 53.0]));
        assert_eq!(ring[0], ring[3]);
    }

    #[test]
    fn clear_removes_persisted_entry() {
        let mut store = AnnotationStore::load(MemoryStorage::new(), week());
        store
            .append(AnnotationRecord::new(ShapeId::new(), triangle()).unwrap())
            .unwrap();
        store.clear().unwrap();
        assert!(reload(store).is_empty());
    }

    #[test]
    fn survives_reload_from_disk() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let id = ShapeId::new();
        {
            let mut store = AnnotationStore::load(FileStorage::with_root(temp.path()), week());
            store.append(AnnotationRecord::new(id, triangle()).unwrap()).unwrap();
            store.update_matching(id, 5, Action::Cutting).unwrap();
        }
        let store = AnnotationStore::load(FileStorage::with_root(temp.path()), week());
        let record = store.get(id).unwrap();
        assert_eq!((record.count, record.action), (5, Action::Cutting));
    }
}
