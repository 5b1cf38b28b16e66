//! Offline copy of the "My maps" state: the map being edited, its metadata and its drawings.

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use geojson::Feature;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use web_time::{SystemTime, UNIX_EPOCH};

use crate::bridge::StorageBridge;
use crate::error::OfflineError;

/// Storage key of the "My maps" snapshot.
pub const MYMAPS_STORAGE_KEY: &str = "offline_mymaps";

/// Metadata of a user map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapInfo {
    /// Title of the map.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Description of the map.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Category id of the map.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<i64>,
    /// Whether the map is visible to other users.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public: Option<bool>,
    /// Other properties, stored as received from the "My maps" service.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Service owning the "My maps" state of the application.
pub trait MymapsService {
    /// Categories a map can be filed under, as loaded from the server.
    fn all_categories(&self) -> Option<Value>;
    /// Replaces the list of categories.
    fn set_all_categories(&self, categories: Value);
    /// Metadata of the current map.
    fn map_info(&self) -> Option<MapInfo>;
    /// Replaces the metadata of the current map.
    fn set_map_information(&self, info: MapInfo);
    /// Features of the current map.
    fn map_features(&self) -> Vec<Feature>;
    /// Replaces the features of the current map.
    fn set_features(&self, features: &[Feature]);
    /// Id of the current map.
    fn map_id(&self) -> Option<String>;
    /// Sets the id of the current map.
    fn set_map_id(&self, id: &str);
}

/// Ordered collection of the features drawn on the map. Clones share the same collection.
#[derive(Debug, Clone, Default)]
pub struct DrawnFeatures {
    features: Rc<RefCell<Vec<Feature>>>,
}

impl DrawnFeatures {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a feature at the end of the collection.
    pub fn push(&self, feature: Feature) {
        self.features.borrow_mut().push(feature);
    }

    /// Adds features at the end of the collection.
    pub fn extend(&self, features: impl IntoIterator<Item = Feature>) {
        self.features.borrow_mut().extend(features);
    }

    /// Removes every feature.
    pub fn clear(&self) {
        self.features.borrow_mut().clear();
    }

    /// Copy of the features in the collection.
    pub fn features(&self) -> Vec<Feature> {
        self.features.borrow().clone()
    }

    /// Number of features.
    pub fn len(&self) -> usize {
        self.features.borrow().len()
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.features.borrow().is_empty()
    }
}

/// "My maps" state as stored under [`MYMAPS_STORAGE_KEY`].
///
/// Any field may be missing in stored data. A missing field is not restored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MymapsSnapshot {
    /// Categories of user maps.
    #[serde(default)]
    pub all_categories: Option<Value>,
    /// Metadata of the current map.
    #[serde(default)]
    pub map_info: Option<MapInfo>,
    /// Features of the current map.
    #[serde(default)]
    pub map_features: Option<Vec<Feature>>,
    /// Id of the current map.
    #[serde(default)]
    pub map_id: Option<String>,
    /// Time of the save, in milliseconds since the unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<u64>,
}

impl MymapsSnapshot {
    /// Decodes the fields of a stored snapshot one by one.
    ///
    /// A field that is `null` is absent. A field with an unexpected shape is logged and treated as
    /// absent, the other fields are kept.
    pub fn from_fields(mut fields: Map<String, Value>) -> Self {
        Self {
            all_categories: decode_field(&mut fields, "allCategories"),
            map_info: decode_field(&mut fields, "mapInfo"),
            map_features: decode_field(&mut fields, "mapFeatures"),
            map_id: decode_field(&mut fields, "mapId"),
            saved_at: decode_field(&mut fields, "savedAt"),
        }
    }
}

fn decode_field<T: DeserializeOwned>(fields: &mut Map<String, Value>, name: &str) -> Option<T> {
    match fields.remove(name)? {
        Value::Null => None,
        value => match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(err) => {
                log::warn!("Skipping my maps field {name} that cannot be decoded: {err}");
                None
            }
        },
    }
}

/// Saves the "My maps" state to the storage and restores it from there.
#[derive(Clone)]
pub struct MymapsOffline {
    bridge: Rc<StorageBridge>,
    service: Rc<dyn MymapsService>,
    drawn_features: DrawnFeatures,
    storage_key: String,
}

impl std::fmt::Debug for MymapsOffline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MymapsOffline")
            .field("bridge", &self.bridge)
            .field("drawn_features", &self.drawn_features.len())
            .field("storage_key", &self.storage_key)
            .finish()
    }
}

impl MymapsOffline {
    /// Creates a coordinator for the given service and drawn features collection.
    pub fn new(
        bridge: Rc<StorageBridge>,
        service: Rc<dyn MymapsService>,
        drawn_features: DrawnFeatures,
    ) -> Self {
        Self {
            bridge,
            service,
            drawn_features,
            storage_key: MYMAPS_STORAGE_KEY.to_string(),
        }
    }

    /// Sets the storage key of the snapshot.
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Storage key of the snapshot.
    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// Collects the current state from the service.
    pub fn snapshot(&self) -> MymapsSnapshot {
        MymapsSnapshot {
            all_categories: self.service.all_categories(),
            map_info: self.service.map_info(),
            map_features: Some(self.service.map_features()),
            map_id: self.service.map_id(),
            saved_at: None,
        }
    }

    /// Writes the current state to the storage, replacing the previous snapshot.
    ///
    /// The state is collected and the write is posted before this method returns.
    pub fn save(&self) -> impl Future<Output = Result<(), OfflineError>> + 'static {
        let snapshot = MymapsSnapshot {
            saved_at: now_millis(),
            ..self.snapshot()
        };
        let feature_count = snapshot.map_features.as_ref().map_or(0, Vec::len);
        let write = self.bridge.set_item(&self.storage_key, &snapshot);

        async move {
            write.await?;
            log::info!("Saved my maps snapshot with {feature_count} features");
            Ok(())
        }
    }

    /// Reads the snapshot back and applies it.
    ///
    /// Resolves with `false` if no snapshot is stored. In that case nothing is changed. Each field is
    /// decoded on its own, see [`MymapsSnapshot::from_fields`].
    pub fn restore(&self) -> impl Future<Output = Result<bool, OfflineError>> + 'static {
        let read = self.bridge.get_item::<Map<String, Value>>(&self.storage_key);
        let this = self.clone();

        async move {
            let Some(fields) = read.await? else {
                log::debug!("No my maps snapshot under {}", this.storage_key);
                return Ok(false);
            };

            this.apply(MymapsSnapshot::from_fields(fields));
            Ok(true)
        }
    }

    /// Applies the fields of the snapshot that hold a value.
    ///
    /// Categories, metadata, features and map id are applied in this order, each independently.
    /// The drawn features collection is replaced only when the snapshot has features.
    pub fn apply(&self, snapshot: MymapsSnapshot) {
        let MymapsSnapshot {
            all_categories,
            map_info,
            map_features,
            map_id,
            saved_at,
        } = snapshot;

        if let Some(categories) = all_categories.filter(is_truthy) {
            self.service.set_all_categories(categories);
        }

        if let Some(info) = map_info {
            self.service.set_map_information(info);
        }

        if let Some(features) = map_features.filter(|features| !features.is_empty()) {
            self.service.set_features(&features);
            self.drawn_features.clear();
            self.drawn_features.extend(features);
        }

        if let Some(id) = map_id.filter(|id| !id.is_empty()) {
            self.service.set_map_id(&id);
        }

        log::info!(
            "Restored my maps snapshot saved at {}",
            saved_at.map_or_else(|| "unknown time".to_string(), |at| at.to_string())
        );
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(value) => *value,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(value) => !value.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn now_millis() -> Option<u64> {
    let elapsed = SystemTime::now().duration_since(UNIX_EPOCH).ok()?;
    u64::try_from(elapsed.as_millis()).ok()
}
