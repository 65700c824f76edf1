// src/platform/memory.rs - In-process industrial-data platform
//
// Serves a catalog seeded from the fleet configuration, answers property
// reads from the latest written values and records every accepted write.
// Writes can be mirrored to any `Write` as JSON lines.

use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use furnace_shared::{
    AssetCatalog, AssetDetail, AssetPage, AssetSummary, Channel, ChannelKind, PropertyReader,
    PropertyValue, PropertyWrite, SinkError, TelemetrySink,
};
use uuid::Uuid;

use crate::config::FleetConfig;

type PropertyKey = (String, String);

pub struct MemoryPlatform {
    page_size: usize,
    // model id -> asset ids, in catalog order
    models: HashMap<String, Vec<String>>,
    assets: HashMap<String, AssetDetail>,
    values: Mutex<HashMap<PropertyKey, PropertyValue>>,
    // Accepted writes in order; None once history is switched off
    writes: Option<Mutex<Vec<PropertyWrite>>>,
    write_count: AtomicU64,
    recorder: Option<Mutex<Box<dyn Write + Send>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryPlatform {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            models: HashMap::new(),
            assets: HashMap::new(),
            values: Mutex::new(HashMap::new()),
            writes: Some(Mutex::new(Vec::new())),
            write_count: AtomicU64::new(0),
            recorder: None,
        }
    }

    /// One furnace asset per fleet entry, each with Temperature, Power, State
    /// and Setpoint channels. Configured setpoints become the Setpoint value.
    pub fn from_fleet(fleet: &FleetConfig) -> Self {
        let mut platform = Self::new(fleet.page_size);
        for entry in &fleet.assets {
            let asset_id = entry
                .id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            let detail = furnace_detail(&asset_id, &entry.name);
            if let (Some(setpoint), Some(channel)) = (entry.setpoint, detail.channel(ChannelKind::Setpoint)) {
                platform.set_value(&asset_id, &channel.id, PropertyValue::Double(setpoint));
            }
            platform.add_asset(&fleet.model_id, detail);
        }
        tracing::info!(
            "Local platform serving {} assets for model {}",
            fleet.assets.len(),
            fleet.model_id
        );
        platform
    }

    /// Mirror every accepted write to `recorder` as one JSON object per line.
    pub fn with_recorder(mut self, recorder: Box<dyn Write + Send>) -> Self {
        self.recorder = Some(Mutex::new(recorder));
        self
    }

    /// Stop keeping accepted writes in memory. Long runs only need
    /// [`MemoryPlatform::write_count`] and the recorder.
    pub fn without_history(mut self) -> Self {
        self.writes = None;
        self
    }

    pub fn add_asset(&mut self, model_id: &str, detail: AssetDetail) {
        self.models
            .entry(model_id.to_string())
            .or_default()
            .push(detail.asset_id.clone());
        self.assets.insert(detail.asset_id.clone(), detail);
    }

    pub fn set_value(&self, asset_id: &str, property_id: &str, value: PropertyValue) {
        lock(&self.values).insert((asset_id.to_string(), property_id.to_string()), value);
    }

    /// Every accepted write, in submission order. Empty without history.
    pub fn writes(&self) -> Vec<PropertyWrite> {
        self.writes
            .as_ref()
            .map(|writes| lock(writes).clone())
            .unwrap_or_default()
    }

    pub fn writes_for(&self, asset_id: &str) -> Vec<PropertyWrite> {
        self.writes
            .as_ref()
            .map(|writes| {
                lock(writes)
                    .iter()
                    .filter(|w| w.asset_id == asset_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of accepted writes, kept with or without history.
    pub fn write_count(&self) -> u64 {
        self.write_count.load(Ordering::Relaxed)
    }

    pub fn asset_ids(&self, model_id: &str) -> Vec<String> {
        self.models.get(model_id).cloned().unwrap_or_default()
    }
}

/// Description of a furnace asset with freshly generated channel ids.
pub fn furnace_detail(asset_id: &str, name: &str) -> AssetDetail {
    let channels = [
        ChannelKind::Temperature,
        ChannelKind::Power,
        ChannelKind::State,
        ChannelKind::Setpoint,
    ]
    .into_iter()
    .map(|kind| Channel {
        id: Uuid::new_v4().to_string(),
        name: kind.name().to_string(),
    })
    .collect();
    AssetDetail {
        asset_id: asset_id.to_string(),
        asset_name: name.to_string(),
        channels,
    }
}

#[async_trait]
impl AssetCatalog for MemoryPlatform {
    async fn list_assets(
        &self,
        model_id: &str,
        next_token: Option<&str>,
    ) -> Result<AssetPage, SinkError> {
        let start = match next_token {
            None => 0,
            Some(token) => token.parse::<usize>().map_err(|_| SinkError::Service {
                code: "InvalidRequestException".to_string(),
                message: format!("invalid next token '{}'", token),
            })?,
        };
        let ids = self.models.get(model_id).map(Vec::as_slice).unwrap_or_default();
        let end = (start + self.page_size).min(ids.len());
        let summaries = ids
            .get(start..end)
            .unwrap_or_default()
            .iter()
            .filter_map(|id| self.assets.get(id))
            .map(|detail| AssetSummary {
                id: detail.asset_id.clone(),
                name: detail.asset_name.clone(),
            })
            .collect();
        let next_token = (end < ids.len()).then(|| end.to_string());
        Ok(AssetPage {
            summaries,
            next_token,
        })
    }

    async fn describe_asset(&self, asset_id: &str) -> Result<AssetDetail, SinkError> {
        self.assets
            .get(asset_id)
            .cloned()
            .ok_or_else(|| SinkError::NotFound(format!("asset {}", asset_id)))
    }
}

#[async_trait]
impl PropertyReader for MemoryPlatform {
    async fn get_property_value(
        &self,
        asset_id: &str,
        property_id: &str,
    ) -> Result<Option<PropertyValue>, SinkError> {
        if !self.assets.contains_key(asset_id) {
            return Err(SinkError::NotFound(format!("asset {}", asset_id)));
        }
        Ok(lock(&self.values)
            .get(&(asset_id.to_string(), property_id.to_string()))
            .cloned())
    }
}

#[async_trait]
impl TelemetrySink for MemoryPlatform {
    async fn submit_property_write(&self, write: PropertyWrite) -> Result<(), SinkError> {
        if !self.assets.contains_key(&write.asset_id) {
            return Err(SinkError::NotFound(format!("asset {}", write.asset_id)));
        }
        if let Some(recorder) = &self.recorder {
            let line = serde_json::to_string(&write).map_err(|e| SinkError::Io(e.to_string()))?;
            writeln!(lock(recorder), "{}", line)?;
        }
        self.set_value(&write.asset_id, &write.property_id, write.value.clone());
        self.write_count.fetch_add(1, Ordering::Relaxed);
        if let Some(writes) = &self.writes {
            lock(writes).push(write);
        }
        Ok(())
    }
}
