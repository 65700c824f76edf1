// Shared fixtures for the integration tests
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use furnace_sim::config::{Config, FleetAsset, FleetConfig, LimitsConfig, RetryConfig};
use furnace_sim::furnace_shared::{
    AssetCatalog, AssetDetail, AssetPage, PropertyReader, PropertyValue, PropertyWrite, SinkError,
    TelemetrySink,
};
use furnace_sim::{MemoryPlatform, TelemetryClient};

pub const EPOCH: i64 = 1_700_000_000;

/// Quotas high enough that no test call waits, and no backoff.
pub fn fast_config() -> Config {
    Config {
        limits: LimitsConfig {
            default_quota: 100_000,
            catalog_quota: 100_000,
            period_ms: 1000,
        },
        retry: RetryConfig {
            max_attempts: 10,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        },
        seed: Some(7),
        ..Config::default()
    }
}

/// Fleet of `furnace-<i>` assets, one per setpoint.
pub fn fleet(setpoints: &[Option<f64>]) -> FleetConfig {
    FleetConfig {
        model_id: "furnace".into(),
        page_size: 250,
        assets: setpoints
            .iter()
            .enumerate()
            .map(|(i, setpoint)| FleetAsset {
                name: format!("Furnace {}", i),
                id: Some(format!("furnace-{}", i)),
                setpoint: *setpoint,
            })
            .collect(),
    }
}

pub fn client(platform: &Arc<MemoryPlatform>, config: &Config) -> Arc<TelemetryClient> {
    client_with_sink(platform, platform.clone(), config)
}

pub fn client_with_sink(
    platform: &Arc<MemoryPlatform>,
    sink: Arc<dyn TelemetrySink>,
    config: &Config,
) -> Arc<TelemetryClient> {
    client_with_parts(platform.clone(), platform.clone(), sink, config)
}

pub fn client_with_parts(
    catalog: Arc<dyn AssetCatalog>,
    reader: Arc<dyn PropertyReader>,
    sink: Arc<dyn TelemetrySink>,
    config: &Config,
) -> Arc<TelemetryClient> {
    Arc::new(TelemetryClient::new(
        catalog,
        reader,
        sink,
        &config.limits,
        &config.retry,
    ))
}

/// Fails the first `failures` submissions with `error`, then forwards to the
/// platform. Counts every submission it sees.
pub struct FlakySink {
    inner: Arc<MemoryPlatform>,
    error: SinkError,
    failures: u32,
    calls: AtomicU32,
}

impl FlakySink {
    pub fn new(inner: Arc<MemoryPlatform>, error: SinkError, failures: u32) -> Self {
        Self {
            inner,
            error,
            failures,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TelemetrySink for FlakySink {
    async fn submit_property_write(&self, write: PropertyWrite) -> Result<(), SinkError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            return Err(self.error.clone());
        }
        self.inner.submit_property_write(write).await
    }
}

/// Rejects every write for one asset; other assets pass through.
pub struct RejectAssetSink {
    inner: Arc<MemoryPlatform>,
    asset_id: String,
    error: SinkError,
}

impl RejectAssetSink {
    pub fn new(inner: Arc<MemoryPlatform>, asset_id: &str, error: SinkError) -> Self {
        Self {
            inner,
            asset_id: asset_id.to_string(),
            error,
        }
    }
}

#[async_trait]
impl TelemetrySink for RejectAssetSink {
    async fn submit_property_write(&self, write: PropertyWrite) -> Result<(), SinkError> {
        if write.asset_id == self.asset_id {
            return Err(self.error.clone());
        }
        self.inner.submit_property_write(write).await
    }
}

/// Fails every property read for one asset; other assets read through.
pub struct DenyAssetReader {
    inner: Arc<MemoryPlatform>,
    asset_id: String,
    error: SinkError,
}

impl DenyAssetReader {
    pub fn new(inner: Arc<MemoryPlatform>, asset_id: &str, error: SinkError) -> Self {
        Self {
            inner,
            asset_id: asset_id.to_string(),
            error,
        }
    }
}

#[async_trait]
impl PropertyReader for DenyAssetReader {
    async fn get_property_value(
        &self,
        asset_id: &str,
        property_id: &str,
    ) -> Result<Option<PropertyValue>, SinkError> {
        if asset_id == self.asset_id {
            return Err(self.error.clone());
        }
        self.inner.get_property_value(asset_id, property_id).await
    }
}

/// Lists every asset but fails to describe one of them.
pub struct DenyDescribeCatalog {
    inner: Arc<MemoryPlatform>,
    asset_id: String,
    error: SinkError,
}

impl DenyDescribeCatalog {
    pub fn new(inner: Arc<MemoryPlatform>, asset_id: &str, error: SinkError) -> Self {
        Self {
            inner,
            asset_id: asset_id.to_string(),
            error,
        }
    }
}

#[async_trait]
impl AssetCatalog for DenyDescribeCatalog {
    async fn list_assets(
        &self,
        model_id: &str,
        next_token: Option<&str>,
    ) -> Result<AssetPage, SinkError> {
        self.inner.list_assets(model_id, next_token).await
    }

    async fn describe_asset(&self, asset_id: &str) -> Result<AssetDetail, SinkError> {
        if asset_id == self.asset_id {
            return Err(self.error.clone());
        }
        self.inner.describe_asset(asset_id).await
    }
}
