// src/orchestrator.rs - Fleet construction and simulation run
use std::sync::Arc;
use std::time::Duration;

use furnace_shared::{Asset, PropertyValue, DEFAULT_SETPOINT};
use futures_util::{pin_mut, StreamExt};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use thiserror::Error;

use crate::config::{Config, ConfigError, FurnaceConfig};
use crate::delivery::{DeliveryError, RetryStatsSnapshot, TelemetryClient};
use crate::furnace::FurnaceStateMachine;
use crate::simulator::{ClockError, ClockReport, Pacing, SimulationClock};

/// Run length used when none is given, in minutes.
pub const DEFAULT_RUN_MINUTES: u64 = 500;

pub fn horizon_for_minutes(minutes: u64) -> Duration {
    Duration::from_secs(minutes.saturating_mul(60))
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),
    #[error("Clock error: {0}")]
    Clock(#[from] ClockError),
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedAsset {
    pub asset_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub model_id: String,
    pub seed: u64,
    pub assets_started: Vec<String>,
    pub assets_skipped: Vec<SkippedAsset>,
    pub clock: ClockReport,
    pub retries: RetryStatsSnapshot,
}

/// Furnaces built for one model, plus the assets that could not be simulated.
pub struct Fleet {
    pub furnaces: Vec<FurnaceStateMachine<StdRng>>,
    pub skipped: Vec<SkippedAsset>,
}

pub struct Orchestrator {
    client: Arc<TelemetryClient>,
    furnace: FurnaceConfig,
    pacing: Pacing,
    seed: Option<u64>,
    epoch_secs: Option<i64>,
}

impl Orchestrator {
    pub fn new(client: Arc<TelemetryClient>, config: &Config) -> Self {
        Self {
            client,
            furnace: config.furnace.clone(),
            pacing: Pacing::from_config(&config.clock),
            seed: config.seed,
            epoch_secs: None,
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Pin the Unix time virtual time zero maps to (defaults to now).
    pub fn with_epoch(mut self, epoch_secs: i64) -> Self {
        self.epoch_secs = Some(epoch_secs);
        self
    }

    /// Walk the catalog for `model_id` and build one furnace per asset.
    /// Each furnace gets its own RNG drawn from `master`.
    pub async fn build_fleet(
        &self,
        model_id: &str,
        master: &mut StdRng,
    ) -> Result<Fleet, OrchestratorError> {
        let mut fleet = Fleet {
            furnaces: Vec::new(),
            skipped: Vec::new(),
        };

        let summaries = self.client.list_assets(model_id);
        pin_mut!(summaries);
        while let Some(summary) = summaries.next().await {
            let summary = summary?;
            let detail = match self.client.describe_asset(&summary.id).await {
                Ok(detail) => detail,
                Err(err) => {
                    tracing::warn!("Skipping asset {}: {}", summary.id, err);
                    fleet.skipped.push(SkippedAsset {
                        asset_id: summary.id.clone(),
                        reason: err.to_string(),
                    });
                    continue;
                }
            };
            let asset = match Asset::from_detail(&detail) {
                Ok(asset) => asset,
                Err(err) => {
                    tracing::warn!("Skipping asset {}: {}", summary.id, err);
                    fleet.skipped.push(SkippedAsset {
                        asset_id: summary.id.clone(),
                        reason: err.to_string(),
                    });
                    continue;
                }
            };
            let asset = self.seed_setpoint(asset).await;
            tracing::info!(
                "Furnace {} ({}) ready with setpoint {:.1}",
                asset.id(),
                asset.name(),
                asset.setpoint()
            );
            let rng = StdRng::seed_from_u64(master.random());
            fleet.furnaces.push(FurnaceStateMachine::new(
                asset,
                self.client.clone(),
                &self.furnace,
                rng,
            ));
        }

        Ok(fleet)
    }

    /// Read the asset's Setpoint once. A missing channel, a failed read, a
    /// missing value or an unusable value falls back to [`DEFAULT_SETPOINT`].
    pub async fn seed_setpoint(&self, asset: Asset) -> Asset {
        let Some(channel) = asset.setpoint_channel() else {
            tracing::warn!(
                "Furnace {} has no Setpoint channel, using {}",
                asset.id(),
                DEFAULT_SETPOINT
            );
            return asset.with_setpoint(DEFAULT_SETPOINT);
        };
        let value = match self.client.read_property(asset.id(), channel).await {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(
                    "Furnace {} setpoint read failed ({}), using {}",
                    asset.id(),
                    err,
                    DEFAULT_SETPOINT
                );
                return asset.with_setpoint(DEFAULT_SETPOINT);
            }
        };
        let setpoint = match value.as_ref().and_then(PropertyValue::as_f64) {
            Some(v) if v.is_finite() && v > 0.0 => v,
            _ => {
                tracing::warn!(
                    "Furnace {} has no usable setpoint ({:?}), using {}",
                    asset.id(),
                    value,
                    DEFAULT_SETPOINT
                );
                DEFAULT_SETPOINT
            }
        };
        asset.with_setpoint(setpoint)
    }

    /// Build the fleet for `model_id` and simulate it until `horizon`.
    pub async fn run(&self, model_id: &str, horizon: Duration) -> Result<RunReport, OrchestratorError> {
        if model_id.trim().is_empty() {
            return Err(ConfigError::Invalid("model id must not be empty".to_string()).into());
        }
        let seed = self.seed.unwrap_or_else(rand::random);
        tracing::info!("Simulating model {} with seed {}", model_id, seed);
        let mut master = StdRng::seed_from_u64(seed);

        let fleet = self.build_fleet(model_id, &mut master).await?;
        if fleet.furnaces.is_empty() {
            tracing::warn!("No simulated furnaces for model {}", model_id);
        }

        let mut clock = SimulationClock::new(self.pacing);
        if let Some(epoch) = self.epoch_secs {
            clock = clock.with_epoch(epoch);
        }
        let assets_started: Vec<String> = fleet
            .furnaces
            .iter()
            .map(|f| f.asset().id().to_string())
            .collect();
        for furnace in fleet.furnaces {
            clock.spawn(Box::new(furnace));
        }

        let clock_report = clock.run(horizon).await?;
        Ok(RunReport {
            model_id: model_id.to_string(),
            seed,
            assets_started,
            assets_skipped: fleet.skipped,
            clock: clock_report,
            retries: self.client.retry_stats(),
        })
    }
}
