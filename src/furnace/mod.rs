//! Furnace state machine.
//!
//! Each furnace cycles IDLE → HEATING → HOLDING → COOLING → IDLE forever.
//! The machine is a continuation: [`FurnaceStateMachine::step`] emits the
//! telemetry due at the current virtual time and returns the delay until
//! the next emission. Every write goes through the shared
//! [`TelemetryClient`]; a write that cannot be delivered ends the furnace's
//! process with a [`FurnaceError`] naming the asset, state and value.

pub mod curves;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use furnace_shared::{Asset, ChannelKind, FurnaceState, PropertyValue, PropertyWrite};
use rand::Rng;
use rand::rngs::StdRng;
use thiserror::Error;

use crate::config::FurnaceConfig;
use crate::delivery::{DeliveryError, TelemetryClient};
use crate::furnace::curves::{
    COOLING_TEMPERATURE_CURVE, HEATING_POWER_CURVE, HEATING_TEMPERATURE_CURVE,
    HOLDING_POWER_KW, HOLDING_TEMPERATURE_NOISE, SETTLE_JITTER_SECS,
};
use crate::simulator::{ProcessError, SimContext, SimProcess};

#[derive(Debug, Error)]
pub enum FurnaceError {
    #[error("Furnace {asset_id} could not deliver {channel}={value} while {state}: {source}")]
    Delivery {
        asset_id: String,
        state: FurnaceState,
        channel: ChannelKind,
        value: PropertyValue,
        source: DeliveryError,
    },
}

/// Where the machine resumes next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    Idle,
    Heating(usize),
    Holding(u32),
    Cooling(usize),
}

impl Cursor {
    fn state(self) -> FurnaceState {
        match self {
            Cursor::Idle => FurnaceState::Idle,
            Cursor::Heating(_) => FurnaceState::Heating,
            Cursor::Holding(_) => FurnaceState::Holding,
            Cursor::Cooling(_) => FurnaceState::Cooling,
        }
    }
}

pub struct FurnaceStateMachine<R = StdRng> {
    asset: Asset,
    telemetry: Arc<TelemetryClient>,
    timing: FurnaceConfig,
    rng: R,
    cursor: Cursor,
    holding_iterations: u32,
}

impl<R: Rng> FurnaceStateMachine<R> {
    pub fn new(asset: Asset, telemetry: Arc<TelemetryClient>, timing: &FurnaceConfig, rng: R) -> Self {
        let holding_iterations = curves::holding_iterations(asset.setpoint());
        Self {
            asset,
            telemetry,
            timing: timing.clone(),
            rng,
            cursor: Cursor::Idle,
            holding_iterations,
        }
    }

    pub fn asset(&self) -> &Asset {
        &self.asset
    }

    /// State the furnace is in, or is about to enter on the next step.
    pub fn state(&self) -> FurnaceState {
        self.cursor.state()
    }

    pub fn holding_iterations(&self) -> u32 {
        self.holding_iterations
    }

    /// `min_idle + Exponential(idle_rate)`, drawn by inverting the CDF.
    pub fn idle_duration(&mut self) -> Duration {
        let u: f64 = self.rng.random();
        let extra = -(1.0 - u).ln() / self.timing.idle_rate;
        self.timing.min_idle() + Duration::from_secs_f64(extra)
    }

    // Jittered wait between the last holding sample and cooling, never negative
    fn settle_delay(&mut self) -> Duration {
        let jitter = self.rng.random_range(SETTLE_JITTER_SECS);
        let secs = jitter + self.timing.measurement_interval_secs / 2.0;
        Duration::from_secs_f64(secs.max(0.0))
    }

    /// Emit everything due now and return the virtual delay until the next
    /// step. The cursor only advances once every emission was delivered.
    pub async fn step(&mut self, ctx: &SimContext) -> Result<Duration, FurnaceError> {
        let interval = self.timing.measurement_interval();
        let setpoint = self.asset.setpoint();

        let (delay, next) = match self.cursor {
            Cursor::Idle => {
                self.emit_state(ctx).await?;
                let idle = self.idle_duration();
                tracing::info!(
                    "Furnace {} IDLE at {:.1}s, waking up in {:.1}s",
                    self.asset.id(),
                    ctx.now().as_secs_f64(),
                    idle.as_secs_f64()
                );
                (idle, Cursor::Heating(0))
            }
            Cursor::Heating(i) => {
                if i == 0 {
                    self.emit_state(ctx).await?;
                }
                let temperature = curves::scale(HEATING_TEMPERATURE_CURVE[i], setpoint);
                let power = HEATING_POWER_CURVE[i];
                self.emit_reading(ctx, temperature, power).await?;
                tracing::info!(
                    "Furnace {} HEATING at {:.1}s: {:.2} C, {} kW",
                    self.asset.id(),
                    ctx.now().as_secs_f64(),
                    temperature,
                    power
                );
                let next = if i + 1 < HEATING_TEMPERATURE_CURVE.len() {
                    Cursor::Heating(i + 1)
                } else {
                    Cursor::Holding(0)
                };
                (interval, next)
            }
            Cursor::Holding(k) => {
                if k == 0 {
                    self.emit_state(ctx).await?;
                }
                let temperature = setpoint + self.rng.random_range(HOLDING_TEMPERATURE_NOISE);
                // Truncated toward zero, as the platform stores integer kW
                let power = self.rng.random_range(HOLDING_POWER_KW) as i64;
                self.emit_reading(ctx, temperature, power).await?;
                tracing::info!(
                    "Furnace {} HOLDING at {:.1}s ({}/{}): {:.2} C, {} kW",
                    self.asset.id(),
                    ctx.now().as_secs_f64(),
                    k + 1,
                    self.holding_iterations,
                    temperature,
                    power
                );
                if k + 1 < self.holding_iterations {
                    (interval, Cursor::Holding(k + 1))
                } else {
                    (interval + self.settle_delay(), Cursor::Cooling(0))
                }
            }
            Cursor::Cooling(i) => {
                if i == 0 {
                    self.emit_state(ctx).await?;
                }
                let temperature = curves::scale(COOLING_TEMPERATURE_CURVE[i], setpoint);
                self.emit_reading(ctx, temperature, 0).await?;
                tracing::info!(
                    "Furnace {} COOLING at {:.1}s: {:.2} C",
                    self.asset.id(),
                    ctx.now().as_secs_f64(),
                    temperature
                );
                let next = if i + 1 < COOLING_TEMPERATURE_CURVE.len() {
                    Cursor::Cooling(i + 1)
                } else {
                    Cursor::Idle
                };
                (interval, next)
            }
        };

        self.cursor = next;
        Ok(delay)
    }

    async fn emit_state(&self, ctx: &SimContext) -> Result<(), FurnaceError> {
        let state = self.state();
        self.emit(ctx, ChannelKind::State, self.asset.state_channel(), state.into())
            .await
    }

    async fn emit_reading(
        &self,
        ctx: &SimContext,
        temperature: f64,
        power_kw: i64,
    ) -> Result<(), FurnaceError> {
        self.emit(
            ctx,
            ChannelKind::Temperature,
            self.asset.temperature_channel(),
            PropertyValue::Double(temperature),
        )
        .await?;
        self.emit(
            ctx,
            ChannelKind::Power,
            self.asset.power_channel(),
            PropertyValue::Integer(power_kw),
        )
        .await
    }

    async fn emit(
        &self,
        ctx: &SimContext,
        channel: ChannelKind,
        channel_id: &str,
        value: PropertyValue,
    ) -> Result<(), FurnaceError> {
        let write = PropertyWrite::new(self.asset.id(), channel_id, value.clone(), ctx.timestamp());
        self.telemetry
            .submit(write)
            .await
            .map_err(|source| FurnaceError::Delivery {
                asset_id: self.asset.id().to_string(),
                state: self.state(),
                channel,
                value,
                source,
            })
    }
}

#[async_trait]
impl<R> SimProcess for FurnaceStateMachine<R>
where
    R: Rng + Send + Sync,
{
    fn name(&self) -> &str {
        self.asset.id()
    }

    async fn resume(&mut self, ctx: &SimContext) -> Result<Duration, ProcessError> {
        self.step(ctx).await.map_err(|err| Box::new(err) as ProcessError)
    }
}
