// furnace-sim: discrete-event furnace simulator delivering telemetry through a
// rate-limited, retrying pipeline

pub mod config;
pub mod delivery;
pub mod furnace;
pub mod orchestrator;
pub mod platform;
pub mod simulator;

// Re-exports for the binary, benches and integration tests
pub use crate::config::{
    load_config, load_config_or_default, Config, ConfigError, DEFAULT_CONFIG_PATH,
};
pub use crate::delivery::{DeliveryError, QuotaClass, RateLimiter, RetryPolicy, TelemetryClient};
pub use crate::furnace::{FurnaceError, FurnaceStateMachine};
pub use crate::orchestrator::{
    horizon_for_minutes, Orchestrator, OrchestratorError, RunReport, DEFAULT_RUN_MINUTES,
};
pub use crate::platform::MemoryPlatform;
pub use crate::simulator::{ClockError, ClockReport, Pacing, SimContext, SimProcess, SimulationClock};
pub use furnace_shared;
