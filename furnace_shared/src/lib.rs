// furnace_shared: data model, sink error taxonomy and platform traits shared by
// the simulator, its delivery pipeline and the platform adapters

pub mod error;
pub mod platform;
pub mod types;

pub use error::{AssetError, SinkError};
pub use platform::{AssetCatalog, PropertyReader, TelemetrySink};
pub use types::{
    Asset, AssetDetail, AssetPage, AssetSummary, Channel, ChannelKind, FurnaceState,
    PropertyValue, PropertyWrite, Quality, DEFAULT_SETPOINT,
};
