// Trait-based interfaces to the industrial-data platform.
// Handles to these are injected into the delivery pipeline; nothing here is global.

use async_trait::async_trait;

use crate::error::SinkError;
use crate::types::{AssetDetail, AssetPage, PropertyValue, PropertyWrite};

#[async_trait]
pub trait AssetCatalog: Send + Sync {
    /// One page of the assets created from `model_id`. Pass the previous
    /// page's `next_token` to continue; `None` starts from the beginning.
    async fn list_assets(
        &self,
        model_id: &str,
        next_token: Option<&str>,
    ) -> Result<AssetPage, SinkError>;

    async fn describe_asset(&self, asset_id: &str) -> Result<AssetDetail, SinkError>;
}

#[async_trait]
pub trait PropertyReader: Send + Sync {
    /// Latest value of a property, `None` if it has never been written.
    async fn get_property_value(
        &self,
        asset_id: &str,
        property_id: &str,
    ) -> Result<Option<PropertyValue>, SinkError>;
}

#[async_trait]
pub trait TelemetrySink: Send + Sync {
    /// Accept exactly one property write.
    async fn submit_property_write(&self, write: PropertyWrite) -> Result<(), SinkError>;
}
