//! Telemetry delivery: every platform call goes through
//! `retry.run(|| limiter.throttle(class, call))`, so each attempt,
//! retries included, takes its own rate-limiter slot.

pub mod rate_limiter;
pub mod retry;

pub use rate_limiter::{QuotaClass, RateLimiter};
pub use retry::{DeliveryError, RetryPolicy, RetryStatsSnapshot};

use std::sync::Arc;

use async_stream::try_stream;
use futures_core::Stream;
use furnace_shared::{
    AssetCatalog, AssetDetail, AssetSummary, PropertyReader, PropertyValue, PropertyWrite,
    TelemetrySink,
};

use crate::config::{LimitsConfig, RetryConfig};

/// Handles to the platform plus the limiter and retry policy shared by all
/// furnaces.
pub struct TelemetryClient {
    catalog: Arc<dyn AssetCatalog>,
    reader: Arc<dyn PropertyReader>,
    sink: Arc<dyn TelemetrySink>,
    limiter: RateLimiter,
    retry: RetryPolicy,
}

impl TelemetryClient {
    pub fn new(
        catalog: Arc<dyn AssetCatalog>,
        reader: Arc<dyn PropertyReader>,
        sink: Arc<dyn TelemetrySink>,
        limits: &LimitsConfig,
        retry: &RetryConfig,
    ) -> Self {
        Self::with_policies(
            catalog,
            reader,
            sink,
            RateLimiter::new(limits),
            RetryPolicy::new(retry),
        )
    }

    pub fn with_policies(
        catalog: Arc<dyn AssetCatalog>,
        reader: Arc<dyn PropertyReader>,
        sink: Arc<dyn TelemetrySink>,
        limiter: RateLimiter,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            catalog,
            reader,
            sink,
            limiter,
            retry,
        }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn retry_stats(&self) -> RetryStatsSnapshot {
        self.retry.stats()
    }

    /// Deliver one property write. Each attempt submits a fresh copy.
    pub async fn submit(&self, write: PropertyWrite) -> Result<(), DeliveryError> {
        self.retry
            .run("submit_property_write", || {
                let write = write.clone();
                self.limiter.throttle(QuotaClass::Default, move || {
                    self.sink.submit_property_write(write)
                })
            })
            .await
    }

    /// Lazily walk every page of the catalog for `model_id`. Each page is
    /// fetched under the catalog quota when the stream reaches it.
    pub fn list_assets<'a>(
        &'a self,
        model_id: &'a str,
    ) -> impl Stream<Item = Result<AssetSummary, DeliveryError>> + 'a {
        try_stream! {
            let mut token: Option<String> = None;
            loop {
                let page = self
                    .retry
                    .run("list_assets", || {
                        let token = token.clone();
                        self.limiter.throttle(QuotaClass::Catalog, move || async move {
                            self.catalog.list_assets(model_id, token.as_deref()).await
                        })
                    })
                    .await?;
                tracing::debug!(
                    "Catalog page for model {} returned {} assets",
                    model_id,
                    page.summaries.len()
                );
                for summary in page.summaries {
                    yield summary;
                }
                match page.next_token {
                    Some(next) => token = Some(next),
                    None => break,
                }
            }
        }
    }

    pub async fn describe_asset(&self, asset_id: &str) -> Result<AssetDetail, DeliveryError> {
        self.retry
            .run("describe_asset", || {
                self.limiter.throttle(QuotaClass::Default, || {
                    self.catalog.describe_asset(asset_id)
                })
            })
            .await
    }

    pub async fn read_property(
        &self,
        asset_id: &str,
        property_id: &str,
    ) -> Result<Option<PropertyValue>, DeliveryError> {
        self.retry
            .run("get_property_value", || {
                self.limiter.throttle(QuotaClass::Default, || {
                    self.reader.get_property_value(asset_id, property_id)
                })
            })
            .await
    }
}
