//! Where notices come from.
//!
//! The builder only needs three things from the outside world: the FR
//! records for a part, the XML behind a record, and whether a URL exists.

use async_trait::async_trait;
use eregs_sync::{FederalRegisterClient, SyncError};
use serde_json::Value;

#[async_trait]
pub trait NoticeSource: Send + Sync {
    /// Every final rule touching `cfr_title` CFR `cfr_part`.
    async fn fetch_notices(&self, cfr_title: u32, cfr_part: &str) -> Result<Vec<Value>, SyncError>;

    async fn fetch_xml(&self, url: &str) -> Result<String, SyncError>;

    /// HEAD probe; failures count as absent.
    async fn head_ok(&self, url: &str) -> bool;
}

#[async_trait]
impl NoticeSource for FederalRegisterClient {
    async fn fetch_notices(&self, cfr_title: u32, cfr_part: &str) -> Result<Vec<Value>, SyncError> {
        FederalRegisterClient::fetch_notices(self, cfr_title, cfr_part).await
    }

    async fn fetch_xml(&self, url: &str) -> Result<String, SyncError> {
        FederalRegisterClient::fetch_xml(self, url).await
    }

    async fn head_ok(&self, url: &str) -> bool {
        FederalRegisterClient::head_ok(self, url).await
    }
}
