//! Region discovery and paginated object search.

use std::sync::Arc;
use tracing::{debug, warn};

use super::api::StorageApi;
use super::models::{AccessToken, ObjectFilter, RemoteObject};
use crate::config::StorageSettings;
use crate::error::SyncError;

pub struct ObjectLocator {
    storage: Arc<dyn StorageApi>,
    /// Configured regions; when empty the regions endpoint is queried.
    regions: Vec<String>,
    max_pages: u32,
}

impl ObjectLocator {
    pub fn new(storage: Arc<dyn StorageApi>, settings: &StorageSettings) -> Self {
        Self {
            storage,
            regions: settings.regions.clone(),
            max_pages: settings.max_pages.max(1),
        }
    }

    /// Regions to process in this run.
    pub async fn regions(&self, token: &AccessToken) -> Result<Vec<String>, SyncError> {
        if !self.regions.is_empty() {
            return Ok(self.regions.clone());
        }
        let reported = self.storage.list_regions(token).await?;
        debug!("Storage API reported {} regions", reported.len());
        let regions = reported
            .into_iter()
            .filter(|region| {
                let usable = is_usable_region(region);
                if !usable {
                    warn!("Ignoring region with unusable name {:?}", region);
                }
                usable
            })
            .collect();
        Ok(regions)
    }

    /// All objects in `region` matching `filter`, following pagination.
    pub async fn find(
        &self,
        token: &AccessToken,
        region: &str,
        filter: &ObjectFilter,
    ) -> Result<Vec<RemoteObject>, SyncError> {
        let mut objects = Vec::new();
        let mut page_index = None;
        let mut pages_read = 0;

        loop {
            let page = self
                .storage
                .find_objects(token, region, filter, page_index)
                .await?;
            pages_read += 1;
            let next = page.next_page(page_index);
            objects.extend(page.content);

            match next {
                Some(next) if pages_read < self.max_pages => page_index = Some(next),
                Some(_) => {
                    warn!(
                        "Object search in {} stopped after {} pages, more results remain",
                        region, pages_read
                    );
                    break;
                }
                None => break,
            }
        }

        debug!(
            "Found {} objects in {} ({} pages) for filter {}",
            objects.len(),
            region,
            pages_read,
            filter
        );
        Ok(objects)
    }
}

/// Region names end up as directory names and URL path segments.
fn is_usable_region(region: &str) -> bool {
    let trimmed = region.trim();
    !trimmed.is_empty()
        && trimmed != "."
        && trimmed != ".."
        && !region.contains(['/', '\\', '\0'])
}
