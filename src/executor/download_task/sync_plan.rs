//! Reconciliation of the remote asset listing against local records.

use std::collections::HashSet;

use crate::types::AssetRef;

/// What one sync run has to do
#[derive(Debug, Default, PartialEq, Eq)]
pub(super) struct SyncPlan {
    /// Remote image assets with no local record, in remote listing order
    pub(super) to_download: Vec<AssetRef>,
    /// Local records whose asset no longer exists remotely, sorted
    pub(super) to_remove: Vec<String>,
}

impl SyncPlan {
    /// Diff the remote image assets against the local record ids
    ///
    /// Non-image assets are ignored on both sides.
    pub(super) fn build(remote: &[AssetRef], local: &HashSet<String>) -> Self {
        let images: Vec<&AssetRef> = remote.iter().filter(|asset| asset.is_image()).collect();
        let remote_ids: HashSet<&str> = images.iter().map(|asset| asset.id.as_str()).collect();

        let mut seen = HashSet::new();
        let to_download = images
            .into_iter()
            .filter(|asset| !local.contains(&asset.id))
            .filter(|asset| seen.insert(asset.id.clone()))
            .cloned()
            .collect();

        let mut to_remove: Vec<String> = local
            .iter()
            .filter(|id| !remote_ids.contains(id.as_str()))
            .cloned()
            .collect();
        to_remove.sort();

        Self {
            to_download,
            to_remove,
        }
    }

    pub(super) fn is_noop(&self) -> bool {
        self.to_download.is_empty()
    }
}
