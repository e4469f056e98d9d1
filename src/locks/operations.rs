//! Lock listing.

use super::item::LockItem;
use super::store::DataBagStore;
use super::types::LockInfo;
use crate::error::Result;
use tracing::warn;

/// List every lock item in `data_bag`, sorted by id.
///
/// Items that do not parse as lock items are skipped with a warning.
pub async fn list_locks(
    store: &dyn DataBagStore,
    data_bag: &str,
    stale_minutes: u32,
) -> Result<Vec<LockInfo>> {
    let mut locks: Vec<LockInfo> = store
        .list_items(data_bag)
        .await?
        .iter()
        .filter_map(|value| match LockItem::from_value(value) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(data_bag, error = %e, "skipping invalid lock item");
                None
            }
        })
        .map(|item| {
            let is_stale = item.is_stale(stale_minutes);
            LockInfo { item, is_stale }
        })
        .collect();

    locks.sort_by(|a, b| a.item.id.cmp(&b.item.id));
    Ok(locks)
}
