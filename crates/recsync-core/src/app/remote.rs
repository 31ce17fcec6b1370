//! Remote-side reads of a pass: folder get-or-create and the full listing.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::domain::{AccessToken, FolderId, RemoteEntry, SyncError};
use crate::ports::RemoteStore;

/// Idempotent get-or-create of the destination folder.
///
/// Not transactional: two concurrent callers can both miss and both create.
/// First match wins when the store already holds duplicates.
pub async fn resolve_folder(
    remote: &dyn RemoteStore,
    token: &AccessToken,
    name: &str,
    parent: &FolderId,
) -> Result<FolderId, SyncError> {
    if let Some(id) = remote.find_folder(token, name, parent).await? {
        debug!(folder_id = %id, name, "reusing destination folder");
        return Ok(id);
    }
    let id = remote.create_folder(token, name, parent).await?;
    info!(folder_id = %id, name, parent = %parent, "created destination folder");
    Ok(id)
}

/// Every entry of `folder`, following page tokens until exhaustion.
///
/// Always read fresh; never cached across passes.
pub async fn list_remote_entries(
    remote: &dyn RemoteStore,
    token: &AccessToken,
    folder: &FolderId,
) -> Result<Vec<RemoteEntry>, SyncError> {
    let mut entries = Vec::new();
    let mut seen_tokens = HashSet::new();
    let mut page_token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = remote.list_page(token, folder, page_token.as_deref()).await?;
        pages += 1;
        entries.extend(page.entries);

        match page.next_page_token {
            Some(next) if !next.is_empty() => {
                if !seen_tokens.insert(next.clone()) {
                    return Err(SyncError::Transport(format!(
                        "remote listing repeated page token {next}"
                    )));
                }
                page_token = Some(next);
            }
            _ => break,
        }
    }

    debug!(folder_id = %folder, pages, entries = entries.len(), "listed destination folder");
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::memory::InMemoryRemoteStore;

    fn token() -> AccessToken {
        AccessToken::new("t")
    }

    #[tokio::test]
    async fn resolving_twice_returns_the_same_folder() {
        let store = InMemoryRemoteStore::new();
        let root = FolderId::new("root");

        let first = resolve_folder(&store, &token(), "recsync", &root).await.unwrap();
        let second = resolve_folder(&store, &token(), "recsync", &root).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.folders_named("recsync").await, 1);
    }

    #[tokio::test]
    async fn same_name_under_other_parent_is_not_reused() {
        let store = InMemoryRemoteStore::new();
        let elsewhere = store.seed_folder("recsync", &FolderId::new("other")).await;

        let resolved = resolve_folder(&store, &token(), "recsync", &FolderId::new("root"))
            .await
            .unwrap();

        assert_ne!(resolved, elsewhere);
    }

    #[tokio::test]
    async fn first_duplicate_wins() {
        let store = InMemoryRemoteStore::new();
        let root = FolderId::new("root");
        let first = store.seed_folder("recsync", &root).await;
        let _second = store.seed_folder("recsync", &root).await;

        let resolved = resolve_folder(&store, &token(), "recsync", &root).await.unwrap();
        assert_eq!(resolved, first);
    }

    #[tokio::test]
    async fn listing_follows_every_page() {
        let store = InMemoryRemoteStore::new().with_page_size(2);
        let folder = store.seed_folder("recsync", &FolderId::new("root")).await;
        for i in 0..5 {
            store.seed_file(&folder, &format!("rec_{i}.m4a"), b"x").await;
        }

        let entries = list_remote_entries(&store, &token(), &folder).await.unwrap();

        assert_eq!(entries.len(), 5);
        assert_eq!(store.list_calls().await, 3);
    }

    #[tokio::test]
    async fn rejected_token_is_an_auth_error() {
        let store = InMemoryRemoteStore::new().with_valid_token("good");
        let err = resolve_folder(&store, &AccessToken::new("bad"), "recsync", &FolderId::new("root"))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Auth(_)));
    }
}
