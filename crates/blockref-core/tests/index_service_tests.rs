//! Index service behavior against in-memory collaborators

use std::sync::Arc;
use std::time::Duration;

use blockref_core::snapshot::encode_snapshot;
use blockref_core::{
    suggest, BlockRecord, IndexError, IndexHandle, IndexOptions, IndexService, InitSource,
    MemorySnapshotStore, MemoryVault,
};

const FIRST: &str = "11111111-1111-1111-1111-111111111111";
const SECOND: &str = "22222222-2222-2222-2222-222222222222";

fn page_md() -> String {
    format!("- First block\n  id:: {FIRST}\n- Refers to (({FIRST}))\n")
}

fn options() -> IndexOptions {
    IndexOptions {
        persist_debounce: Duration::from_millis(1000),
        rebuild_yield_every: 2,
        search_limit: 50,
    }
}

fn spawn(vault: &MemoryVault, store: &MemorySnapshotStore) -> IndexHandle {
    IndexService::spawn(Arc::new(vault.clone()), Arc::new(store.clone()), options())
}

#[tokio::test(start_paused = true)]
async fn test_initialize_rebuilds_without_snapshot() {
    let vault = MemoryVault::new().with_file("page.md", page_md());
    let store = MemorySnapshotStore::new();
    let index = spawn(&vault, &store);

    let outcome = index.initialize().await.unwrap();
    assert_eq!(outcome.source, InitSource::Rebuild);
    assert_eq!(outcome.blocks, 1);

    let block = index.get_block(FIRST).unwrap();
    assert_eq!(block, BlockRecord::new("page.md", "First block", 0));

    // A rebuild persists right away.
    assert_eq!(store.write_count(), 1);
    let stats = index.stats();
    assert!(stats.last_rebuilt.is_some());
    assert!(stats.last_persisted.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_initialize_prefers_snapshot() {
    let snapshot = encode_snapshot(&[(
        SECOND.to_string(),
        BlockRecord::new("old.md", "From snapshot", 3),
    )])
    .unwrap();
    let vault = MemoryVault::new().with_file("page.md", page_md());
    let store = MemorySnapshotStore::with_data(snapshot);
    let index = spawn(&vault, &store);

    let outcome = index.initialize().await.unwrap();
    assert_eq!(outcome.source, InitSource::Snapshot);
    assert_eq!(outcome.blocks, 1);
    assert_eq!(index.get_block(SECOND).unwrap().raw_content, "From snapshot");
    assert!(index.get_block(FIRST).is_none());
    assert_eq!(store.write_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_corrupt_snapshot_falls_back_to_rebuild() {
    let vault = MemoryVault::new().with_file("page.md", page_md());
    let store = MemorySnapshotStore::with_data("{not json");
    let index = spawn(&vault, &store);

    let outcome = index.initialize().await.unwrap();
    assert_eq!(outcome.source, InitSource::Rebuild);
    assert!(index.get_block(FIRST).is_some());
    assert!(store.data().unwrap().contains(FIRST));
}

#[tokio::test(start_paused = true)]
async fn test_file_changed_is_idempotent() {
    let vault = MemoryVault::new().with_file("page.md", page_md());
    let store = MemorySnapshotStore::new();
    let index = spawn(&vault, &store);
    index.initialize().await.unwrap();

    assert_eq!(index.file_changed("page.md").await.unwrap(), 1);
    let once = index.entries();
    assert_eq!(index.file_changed("page.md").await.unwrap(), 1);
    assert_eq!(index.entries(), once);
}

#[tokio::test(start_paused = true)]
async fn test_file_changed_drops_stale_blocks() {
    let vault = MemoryVault::new().with_file("page.md", page_md());
    let store = MemorySnapshotStore::new();
    let index = spawn(&vault, &store);
    index.initialize().await.unwrap();

    vault.insert("page.md", format!("- Rewritten\n  id:: {SECOND}\n"));
    index.file_changed("page.md").await.unwrap();

    assert!(index.get_block(FIRST).is_none());
    assert_eq!(index.get_block(SECOND).unwrap().raw_content, "Rewritten");
}

#[tokio::test(start_paused = true)]
async fn test_unreadable_file_loses_its_blocks() {
    let vault = MemoryVault::new().with_file("page.md", page_md());
    let store = MemorySnapshotStore::new();
    let index = spawn(&vault, &store);
    index.initialize().await.unwrap();

    vault.remove("page.md");
    let result = index.file_changed("page.md").await;

    assert!(matches!(result, Err(IndexError::Vault { .. })));
    assert!(index.get_block(FIRST).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_file_deleted_removes_every_block() {
    let content = format!("- One\n  id:: {FIRST}\n  - Two\n    id:: {SECOND}\n");
    let vault = MemoryVault::new()
        .with_file("page.md", content)
        .with_file("other.md", "- unrelated\n");
    let store = MemorySnapshotStore::new();
    let index = spawn(&vault, &store);
    index.initialize().await.unwrap();
    assert_eq!(index.stats().blocks, 2);

    assert_eq!(index.file_deleted("page.md").await.unwrap(), 2);
    assert!(index
        .entries()
        .iter()
        .all(|(_, block)| block.file_path != "page.md"));
    assert_eq!(index.stats().blocks, 0);
}

#[tokio::test(start_paused = true)]
async fn test_file_renamed_keeps_identity() {
    let vault = MemoryVault::new().with_file("page.md", page_md());
    let store = MemorySnapshotStore::new();
    let index = spawn(&vault, &store);
    index.initialize().await.unwrap();
    let before = index.get_block(FIRST).unwrap();

    assert_eq!(index.file_renamed("page.md", "pages/moved.md").await.unwrap(), 1);

    let after = index.get_block(FIRST).unwrap();
    assert_eq!(after.file_path, "pages/moved.md");
    assert_eq!(after.raw_content, before.raw_content);
    assert_eq!(after.start_line, before.start_line);
    assert_eq!(after.children_ids, before.children_ids);
    assert!(index.find_block_by_file_and_line("page.md", 0).is_none());
    assert!(index.find_block_by_file_and_line("pages/moved.md", 0).is_some());
}

#[tokio::test(start_paused = true)]
async fn test_persistence_is_debounced() {
    let vault = MemoryVault::new().with_file("page.md", page_md());
    let store = MemorySnapshotStore::new();
    let index = spawn(&vault, &store);
    index.initialize().await.unwrap();
    assert_eq!(store.write_count(), 1);

    for _ in 0..5 {
        index.file_changed("page.md").await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    assert_eq!(store.write_count(), 1, "burst must not persist mid-way");

    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(store.write_count(), 2, "burst persists exactly once");

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(store.write_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_flush_writes_pending_snapshot() {
    let vault = MemoryVault::new().with_file("page.md", page_md());
    let store = MemorySnapshotStore::new();
    let index = spawn(&vault, &store);
    index.initialize().await.unwrap();

    index.flush().await.unwrap();
    assert_eq!(store.write_count(), 1, "nothing pending, nothing written");

    index
        .add_block(SECOND, BlockRecord::new("page.md", "Added", 2))
        .await
        .unwrap();
    index.flush().await.unwrap();
    assert_eq!(store.write_count(), 2);
    assert!(store.data().unwrap().contains(SECOND));
}

#[tokio::test(start_paused = true)]
async fn test_add_block_is_visible_immediately() {
    let vault = MemoryVault::new().with_file("page.md", page_md());
    let store = MemorySnapshotStore::new();
    let index = spawn(&vault, &store);
    index.initialize().await.unwrap();

    index
        .add_block(SECOND, BlockRecord::new("page.md", "Refers to", 2))
        .await
        .unwrap();

    let found = index.find_block_by_file_and_line("page.md", 2).unwrap();
    assert_eq!(found.id, SECOND);
    let suggestions = suggest(&index, "refers");
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].id, SECOND);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_flushes_and_stops() {
    let vault = MemoryVault::new().with_file("page.md", page_md());
    let store = MemorySnapshotStore::new();
    let index = spawn(&vault, &store);
    index.initialize().await.unwrap();

    index.file_deleted("page.md").await.unwrap();
    index.shutdown().await.unwrap();

    assert_eq!(store.write_count(), 2);
    assert!(!store.data().unwrap().contains(FIRST));
    assert!(!index.is_running());
    assert!(matches!(
        index.file_changed("page.md").await,
        Err(IndexError::ServiceStopped)
    ));
    // Reads keep answering from the last state.
    assert_eq!(index.stats().blocks, 0);
}

#[tokio::test(start_paused = true)]
async fn test_subscribers_observe_mutations() {
    let vault = MemoryVault::new().with_file("page.md", page_md());
    let store = MemorySnapshotStore::new();
    let index = spawn(&vault, &store);
    let mut generations = index.subscribe();

    index.initialize().await.unwrap();
    assert!(generations.has_changed().unwrap());
    let after_init = *generations.borrow_and_update();

    index.file_changed("page.md").await.unwrap();
    assert!(generations.has_changed().unwrap());
    assert!(*generations.borrow_and_update() > after_init);
}

#[tokio::test(start_paused = true)]
async fn test_events_queue_behind_rebuild() {
    let mut vault = MemoryVault::new();
    for n in 0..20 {
        vault = vault.with_file(format!("p{n:02}.md"), "- filler\n");
    }
    let vault = vault.with_file("page.md", page_md());
    let store = MemorySnapshotStore::new();
    let index = spawn(&vault, &store);
    index.initialize().await.unwrap();

    vault.insert("late.md", format!("- Late\n  id:: {SECOND}\n"));
    let rebuild = index.rebuild();
    let change = index.file_changed("late.md");
    let (rebuilt, changed) = tokio::join!(rebuild, change);

    // The rebuild already saw late.md; the event reindexes it again on top.
    assert_eq!(rebuilt.unwrap(), 2);
    assert_eq!(changed.unwrap(), 1);
    assert_eq!(index.get_block(SECOND).unwrap().file_path, "late.md");
    assert_eq!(index.stats().blocks, 2);
}
