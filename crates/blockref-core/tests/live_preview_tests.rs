//! Live preview: scanning, resolution, cancellation and overlay upkeep

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use blockref_core::live::{not_found_html, OverlayState, Resolution};
use blockref_core::{
    BlockIndex, BlockRenderer, HtmlRenderer, IndexError, IndexOptions, IndexService,
    LiveDocument, LivePreview, MarkdownRenderer, MemorySnapshotStore, MemoryVault, SurfaceEvent,
    TextEdit,
};
use blockref_parser::parse_blocks;
use tokio::sync::mpsc;
use tokio::time::Instant;

const FIRST: &str = "11111111-1111-1111-1111-111111111111";
const MISSING: &str = "33333333-3333-3333-3333-333333333333";
const SCAN_DEBOUNCE: Duration = Duration::from_millis(300);

fn page_md() -> String {
    format!("- First block\n  id:: {FIRST}\n- Refers to (({FIRST}))\n")
}

fn index_of(path: &str, content: &str) -> BlockIndex {
    BlockIndex::from_entries(
        parse_blocks(path, content)
            .into_iter()
            .map(|entry| (entry.id, entry.block)),
    )
}

fn blocks(index: BlockIndex, markdown: Arc<dyn MarkdownRenderer>) -> Arc<BlockRenderer> {
    Arc::new(BlockRenderer::new(Arc::new(index), markdown, 8))
}

fn preview(text: &str, blocks: Arc<BlockRenderer>) -> LivePreview {
    LivePreview::new(LiveDocument::new("page.md", text), blocks, SCAN_DEBOUNCE)
}

/// Renders like [`HtmlRenderer`] after a delay, counting calls.
#[derive(Default)]
struct SlowRenderer {
    calls: AtomicUsize,
}

#[async_trait]
impl MarkdownRenderer for SlowRenderer {
    async fn render(&self, markdown: &str, source_path: &str) -> blockref_core::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(1)).await;
        Ok(HtmlRenderer::new().render_html(markdown, source_path))
    }
}

struct FailingRenderer;

#[async_trait]
impl MarkdownRenderer for FailingRenderer {
    async fn render(&self, _markdown: &str, _source_path: &str) -> blockref_core::Result<String> {
        Err(IndexError::Render("renderer unavailable".to_string()))
    }
}

fn rendered_html(preview: &LivePreview) -> Vec<String> {
    preview
        .document()
        .overlay()
        .entries()
        .iter()
        .filter_map(|entry| match &entry.state {
            OverlayState::Rendered { html } => Some(html.clone()),
            OverlayState::Loading { .. } => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_reference_renders_in_place() {
    let text = page_md();
    let mut preview = preview(
        &text,
        blocks(index_of("page.md", &text), Arc::new(HtmlRenderer::new())),
    );

    preview.settle().await;

    let overlay = preview.document().overlay();
    assert_eq!(overlay.len(), 1);
    let entry = &overlay.entries()[0];
    let reference = format!("(({FIRST}))");
    let start = text.find(&reference).unwrap();
    assert_eq!(entry.span(), start..start + reference.len());

    let materialized = preview.document().materialize();
    assert!(materialized.contains(&format!(
        r#"- Refers to <span class="blockref-ref" data-block-id="{FIRST}">First block</span>"#
    )));
}

#[tokio::test(start_paused = true)]
async fn test_index_handle_backs_rendering() {
    let vault = MemoryVault::new().with_file("page.md", page_md());
    let index = IndexService::spawn(
        Arc::new(vault.clone()),
        Arc::new(MemorySnapshotStore::new()),
        IndexOptions::default(),
    );
    index.initialize().await.unwrap();

    let renderer = Arc::new(BlockRenderer::new(
        Arc::new(index.clone()),
        Arc::new(HtmlRenderer::new()),
        8,
    ));
    let mut preview = preview(&page_md(), renderer);
    preview.settle().await;
    assert!(rendered_html(&preview)[0].contains("First block"));

    vault.insert("page.md", format!("- Updated block\n  id:: {FIRST}\n"));
    index.file_changed("page.md").await.unwrap();
    preview.refresh();
    preview.settle().await;

    let html = rendered_html(&preview);
    assert_eq!(html.len(), 1);
    assert!(html[0].contains("Updated block"));
}

#[tokio::test(start_paused = true)]
async fn test_unknown_block_renders_not_found() {
    let text = format!("- see (({MISSING}))");
    let mut preview = preview(
        &text,
        blocks(BlockIndex::new(), Arc::new(HtmlRenderer::new())),
    );

    preview.settle().await;

    assert_eq!(rendered_html(&preview), vec![not_found_html(MISSING)]);
    assert_eq!(
        preview.coordinator().last_resolution(6),
        Some(Resolution::NotFound)
    );
}

#[tokio::test(start_paused = true)]
async fn test_embed_renders_block_with_rewritten_assets() {
    let content = format!("- ![pic](../assets/pic.png)\n  id:: {FIRST}\n");
    let text = format!("{{{{embed (({FIRST}))}}}}");
    let mut preview = preview(
        &text,
        blocks(index_of("pages/a.md", &content), Arc::new(HtmlRenderer::new())),
    );

    preview.settle().await;

    let html = rendered_html(&preview);
    assert_eq!(html.len(), 1);
    assert!(html[0].starts_with(r#"<div class="blockref-embed""#), "{}", html[0]);
    assert!(html[0].contains(r#"src="assets/pic.png""#), "{}", html[0]);
    assert_eq!(preview.document().overlay().entries()[0].span(), 0..text.len());
}

#[tokio::test(start_paused = true)]
async fn test_repeated_scans_keep_one_resolution_in_flight() {
    let text = page_md();
    let slow = Arc::new(SlowRenderer::default());
    let mut preview = preview(&text, blocks(index_of("page.md", &text), slow.clone()));

    preview.scan_now();
    preview.scan_now();
    preview.scan_now();

    assert_eq!(preview.coordinator().started(), 1);
    assert_eq!(preview.coordinator().in_flight(), 1);

    preview.settle().await;
    assert_eq!(slow.calls.load(Ordering::SeqCst), 1);
    assert_eq!(rendered_html(&preview).len(), 1);

    // Rendered spans are not resolved again.
    preview.scan_now();
    assert_eq!(preview.coordinator().started(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_deleted_reference_never_renders() {
    let text = page_md();
    let slow = Arc::new(SlowRenderer::default());
    let mut preview = preview(&text, blocks(index_of("page.md", &text), slow.clone()));

    preview.scan_now();
    tokio::task::yield_now().await;

    let reference = format!("(({FIRST}))");
    let start = text.find(&reference).unwrap();
    preview
        .edit(TextEdit::delete(start, start + reference.len()))
        .unwrap();
    preview.scan_now();

    tokio::time::sleep(Duration::from_secs(5)).await;
    preview.drain_effects();

    assert!(rendered_html(&preview).is_empty());
    assert!(preview.document().overlay().is_empty());
    assert_eq!(preview.coordinator().in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_reference_leaving_the_viewport_is_cancelled() {
    let text = page_md();
    let slow = Arc::new(SlowRenderer::default());
    let mut preview = preview(&text, blocks(index_of("page.md", &text), slow.clone()));

    preview.scan_now();
    tokio::task::yield_now().await;
    assert_eq!(preview.coordinator().in_flight(), 1);

    // The reference text is untouched; it just is not scanned any more.
    preview.set_viewport(vec![0..5]);
    preview.scan_now();
    preview.settle().await;

    assert_eq!(slow.calls.load(Ordering::SeqCst), 1);
    assert!(rendered_html(&preview).is_empty());
    assert_eq!(preview.coordinator().cancelled(), 1);
    assert_eq!(preview.coordinator().in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_edits_above_an_inflight_reference_keep_its_resolution() {
    let text = page_md();
    let slow = Arc::new(SlowRenderer::default());
    let mut preview = preview(&text, blocks(index_of("page.md", &text), slow.clone()));

    preview.scan_now();
    for _ in 0..5 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        preview.edit(TextEdit::insert(0, "x")).unwrap();
        tokio::time::sleep(SCAN_DEBOUNCE).await;
        preview.scan_now();
    }

    assert_eq!(preview.coordinator().started(), 1);
    assert_eq!(preview.coordinator().cancelled(), 0);
    assert_eq!(rendered_html(&preview).len(), 1);

    preview.settle().await;
    assert_eq!(slow.calls.load(Ordering::SeqCst), 1);
    assert_eq!(preview.coordinator().started(), 1);

    let reference = format!("(({FIRST}))");
    let start = text.find(&reference).unwrap() + 5;
    assert_eq!(
        preview.document().overlay().entries()[0].span(),
        start..start + reference.len()
    );
}

#[tokio::test(start_paused = true)]
async fn test_edits_shift_rendered_visuals() {
    let text = page_md();
    let mut preview = preview(
        &text,
        blocks(index_of("page.md", &text), Arc::new(HtmlRenderer::new())),
    );
    preview.settle().await;
    let before = preview.document().overlay().entries()[0].span();

    preview.edit(TextEdit::insert(0, "- New first\n")).unwrap();
    preview.settle().await;

    let after = preview.document().overlay().entries()[0].span();
    assert_eq!(after, before.start + 12..before.end + 12);
    assert_eq!(rendered_html(&preview).len(), 1);
    assert_eq!(preview.coordinator().started(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_edit_inside_reference_drops_its_visual() {
    let text = page_md();
    let mut preview = preview(
        &text,
        blocks(index_of("page.md", &text), Arc::new(HtmlRenderer::new())),
    );
    preview.settle().await;

    let start = text.find("((").unwrap();
    // Breaks the uuid, so the span is no longer a reference.
    preview.edit(TextEdit::insert(start + 4, "x")).unwrap();
    preview.settle().await;

    assert!(preview.document().overlay().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_scan_debounce_restarts_on_each_edit() {
    let mut preview = preview(
        "- plain text",
        blocks(BlockIndex::new(), Arc::new(HtmlRenderer::new())),
    );
    preview.scan_now();
    assert_eq!(preview.scan_count(), 1);

    let start = Instant::now();
    preview.edit(TextEdit::insert(12, " a")).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    preview.edit(TextEdit::insert(14, " b")).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    preview.edit(TextEdit::insert(16, " c")).unwrap();
    assert!(preview.is_scan_pending());

    preview.settle().await;

    assert_eq!(start.elapsed(), Duration::from_millis(200) + SCAN_DEBOUNCE);
    assert_eq!(preview.scan_count(), 2);
    assert_eq!(preview.document().text(), "- plain text a b c");
}

#[tokio::test(start_paused = true)]
async fn test_viewport_limits_scanning() {
    let text = page_md();
    let mut preview = preview(
        &text,
        blocks(index_of("page.md", &text), Arc::new(HtmlRenderer::new())),
    );

    preview.set_viewport(vec![0..5]);
    preview.settle().await;
    assert!(preview.document().overlay().is_empty());

    preview.set_viewport(vec![0..text.len()]);
    preview.settle().await;
    assert_eq!(rendered_html(&preview).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_render_failure_stays_loading_without_retry() {
    let text = page_md();
    let mut preview = preview(
        &text,
        blocks(index_of("page.md", &text), Arc::new(FailingRenderer)),
    );

    preview.settle().await;

    let overlay = preview.document().overlay();
    assert_eq!(overlay.len(), 1);
    let entry = &overlay.entries()[0];
    assert!(matches!(&entry.state, OverlayState::Loading { uuid } if uuid == FIRST));
    assert_eq!(
        preview.coordinator().last_resolution(entry.from),
        Some(Resolution::Failed)
    );

    preview.scan_now();
    preview.settle().await;
    assert_eq!(preview.coordinator().started(), 1);

    // A refresh forgets the failure and tries again.
    preview.refresh();
    preview.settle().await;
    assert_eq!(preview.coordinator().started(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_run_drives_preview_from_surface_events() {
    let text = "- nothing yet\n".to_string();
    let blocks = blocks(
        index_of("page.md", &page_md()),
        Arc::new(HtmlRenderer::new()),
    );
    let preview = preview(&text, blocks);
    let (tx, rx) = mpsc::channel(16);

    let surface = tokio::spawn(async move {
        tx.send(SurfaceEvent::Edit(TextEdit::insert(
            14,
            format!("- (({FIRST}))"),
        )))
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        tx.send(SurfaceEvent::Close).await.unwrap();
    });

    let document = preview.run(rx).await;
    surface.await.unwrap();

    assert_eq!(document.text(), format!("- nothing yet\n- (({FIRST}))"));
    assert!(document
        .materialize()
        .contains(r#"<span class="blockref-ref""#));
}
