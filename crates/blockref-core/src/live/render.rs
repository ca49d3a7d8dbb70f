//! Turning referenced blocks into HTML fragments.
//!
//! [`MarkdownRenderer`] is the markdown collaborator; [`HtmlRenderer`] is the
//! bundled implementation on top of `pulldown-cmark`. [`BlockRenderer`]
//! builds on it: plain references render one block inline, embeds render a
//! block and, recursively, its children.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use blockref_parser::BlockRecord;
use futures::future::BoxFuture;
use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag};

use crate::error::Result;
use crate::index::{BlockIndex, IndexHandle};

const ASSET_PREFIX: &str = "../assets/";

/// Renders a markdown string into an HTML fragment.
#[async_trait]
pub trait MarkdownRenderer: Send + Sync {
    /// `source_path` is the vault-relative file the markdown came from; relative
    /// links resolve against it.
    async fn render(&self, markdown: &str, source_path: &str) -> Result<String>;
}

/// CommonMark rendering with vault-relative asset links.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlRenderer;

impl HtmlRenderer {
    pub fn new() -> Self {
        Self
    }

    pub fn render_html(&self, markdown: &str, source_path: &str) -> String {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);

        let parser = Parser::new_ext(markdown, options).map(|event| match event {
            Event::Start(Tag::Link {
                link_type,
                dest_url,
                title,
                id,
            }) => Event::Start(Tag::Link {
                link_type,
                dest_url: rewrite_asset_link(dest_url, source_path),
                title,
                id,
            }),
            Event::Start(Tag::Image {
                link_type,
                dest_url,
                title,
                id,
            }) => Event::Start(Tag::Image {
                link_type,
                dest_url: rewrite_asset_link(dest_url, source_path),
                title,
                id,
            }),
            other => other,
        });

        let mut output = String::new();
        html::push_html(&mut output, parser);
        output
    }
}

#[async_trait]
impl MarkdownRenderer for HtmlRenderer {
    async fn render(&self, markdown: &str, source_path: &str) -> Result<String> {
        Ok(self.render_html(markdown, source_path))
    }
}

fn rewrite_asset_link<'a>(dest_url: CowStr<'a>, source_path: &str) -> CowStr<'a> {
    if dest_url.starts_with(ASSET_PREFIX) {
        CowStr::from(resolve_vault_path(source_path, &dest_url))
    } else {
        dest_url
    }
}

/// Resolve `relative` against the directory of the vault file `source_path`.
///
/// `..` never climbs above the vault root.
pub fn resolve_vault_path(source_path: &str, relative: &str) -> String {
    let mut segments: Vec<&str> = source_path.split('/').collect();
    segments.pop();

    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.retain(|segment| !segment.is_empty());
    segments.join("/")
}

/// Fragment shown for a reference whose block is not in the index.
pub fn not_found_html(uuid: &str) -> String {
    format!(r#"<span class="blockref-error">Block not found: (({uuid}))</span>"#)
}

/// Fragment shown while a reference is being resolved.
pub fn loading_html(uuid: &str) -> String {
    format!(r#"<span class="blockref-loading" data-block-id="{uuid}">Loading...</span>"#)
}

/// Where block records are looked up during rendering.
pub trait BlockSource: Send + Sync {
    fn lookup(&self, id: &str) -> Option<BlockRecord>;
}

impl BlockSource for IndexHandle {
    fn lookup(&self, id: &str) -> Option<BlockRecord> {
        self.get_block(id)
    }
}

impl BlockSource for BlockIndex {
    fn lookup(&self, id: &str) -> Option<BlockRecord> {
        self.get(id).cloned()
    }
}

/// Renders resolved references, including embed children.
pub struct BlockRenderer {
    source: Arc<dyn BlockSource>,
    markdown: Arc<dyn MarkdownRenderer>,
    max_depth: usize,
}

impl BlockRenderer {
    pub fn new(
        source: Arc<dyn BlockSource>,
        markdown: Arc<dyn MarkdownRenderer>,
        max_depth: usize,
    ) -> Self {
        Self {
            source,
            markdown,
            max_depth,
        }
    }

    pub fn lookup(&self, id: &str) -> Option<BlockRecord> {
        self.source.lookup(id)
    }

    /// Render an already looked-up block as a plain reference or an embed.
    pub async fn render_block(&self, id: &str, block: &BlockRecord, is_embed: bool) -> Result<String> {
        if is_embed {
            let mut ancestors = HashSet::from([id.to_string()]);
            let body = self.render_embed_body(block, 0, &mut ancestors).await?;
            Ok(format!(
                r#"<div class="blockref-embed" data-block-id="{id}">{body}</div>"#
            ))
        } else {
            let rendered = self.markdown.render(&block.raw_content, &block.file_path).await?;
            Ok(format!(
                r#"<span class="blockref-ref" data-block-id="{id}">{}</span>"#,
                unwrap_paragraph(&rendered)
            ))
        }
    }

    /// Look up and render `id`, or `None` when the block is unknown.
    pub async fn render_reference(&self, id: &str, is_embed: bool) -> Result<Option<String>> {
        match self.lookup(id) {
            Some(block) => self.render_block(id, &block, is_embed).await.map(Some),
            None => Ok(None),
        }
    }

    fn render_embed_body<'a>(
        &'a self,
        block: &'a BlockRecord,
        depth: usize,
        ancestors: &'a mut HashSet<String>,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let mut html = self.markdown.render(&block.raw_content, &block.file_path).await?;
            if depth >= self.max_depth || block.children_ids.is_empty() {
                return Ok(html);
            }

            html.push_str(r#"<div class="blockref-embed-children">"#);
            for child_id in &block.children_ids {
                // A block reachable from itself renders nothing further.
                if ancestors.contains(child_id) {
                    continue;
                }
                let Some(child) = self.lookup(child_id) else {
                    continue;
                };
                ancestors.insert(child_id.clone());
                let child_html = self.render_embed_body(&child, depth + 1, ancestors).await;
                ancestors.remove(child_id);

                html.push_str(&format!(
                    r#"<div class="blockref-embed-child" data-block-id="{child_id}">{}</div>"#,
                    child_html?
                ));
            }
            html.push_str("</div>");
            Ok(html)
        })
    }
}

/// Strip the single `<p>` wrapper from a one-paragraph fragment.
fn unwrap_paragraph(html: &str) -> &str {
    let trimmed = html.trim_end();
    match trimmed
        .strip_prefix("<p>")
        .and_then(|inner| inner.strip_suffix("</p>"))
    {
        Some(inner) if !inner.contains("<p>") => inner,
        _ => html,
    }
}
