//! File event types and filtering.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;
use uuid::Uuid;

use crate::error::Result;

/// A debounced file system event.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FileEvent {
    pub id: Uuid,
    pub kind: FileEventKind,
    /// For moves, the destination.
    pub path: PathBuf,
    pub timestamp: DateTime<Utc>,
    pub is_dir: bool,
}

impl FileEvent {
    pub fn new(kind: FileEventKind, path: PathBuf) -> Self {
        let is_dir = path.is_dir();
        Self {
            id: Uuid::new_v4(),
            kind,
            path,
            timestamp: Utc::now(),
            is_dir,
        }
    }

    pub fn moved(from: PathBuf, to: PathBuf) -> Self {
        Self::new(
            FileEventKind::Moved {
                from,
                to: to.clone(),
            },
            to,
        )
    }

    /// Lowercased extension of `path`.
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.path)
    }

    /// Every path the event touches.
    pub fn paths(&self) -> Vec<&Path> {
        match &self.kind {
            FileEventKind::Moved { from, to } => vec![from.as_path(), to.as_path()],
            _ => vec![self.path.as_path()],
        }
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()?.to_str().map(str::to_lowercase)
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum FileEventKind {
    Created,
    Modified,
    Deleted,
    Moved { from: PathBuf, to: PathBuf },
}

impl FileEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
            Self::Moved { .. } => "moved",
        }
    }
}

/// Which events reach the handlers.
///
/// A move passes when either side passes.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    extensions: Vec<String>,
    patterns: Vec<String>,
    exclude: Option<GlobSet>,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only pass paths with this extension (case-insensitive). May be repeated.
    pub fn with_extension(mut self, ext: impl Into<String>) -> Self {
        self.extensions.push(ext.into().to_lowercase());
        self
    }

    /// Drop paths matching the glob.
    pub fn exclude_glob(mut self, pattern: &str) -> Result<Self> {
        self.patterns.push(pattern.to_string());
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.patterns {
            builder.add(Glob::new(pattern)?);
        }
        self.exclude = Some(builder.build()?);
        Ok(self)
    }

    pub fn matches(&self, event: &FileEvent) -> bool {
        event.paths().into_iter().any(|path| self.matches_path(path))
    }

    fn matches_path(&self, path: &Path) -> bool {
        if !self.extensions.is_empty() {
            match extension_of(path) {
                Some(ext) if self.extensions.contains(&ext) => {}
                _ => return false,
            }
        }
        !self
            .exclude
            .as_ref()
            .is_some_and(|exclude| exclude.is_match(path))
    }
}
