//! Editor presentation surface: documents, views, preview and decorations.
//!
//! Only the owning edit session calls into the surface, and only in
//! interactive mode. Every method is advisory; the session tolerates failures.

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

use crate::core::decorations::PreviewDecorations;

#[async_trait]
pub trait EditorSurface: Send + Sync {
    /// Whether an open document for `path` has unsaved changes.
    async fn is_dirty(&self, path: &Path) -> Result<bool>;

    /// Save the open document for `path`.
    async fn save_document(&self, path: &Path) -> Result<()>;

    /// Close existing views of `path`. Views the user has dirtied must be
    /// left open rather than force-closed.
    async fn close_views(&self, path: &Path) -> Result<()>;

    /// Open a side-by-side preview seeded with `original`.
    async fn open_preview(&self, path: &Path, original: &str) -> Result<()>;

    /// Show streamed content with the given decorations.
    async fn update_preview(
        &self,
        path: &Path,
        content: &str,
        decorations: &PreviewDecorations,
    ) -> Result<()>;

    async fn clear_decorations(&self, path: &Path) -> Result<()>;

    /// Show a complete before/after view of the edit.
    async fn show_diff(&self, path: &Path, original: &str, updated: &str) -> Result<()>;

    async fn close_preview(&self, path: &Path) -> Result<()>;
}

/// Surface for hosts without an editor (CLI, servers).
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlessSurface;

#[async_trait]
impl EditorSurface for HeadlessSurface {
    async fn is_dirty(&self, _path: &Path) -> Result<bool> {
        Ok(false)
    }

    async fn save_document(&self, _path: &Path) -> Result<()> {
        Ok(())
    }

    async fn close_views(&self, _path: &Path) -> Result<()> {
        Ok(())
    }

    async fn open_preview(&self, _path: &Path, _original: &str) -> Result<()> {
        Ok(())
    }

    async fn update_preview(
        &self,
        _path: &Path,
        _content: &str,
        _decorations: &PreviewDecorations,
    ) -> Result<()> {
        Ok(())
    }

    async fn clear_decorations(&self, _path: &Path) -> Result<()> {
        Ok(())
    }

    async fn show_diff(&self, _path: &Path, _original: &str, _updated: &str) -> Result<()> {
        Ok(())
    }

    async fn close_preview(&self, _path: &Path) -> Result<()> {
        Ok(())
    }
}
