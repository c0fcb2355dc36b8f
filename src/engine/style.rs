use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::RenderError;

/// An immutable style definition.
///
/// The markup is opaque to this crate; only the engine interprets it. `base`
/// is the directory relative resources in the style resolve against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StyleSource {
    markup: Arc<str>,
    base: Option<PathBuf>,
}

impl StyleSource {
    pub fn new(markup: impl Into<Arc<str>>) -> Self {
        Self {
            markup: markup.into(),
            base: None,
        }
    }

    pub fn with_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.base = Some(base.into());
        self
    }

    /// Load a style from disk, using the file's directory as base path.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, RenderError> {
        let path = path.as_ref();
        let markup = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| RenderError::StyleLoad {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        let source = Self::new(markup);
        Ok(match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => source.with_base(dir),
            _ => source,
        })
    }

    pub fn markup(&self) -> &str {
        &self.markup
    }

    pub fn base(&self) -> Option<&Path> {
        self.base.as_deref()
    }

    /// Resolve a resource path referenced by the style.
    pub fn resolve(&self, resource: impl AsRef<Path>) -> PathBuf {
        let resource = resource.as_ref();
        match &self.base {
            Some(base) if resource.is_relative() => base.join(resource),
            _ => resource.to_path_buf(),
        }
    }
}
