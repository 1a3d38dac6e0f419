//! Configuration for template rendering

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Default limit on nested `{file:...}` includes
pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 16;

/// Configuration options for rendering
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Directories searched first for relative include paths
    pub include_dirs: Vec<PathBuf>,

    /// Root (configuration) directory, searched after `include_dirs`
    pub root_dir: Option<PathBuf>,

    /// How deep includes may nest before rendering fails
    pub max_include_depth: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            include_dirs: Vec::new(),
            root_dir: None,
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
        }
    }
}

impl RenderConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an include directory
    pub fn with_include_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.include_dirs.push(dir.into());
        self
    }

    /// Set the root directory
    pub fn with_root_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.root_dir = Some(dir.into());
        self
    }

    /// Set the include depth limit
    pub fn with_max_include_depth(mut self, depth: usize) -> Self {
        self.max_include_depth = depth;
        self
    }

    /// Base directories for a relative include, in search order
    ///
    /// `current_dir` is the directory of the file doing the including, if any.
    pub fn search_dirs(&self, current_dir: Option<&Path>) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = self.include_dirs.clone();
        dirs.extend(self.root_dir.iter().cloned());
        dirs.extend(current_dir.map(Path::to_path_buf));
        dirs
    }
}
