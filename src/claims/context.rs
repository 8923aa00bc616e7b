// src/claims/context.rs — Codebase context collection for verification

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::infra::config::VerifyConfig;
use crate::infra::errors::SpecLoopError;

/// Source text shown to the oracle alongside claims.
#[derive(Debug, Clone, Default)]
pub struct CodebaseContext {
    pub root: PathBuf,
    /// Concatenated `=== path ===` sections.
    pub text: String,
    pub files: Vec<String>,
    /// Set when the character budget cut the listing short.
    pub truncated: bool,
}

impl CodebaseContext {
    /// Gather matching files under `root`, in path order, up to the configured budget.
    pub fn collect(root: &Path, config: &VerifyConfig) -> Result<Self, SpecLoopError> {
        if !root.is_dir() {
            return Err(SpecLoopError::CodebaseNotFound(root.to_path_buf()));
        }

        let mut ctx = CodebaseContext {
            root: root.to_path_buf(),
            ..Default::default()
        };

        let mut used = 0usize;
        for path in matching_files(root, config)? {
            let rel = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");

            // Binary or unreadable files are skipped, not fatal.
            let Ok(content) = std::fs::read_to_string(&path) else {
                tracing::debug!(file = %rel, "Skipping unreadable file");
                continue;
            };

            let section = format!("=== {rel} ===\n{content}\n\n");
            let remaining = config.max_context_chars.saturating_sub(used);
            let len = section.chars().count();

            if len <= remaining {
                ctx.text.push_str(&section);
                ctx.files.push(rel);
                used += len;
                continue;
            }

            if remaining > 0 {
                ctx.text.extend(section.chars().take(remaining));
                ctx.files.push(rel);
            }
            ctx.truncated = true;
            break;
        }

        if ctx.truncated {
            tracing::warn!(
                files = ctx.files.len(),
                max_chars = config.max_context_chars,
                "Codebase context truncated"
            );
        }
        tracing::debug!(
            root = %root.display(),
            files = ctx.files.len(),
            chars = ctx.text.len(),
            "Codebase context collected"
        );
        Ok(ctx)
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn matching_files(
    root: &Path,
    config: &VerifyConfig,
) -> Result<BTreeSet<PathBuf>, SpecLoopError> {
    let base = glob::Pattern::escape(&root.to_string_lossy());
    let mut files = BTreeSet::new();

    for pattern in &config.include {
        let full = format!("{}/{}", base.trim_end_matches('/'), pattern);
        let entries = glob::glob(&full).map_err(|e| {
            SpecLoopError::Config(format!("invalid verify.include pattern '{pattern}': {e}"))
        })?;
        for path in entries.flatten() {
            if path.is_file() && !is_excluded(root, &path, &config.exclude_dirs) {
                files.insert(path);
            }
        }
    }
    Ok(files)
}

fn is_excluded(root: &Path, path: &Path, exclude_dirs: &[String]) -> bool {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components().any(|c| {
        let name = c.as_os_str().to_string_lossy();
        exclude_dirs.iter().any(|d| *d == name)
    })
}
