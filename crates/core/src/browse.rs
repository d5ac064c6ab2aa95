//! Server filesystem browsing and geodatabase enumeration.
//!
//! Directory entries are classified by name and type:
//!
//! | Kind     | Rule                                  |
//! |----------|---------------------------------------|
//! | `gdb`    | directory whose name ends in `.gdb`   |
//! | `sde`    | file whose name ends in `.sde`        |
//! | `folder` | any other directory                   |
//! | `file`   | anything else                         |

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::scripting::subprocess::run_to_completion;
use crate::scripting::{ScriptCatalog, ScriptError};
use crate::types::Timestamp;

#[derive(Debug, thiserror::Error)]
pub enum BrowseError {
    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("Path must be a directory: {0}")]
    NotADirectory(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Classification of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Gdb,
    Sde,
    Folder,
    File,
}

/// Which entries a browse request wants to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowseFilter {
    Gdb,
    Sde,
    Folder,
    #[default]
    All,
}

impl BrowseFilter {
    /// Folders always pass so the user can keep navigating; plain files only
    /// pass under [`BrowseFilter::All`].
    pub fn accepts(self, kind: ItemKind) -> bool {
        match self {
            Self::All => true,
            Self::Gdb => matches!(kind, ItemKind::Gdb | ItemKind::Folder),
            Self::Sde => matches!(kind, ItemKind::Sde | ItemKind::Folder),
            Self::Folder => kind == ItemKind::Folder,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowseItem {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub size: Option<u64>,
    pub modified: Option<Timestamp>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowseListing {
    pub current_path: String,
    pub parent_path: Option<String>,
    pub items: Vec<BrowseItem>,
    pub roots: Vec<String>,
}

/// Filesystem roots offered when no path is given.
pub fn filesystem_roots() -> Vec<String> {
    vec![std::path::MAIN_SEPARATOR.to_string()]
}

/// Classify an entry by name and whether it is a directory.
pub fn classify(name: &str, is_dir: bool) -> ItemKind {
    let lower = name.to_lowercase();
    match (is_dir, lower.ends_with(".gdb"), lower.ends_with(".sde")) {
        (true, true, _) => ItemKind::Gdb,
        (true, false, _) => ItemKind::Folder,
        (false, _, true) => ItemKind::Sde,
        (false, _, false) => ItemKind::File,
    }
}

/// Sort key: folders first, then case-insensitive name.
fn sort_items(items: &mut [BrowseItem]) {
    items.sort_by(|a, b| {
        let a_rank = u8::from(a.kind != ItemKind::Folder);
        let b_rank = u8::from(b.kind != ItemKind::Folder);
        a_rank
            .cmp(&b_rank)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
}

/// List the directory at `path`, keeping entries accepted by `filter`.
///
/// An empty path lists the filesystem roots. Entries that cannot be read
/// (permissions, races with deletion) are skipped.
pub async fn browse(path: &str, filter: BrowseFilter) -> Result<BrowseListing, BrowseError> {
    let path = path.trim();
    if path.is_empty() {
        let roots = filesystem_roots();
        return Ok(BrowseListing {
            current_path: String::new(),
            parent_path: None,
            items: roots
                .iter()
                .map(|root| BrowseItem {
                    name: root.clone(),
                    path: root.clone(),
                    kind: ItemKind::Folder,
                    size: None,
                    modified: None,
                })
                .collect(),
            roots,
        });
    }

    let dir = PathBuf::from(path);
    let metadata = match tokio::fs::metadata(&dir).await {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(BrowseError::NotFound(path.to_string()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(BrowseError::PermissionDenied(path.to_string()))
        }
        Err(e) => return Err(BrowseError::Io(e)),
    };
    if !metadata.is_dir() {
        return Err(BrowseError::NotADirectory(path.to_string()));
    }

    let mut entries = match tokio::fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(BrowseError::PermissionDenied(path.to_string()))
        }
        Err(e) => return Err(BrowseError::Io(e)),
    };

    let mut items = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let entry_path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();

        // Follow symlinks so a linked .gdb directory is still a geodatabase.
        let meta = match tokio::fs::metadata(&entry_path).await {
            Ok(meta) => meta,
            Err(e) => {
                tracing::debug!(path = %entry_path.display(), error = %e, "Skipping unreadable entry");
                continue;
            }
        };

        let kind = classify(&name, meta.is_dir());
        if !filter.accepts(kind) {
            continue;
        }

        items.push(BrowseItem {
            name,
            path: entry_path.to_string_lossy().into_owned(),
            kind,
            size: (!meta.is_dir()).then(|| meta.len()),
            modified: meta.modified().ok().map(DateTime::<Utc>::from),
        });
    }

    sort_items(&mut items);

    Ok(BrowseListing {
        current_path: dir.to_string_lossy().into_owned(),
        parent_path: parent_of(&dir),
        items,
        roots: filesystem_roots(),
    })
}

fn parent_of(dir: &Path) -> Option<String> {
    dir.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.to_string_lossy().into_owned())
}

/// Enumerate feature classes and tables in a geodatabase by running the
/// catalog's enumeration script with `container` as its only argument.
///
/// The script's JSON stdout is returned verbatim.
pub async fn list_feature_classes(
    catalog: &ScriptCatalog,
    container: &str,
    timeout: Duration,
) -> Result<Value, ScriptError> {
    let descriptor = catalog.enumeration_descriptor();
    descriptor.verify().await?;

    let mut cmd = descriptor.command_with_arg(container);
    let output = run_to_completion(&mut cmd, None, timeout).await?;

    if output.exit_code != 0 {
        let detail = if output.stderr.trim().is_empty() {
            output.stdout.trim().to_string()
        } else {
            output.stderr.trim().to_string()
        };
        return Err(ScriptError::ExecutionFailed {
            exit_code: output.exit_code,
            stderr: detail,
        });
    }

    output.parsed_output.ok_or_else(|| {
        ScriptError::InvalidOutput("enumeration script did not print JSON".to_string())
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
