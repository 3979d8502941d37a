//! Tree walk and file classification.
//!
//! Walks a checked out repository and turns the files the agent cares about
//! into [`BundleFile`]s:
//!
//! - only `.yaml`, `.json`, `.env` and `.enc` files are kept
//! - files under `customise/` are overrides, and only those whose path
//!   contains this target's selector are kept
//! - `.enc` files are decrypted when a key is configured

use std::fs;
use std::path::{Component, Path};

use tracing::{debug, trace, warn};
use walkdir::WalkDir;

use super::{BundleError, BundleFile};
use crate::consts::{BUNDLE_EXTENSIONS, CUSTOMISE_DIR, ENCRYPTED_EXTENSION};
use crate::secrets;

/// Collect the bundle files of the tree rooted at `root`, in name order.
///
/// The `.git` directory is never descended into. A decryption failure aborts
/// the whole walk, so a bundle is never partially decrypted.
pub fn collect_files(
  root: &Path,
  customisation_selector: &str,
  decryption_key: Option<&[u8]>,
) -> Result<Vec<BundleFile>, BundleError> {
  let mut files = Vec::new();

  let walker = WalkDir::new(root)
    .sort_by_file_name()
    .into_iter()
    .filter_entry(|entry| entry.file_name() != ".git");

  for entry in walker {
    let entry = entry?;
    if !entry.file_type().is_file() {
      continue;
    }

    let Ok(relative) = entry.path().strip_prefix(root) else {
      continue;
    };
    let relative = to_slash_path(relative);

    if let Some(file) = classify(&relative, entry.path(), customisation_selector, decryption_key)? {
      files.push(file);
    }
  }

  if customisation_selector.is_empty() {
    let overrides = files.iter().filter(|f| f.is_customisation).count();
    if overrides > 0 {
      warn!(
        root = %root.display(),
        overrides,
        "empty customisation selector, every file under customise/ is kept"
      );
    }
  }

  debug!(root = %root.display(), files = files.len(), "collected bundle files");
  Ok(files)
}

fn classify(
  relative: &str,
  path: &Path,
  customisation_selector: &str,
  decryption_key: Option<&[u8]>,
) -> Result<Option<BundleFile>, BundleError> {
  let is_customisation = relative.starts_with(CUSTOMISE_DIR);
  if is_customisation && !relative.contains(customisation_selector) {
    trace!(path = relative, "skipping customisation for another target");
    return Ok(None);
  }

  let Some(extension) = path.extension().and_then(|e| e.to_str()) else {
    return Ok(None);
  };
  if !BUNDLE_EXTENSIONS.contains(&extension) {
    trace!(path = relative, "skipping unsupported file");
    return Ok(None);
  }

  let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
    return Ok(None);
  };

  let data = fs::read(path).map_err(|source| BundleError::Read {
    path: path.to_path_buf(),
    source,
  })?;

  let mut file = BundleFile::new(file_name, data, is_customisation);

  if let (ENCRYPTED_EXTENSION, Some(key)) = (extension, decryption_key) {
    file.data = secrets::decrypt(key, file_name, &file.data)?;
    file.file_name = strip_encrypted_suffix(file_name).to_string();
    debug!(path = relative, file_name = %file.file_name, "decrypted bundle file");
  }

  Ok(Some(file))
}

fn strip_encrypted_suffix(file_name: &str) -> &str {
  file_name
    .strip_suffix(ENCRYPTED_EXTENSION)
    .and_then(|name| name.strip_suffix('.'))
    .unwrap_or(file_name)
}

fn to_slash_path(path: &Path) -> String {
  path
    .components()
    .filter_map(|c| match c {
      Component::Normal(part) => part.to_str(),
      _ => None,
    })
    .collect::<Vec<_>>()
    .join("/")
}
