use std::path::{Path, PathBuf};

use tracing::warn;

use crate::consts::SERVICE_EXTENSION;

/// The git remote that holds the service definitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
  pub url: String,
  pub branch: String,
  /// Private key used for SSH remotes. `None` means unauthenticated access.
  pub ssh_key_file: Option<PathBuf>,
}

/// A single file of a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleFile {
  /// Base name of the file, directory stripped and `.enc` removed once decrypted.
  pub file_name: String,
  pub data: Vec<u8>,
  /// True for files sourced from the `customise/` directory.
  pub is_customisation: bool,
}

impl BundleFile {
  pub fn new(file_name: impl Into<String>, data: impl Into<Vec<u8>>, is_customisation: bool) -> Self {
    Self {
      file_name: file_name.into(),
      data: data.into(),
      is_customisation,
    }
  }

  /// The file name without its final extension.
  pub fn stem(&self) -> &str {
    Path::new(&self.file_name)
      .file_stem()
      .and_then(|s| s.to_str())
      .unwrap_or(&self.file_name)
  }

  /// Returns true if this file is a service definition (`<name>.yaml`).
  pub fn is_service_definition(&self) -> bool {
    Path::new(&self.file_name)
      .extension()
      .is_some_and(|ext| ext == SERVICE_EXTENSION)
  }

  /// Service project name of a base definition file.
  ///
  /// Returns `None` for customisations and supporting files.
  pub fn project_name(&self) -> Option<&str> {
    if self.is_customisation || !self.is_service_definition() {
      return None;
    }
    Some(self.stem())
  }
}

/// The set of files to deploy for one commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bundle {
  /// Commit hash the files were read from.
  pub hash: String,
  pub files: Vec<BundleFile>,
}

impl Bundle {
  pub fn new(hash: impl Into<String>) -> Self {
    Self {
      hash: hash.into(),
      files: Vec::new(),
    }
  }

  /// Add a file, replacing any earlier file with the same name.
  ///
  /// File names are base names, so files from different directories can
  /// collide. The last one added wins.
  pub fn push(&mut self, file: BundleFile) {
    if let Some(index) = self.files.iter().position(|f| f.file_name == file.file_name) {
      warn!(file_name = %file.file_name, "duplicate file name in bundle, keeping the later one");
      self.files.remove(index);
    }
    self.files.push(file);
  }

  pub fn with_file(mut self, file: BundleFile) -> Self {
    self.push(file);
    self
  }

  pub fn get(&self, file_name: &str) -> Option<&BundleFile> {
    self.files.iter().find(|f| f.file_name == file_name)
  }

  /// Base service definitions in bundle order.
  pub fn services(&self) -> impl Iterator<Item = &BundleFile> {
    self.files.iter().filter(|f| f.project_name().is_some())
  }

  pub fn customisations(&self) -> impl Iterator<Item = &BundleFile> {
    self.files.iter().filter(|f| f.is_customisation)
  }
}
