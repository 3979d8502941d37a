//! Association between base service definitions and their overrides.
//!
//! Override files from `customise/` are linked to a base project purely by
//! naming convention: `web-alpha.yaml` overrides `web`. The prefix must be
//! followed by a separator (`-`, `_` or `.`), or be the whole stem, so
//! `webhook-alpha.yaml` overrides `webhook` and never `web`. When several base
//! names match, the longest one wins.

use std::collections::HashMap;

use tracing::warn;

use super::compose::sanitize_project_name;
use crate::bundle::{Bundle, BundleFile};

const SEPARATORS: &[char] = &['-', '_', '.'];

/// Override lookup for one bundle, keyed by sanitized project name.
#[derive(Debug, Default)]
pub struct OverrideIndex<'a> {
  overrides: HashMap<String, &'a BundleFile>,
}

impl<'a> OverrideIndex<'a> {
  /// Build the index for every base service and customisation in `bundle`.
  ///
  /// At most one override is attached per project; later candidates are
  /// ignored with a warning.
  pub fn build(bundle: &'a Bundle) -> Self {
    let bases: Vec<&str> = bundle.services().filter_map(BundleFile::project_name).collect();
    let mut overrides: HashMap<String, &'a BundleFile> = HashMap::new();

    for custom in bundle.customisations() {
      let Some(base) = best_match(custom.stem(), &bases) else {
        warn!(file_name = %custom.file_name, "customisation does not match any service");
        continue;
      };

      let key = sanitize_project_name(base);
      if let Some(existing) = overrides.get(&key) {
        warn!(
          project = %key,
          kept = %existing.file_name,
          ignored = %custom.file_name,
          "multiple overrides for service"
        );
        continue;
      }
      overrides.insert(key, custom);
    }

    Self { overrides }
  }

  /// The override file for a base project, if any.
  pub fn get(&self, project_name: &str) -> Option<&'a BundleFile> {
    self.overrides.get(&sanitize_project_name(project_name)).copied()
  }

  pub fn len(&self) -> usize {
    self.overrides.len()
  }

  pub fn is_empty(&self) -> bool {
    self.overrides.is_empty()
  }
}

fn best_match<'b>(custom_stem: &str, bases: &[&'b str]) -> Option<&'b str> {
  let custom_stem = custom_stem.to_lowercase();
  bases
    .iter()
    .copied()
    .filter(|base| overrides_base(&custom_stem, &base.to_lowercase()))
    .max_by_key(|base| base.len())
}

fn overrides_base(custom_stem: &str, base: &str) -> bool {
  match custom_stem.strip_prefix(base) {
    Some("") => true,
    Some(rest) => rest.starts_with(SEPARATORS),
    None => false,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn bundle(base: &[&str], custom: &[&str]) -> Bundle {
    let mut bundle = Bundle::new("abc123");
    for name in base {
      bundle.push(BundleFile::new(*name, "", false));
    }
    for name in custom {
      bundle.push(BundleFile::new(*name, "", true));
    }
    bundle
  }

  #[test]
  fn prefix_requires_separator() {
    let bundle = bundle(&["web.yaml", "webhook.yaml"], &["web-prod.yaml"]);
    let index = OverrideIndex::build(&bundle);

    assert_eq!(index.get("web").unwrap().file_name, "web-prod.yaml");
    assert!(index.get("webhook").is_none());
  }

  #[test]
  fn longest_base_wins() {
    let bundle = bundle(&["web.yaml", "web-api.yaml"], &["web-api-alpha.yaml", "web-alpha.yaml"]);
    let index = OverrideIndex::build(&bundle);

    assert_eq!(index.get("web-api").unwrap().file_name, "web-api-alpha.yaml");
    assert_eq!(index.get("web").unwrap().file_name, "web-alpha.yaml");
  }

  #[test]
  fn webhook_override_not_attached_to_web() {
    let bundle = bundle(&["web.yaml"], &["webhook-alpha.yaml"]);
    let index = OverrideIndex::build(&bundle);

    assert!(index.is_empty());
  }

  #[test]
  fn first_override_wins() {
    let bundle = bundle(&["web.yaml"], &["web-alpha.yaml", "web_alpha.yaml"]);
    let index = OverrideIndex::build(&bundle);

    assert_eq!(index.len(), 1);
    assert_eq!(index.get("web").unwrap().file_name, "web-alpha.yaml");
  }

  #[test]
  fn lookup_is_case_insensitive() {
    let bundle = bundle(&["Web.yaml"], &["web-alpha.yaml"]);
    let index = OverrideIndex::build(&bundle);

    assert!(index.get("Web").is_some());
    assert!(index.get("web").is_some());
  }

  #[test]
  fn non_service_files_are_not_bases() {
    let bundle = bundle(&["web.env"], &["web-alpha.yaml"]);
    let index = OverrideIndex::build(&bundle);

    assert!(index.is_empty());
  }

  #[test]
  fn same_stem_overrides() {
    assert!(overrides_base("web", "web"));
    assert!(overrides_base("web.alpha", "web"));
    assert!(!overrides_base("webhook", "web"));
    assert!(!overrides_base("api", "web"));
  }
}
