//! Git access for the deployment repository.
//!
//! Two operations are needed:
//! - resolving the remote branch head without cloning
//! - a shallow, single-branch clone of that branch
//!
//! Both are blocking network calls. SSH remotes authenticate with the
//! configured private key by pointing `core.sshCommand` at it.

use std::num::NonZeroU32;
use std::path::Path;

use gix::remote::Direction;
use tracing::{debug, info};

use super::{BundleError, Repository};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Resolve the commit hash of the configured branch on the remote.
///
/// Lists the remote's references through a throwaway bare repository; no
/// objects are fetched.
pub fn remote_head(repository: &Repository) -> Result<String, BundleError> {
  let list_error = |source: BoxError| BundleError::RemoteList {
    url: repository.url.clone(),
    source,
  };

  let scratch = tempfile::TempDir::new().map_err(BundleError::ScratchDir)?;
  gix::init_bare(scratch.path()).map_err(|e| list_error(Box::new(e)))?;

  let options = gix::open::Options::isolated().config_overrides(config_overrides(repository));
  let repo = gix::open_opts(scratch.path(), options).map_err(|e| list_error(Box::new(e)))?;

  let refspec = branch_refspec(&repository.branch);
  let remote = repo
    .remote_at(repository.url.as_str())
    .map_err(|e| list_error(Box::new(e)))?
    .with_refspecs(Some(refspec.as_str()), Direction::Fetch)
    .map_err(|e| list_error(Box::new(e)))?;

  let connection = remote.connect(Direction::Fetch).map_err(|e| list_error(Box::new(e)))?;
  let prepared = connection
    .prepare_fetch(gix::progress::Discard, Default::default())
    .map_err(|e| list_error(Box::new(e)))?;

  let branch_ref = format!("refs/heads/{}", repository.branch);
  let head = prepared
    .ref_map()
    .mappings
    .iter()
    .filter(|mapping| mapping.remote.as_name().is_some_and(|name| name == branch_ref.as_str()))
    .find_map(|mapping| mapping.remote.as_id())
    .filter(|id| !id.is_null())
    .map(|id| id.to_string());

  match head {
    Some(hash) => {
      debug!(repo = %repository.url, branch = %repository.branch, commit_hash = %hash, "resolved remote head");
      Ok(hash)
    }
    None => Err(BundleError::BranchNotFound {
      url: repository.url.clone(),
      branch: repository.branch.clone(),
    }),
  }
}

/// Shallow clone the configured branch into `dest` and return the HEAD commit hash.
///
/// `dest` must be empty or not exist yet.
pub fn shallow_clone(repository: &Repository, dest: &Path) -> Result<String, BundleError> {
  let clone_error = |source: BoxError| BundleError::Clone {
    url: repository.url.clone(),
    source,
  };

  info!(repo = %repository.url, branch = %repository.branch, path = %dest.display(), "cloning repository");

  let refspec = branch_refspec(&repository.branch);
  let mut prepared = gix::prepare_clone(repository.url.as_str(), dest)
    .map_err(|e| clone_error(Box::new(e)))?
    .with_in_memory_config_overrides(config_overrides(repository))
    .with_shallow(gix::remote::fetch::Shallow::DepthAtRemote(NonZeroU32::MIN))
    .with_ref_name(Some(repository.branch.as_str()))
    .map_err(|e| clone_error(Box::new(e)))?
    .configure_remote(move |mut remote| {
      remote.replace_refspecs(Some(refspec.as_str()), Direction::Fetch)?;
      Ok(remote)
    });

  let (mut checkout, _outcome) = prepared
    .fetch_then_checkout(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
    .map_err(|e| clone_error(Box::new(e)))?;

  let (repo, _outcome) = checkout
    .main_worktree(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
    .map_err(|e| clone_error(Box::new(e)))?;

  let mut head = repo.head().map_err(|e| BundleError::ResolveHead(e.to_string()))?;
  let commit = head
    .peel_to_commit()
    .map_err(|e| BundleError::ResolveHead(e.to_string()))?;

  Ok(commit.id.to_string())
}

fn branch_refspec(branch: &str) -> String {
  format!("+refs/heads/{branch}:refs/remotes/origin/{branch}")
}

fn config_overrides(repository: &Repository) -> Vec<String> {
  match &repository.ssh_key_file {
    Some(key) => vec![format!(
      "core.sshCommand=ssh -i {} -o IdentitiesOnly=yes -o StrictHostKeyChecking=accept-new",
      key.display()
    )],
    None => Vec::new(),
  }
}

#[cfg(test)]
mod tests {
  use std::path::PathBuf;

  use super::*;
  use crate::bundle::fixtures::LocalRemote;

  fn repository(ssh_key_file: Option<&str>) -> Repository {
    Repository {
      url: "git@example.com:acme/deployments.git".to_string(),
      branch: "main".to_string(),
      ssh_key_file: ssh_key_file.map(PathBuf::from),
    }
  }

  #[test]
  fn refspec_tracks_single_branch() {
    assert_eq!(branch_refspec("main"), "+refs/heads/main:refs/remotes/origin/main");
  }

  #[test]
  fn ssh_key_sets_ssh_command() {
    let overrides = config_overrides(&repository(Some("/etc/gear/id_ed25519")));

    assert_eq!(overrides.len(), 1);
    assert!(overrides[0].starts_with("core.sshCommand=ssh -i /etc/gear/id_ed25519"));
  }

  #[test]
  fn no_key_means_no_overrides() {
    assert!(config_overrides(&repository(None)).is_empty());
  }

  #[test]
  fn remote_head_resolves_each_branch_tip() {
    let remote = LocalRemote::new();

    assert_eq!(remote_head(&remote.repository("main")).unwrap(), remote.main_tip);
    assert_eq!(remote_head(&remote.repository("other")).unwrap(), remote.other_tip);
    assert_ne!(remote.main_tip, remote.other_tip);
  }

  #[test]
  fn remote_head_unknown_branch() {
    let remote = LocalRemote::new();

    let err = remote_head(&remote.repository("nope")).unwrap_err();

    assert!(matches!(err, BundleError::BranchNotFound { ref branch, .. } if branch == "nope"));
  }

  #[test]
  fn remote_head_unreachable_remote() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let repository = Repository {
      url: format!("file://{}", temp_dir.path().join("missing").display()),
      branch: "main".to_string(),
      ssh_key_file: None,
    };

    assert!(remote_head(&repository).is_err());
  }

  #[test]
  fn shallow_clone_checks_out_branch_tip() {
    let remote = LocalRemote::new();
    let dest = tempfile::TempDir::new().unwrap();

    let hash = shallow_clone(&remote.repository("other"), &dest.path().join("clone")).unwrap();

    assert_eq!(hash, remote.other_tip);
    assert!(dest.path().join("clone/api.yaml").is_file());
    assert!(dest.path().join("clone/customise/web-alpha.yaml").is_file());
  }

  #[test]
  fn shallow_clone_unknown_branch_fails() {
    let remote = LocalRemote::new();
    let dest = tempfile::TempDir::new().unwrap();

    assert!(shallow_clone(&remote.repository("nope"), &dest.path().join("clone")).is_err());
  }
}
