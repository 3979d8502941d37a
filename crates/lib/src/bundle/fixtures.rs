//! Local git remotes for bundle tests.
//!
//! Repositories are built with the `git` CLI in a temp directory and reached
//! through a `file://` URL, so clone and ref listing run without a network.

use std::fs;
use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

use super::Repository;

/// A repository with a `main` and an `other` branch.
///
/// `main` holds `web.yaml`, `worker.yaml`, `db.env`, `notes.md` and two
/// overrides under `customise/`. `other` adds `api.yaml` on top of it.
pub struct LocalRemote {
  _dir: TempDir,
  url: String,
  pub main_tip: String,
  pub other_tip: String,
}

impl LocalRemote {
  pub fn new() -> Self {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    git(root, &["init", "-q"]);
    git(root, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    git(root, &["config", "user.email", "gear@example.com"]);
    git(root, &["config", "user.name", "gear"]);
    git(root, &["config", "commit.gpgsign", "false"]);

    write(root, "web.yaml", "services:\n  web:\n    image: nginx\n");
    write(root, "worker.yaml", "services:\n  worker:\n    image: busybox\n");
    write(root, "db.env", "POSTGRES_PASSWORD=secret\n");
    write(root, "notes.md", "# deployment notes\n");
    write(root, "customise/web-alpha.yaml", "services:\n  web:\n    environment: [TARGET=alpha]\n");
    write(root, "customise/web-beta.yaml", "services:\n  web:\n    environment: [TARGET=beta]\n");
    git(root, &["add", "-A"]);
    git(root, &["commit", "-q", "-m", "initial services"]);
    let main_tip = git(root, &["rev-parse", "HEAD"]);

    git(root, &["checkout", "-q", "-b", "other"]);
    write(root, "api.yaml", "services:\n  api:\n    image: httpd\n");
    git(root, &["add", "-A"]);
    git(root, &["commit", "-q", "-m", "add api"]);
    let other_tip = git(root, &["rev-parse", "HEAD"]);
    git(root, &["checkout", "-q", "main"]);

    let url = format!("file://{}", root.display());
    Self {
      _dir: dir,
      url,
      main_tip,
      other_tip,
    }
  }

  pub fn repository(&self, branch: &str) -> Repository {
    Repository {
      url: self.url.clone(),
      branch: branch.to_string(),
      ssh_key_file: None,
    }
  }
}

fn write(root: &Path, relative: &str, content: &str) {
  let path = root.join(relative);
  fs::create_dir_all(path.parent().unwrap()).unwrap();
  fs::write(path, content).unwrap();
}

fn git(root: &Path, args: &[&str]) -> String {
  let output = Command::new("git")
    .args(args)
    .current_dir(root)
    .output()
    .unwrap_or_else(|e| panic!("failed to run `git {args:?}`: {e}"));
  assert!(
    output.status.success(),
    "`git {args:?}` failed:\n{}",
    String::from_utf8_lossy(&output.stderr)
  );
  String::from_utf8_lossy(&output.stdout).trim().to_string()
}
