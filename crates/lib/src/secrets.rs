//! Secret decryption for encrypted bundle files.
//!
//! Files ending in `.enc` are age-encrypted payloads. They are decrypted with
//! the agent's private key, which may be either:
//! - an age identity file (`AGE-SECRET-KEY-1...` lines)
//! - an OpenSSH private key (ed25519 or RSA), as used for the git remote
//!
//! Decryption is a pure transformation; nothing here touches the filesystem.

use std::io::{self, BufReader, Read};

use thiserror::Error;
use tracing::debug;

/// Marker that identifies native age identity material.
const AGE_SECRET_KEY_PREFIX: &str = "AGE-SECRET-KEY-";

/// Errors that can occur while decrypting a secret.
#[derive(Debug, Error)]
pub enum DecryptError {
  /// The private key material could not be parsed into an identity.
  #[error("failed to parse age identity for '{label}': {source}")]
  ParseIdentity {
    label: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  /// The ciphertext could not be decrypted with the given identity.
  #[error("failed to decrypt '{label}': {source}")]
  Decrypt {
    label: String,
    #[source]
    source: age::DecryptError,
  },

  /// The decrypted stream could not be read to completion.
  #[error("failed to read decrypted data for '{label}': {source}")]
  Read {
    label: String,
    #[source]
    source: io::Error,
  },
}

/// Decrypt `ciphertext` with the identity contained in `key_material`.
///
/// `label` names the payload (usually the file name) and is carried on every
/// error for diagnostics.
pub fn decrypt(key_material: &[u8], label: &str, ciphertext: &[u8]) -> Result<Vec<u8>, DecryptError> {
  let identities = parse_identities(key_material, label)?;

  let decryptor = age::Decryptor::new(ciphertext).map_err(|source| DecryptError::Decrypt {
    label: label.to_string(),
    source,
  })?;

  let mut reader = decryptor
    .decrypt(identities.iter().map(|identity| identity.as_ref()))
    .map_err(|source| DecryptError::Decrypt {
      label: label.to_string(),
      source,
    })?;

  let mut plaintext = Vec::new();
  reader.read_to_end(&mut plaintext).map_err(|source| DecryptError::Read {
    label: label.to_string(),
    source,
  })?;

  debug!(label, bytes = plaintext.len(), "decrypted secret");
  Ok(plaintext)
}

fn parse_identities(key_material: &[u8], label: &str) -> Result<Vec<Box<dyn age::Identity>>, DecryptError> {
  let parse_error = |source: Box<dyn std::error::Error + Send + Sync>| DecryptError::ParseIdentity {
    label: label.to_string(),
    source,
  };

  if String::from_utf8_lossy(key_material).contains(AGE_SECRET_KEY_PREFIX) {
    let identities = age::IdentityFile::from_buffer(BufReader::new(key_material))
      .map_err(|e| parse_error(Box::new(e)))?
      .into_identities()
      .map_err(|e| parse_error(Box::new(e)))?;

    return Ok(
      identities
        .into_iter()
        .map(|identity| identity as Box<dyn age::Identity>)
        .collect(),
    );
  }

  let identity = age::ssh::Identity::from_buffer(BufReader::new(key_material), Some(label.to_string()))
    .map_err(|e| parse_error(Box::new(e)))?;

  match identity {
    age::ssh::Identity::Unencrypted(_) => Ok(vec![Box::new(identity) as Box<dyn age::Identity>]),
    age::ssh::Identity::Encrypted(_) => Err(parse_error("passphrase-protected SSH keys are not supported".into())),
    age::ssh::Identity::Unsupported(_) => Err(parse_error("unsupported SSH key type".into())),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use age::secrecy::ExposeSecret;

  fn identity_file(identity: &age::x25519::Identity) -> Vec<u8> {
    format!("# test key\n{}\n", identity.to_string().expose_secret()).into_bytes()
  }

  #[test]
  fn round_trip_with_age_identity() {
    let identity = age::x25519::Identity::generate();
    let ciphertext = age::encrypt(&identity.to_public(), b"DB_PASSWORD=hunter2\n").unwrap();

    let plaintext = decrypt(&identity_file(&identity), "db.env.enc", &ciphertext).unwrap();

    assert_eq!(plaintext, b"DB_PASSWORD=hunter2\n");
  }

  #[test]
  fn mismatched_key_fails_to_decrypt() {
    let owner = age::x25519::Identity::generate();
    let stranger = age::x25519::Identity::generate();
    let ciphertext = age::encrypt(&owner.to_public(), b"secret").unwrap();

    let err = decrypt(&identity_file(&stranger), "db.env.enc", &ciphertext).unwrap_err();

    assert!(matches!(err, DecryptError::Decrypt { ref label, .. } if label == "db.env.enc"));
  }

  #[test]
  fn garbage_key_is_a_parse_error() {
    let identity = age::x25519::Identity::generate();
    let ciphertext = age::encrypt(&identity.to_public(), b"secret").unwrap();

    let err = decrypt(b"not a key at all", "app.yaml.enc", &ciphertext).unwrap_err();

    assert!(matches!(err, DecryptError::ParseIdentity { .. }));
    assert!(err.to_string().contains("app.yaml.enc"));
  }

  #[test]
  fn corrupt_ciphertext_is_a_decrypt_error() {
    let identity = age::x25519::Identity::generate();

    let err = decrypt(&identity_file(&identity), "broken.enc", b"definitely not age").unwrap_err();

    assert!(matches!(err, DecryptError::Decrypt { .. }));
  }
}
