//! Shared-secret checks for the class and admin credentials.
//!
//! A stored secret is either an argon2 PHC string (`$argon2id$v=19$…`) or, for
//! databases created before hashing was introduced, the plaintext password.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
  password_hash::SaltString,
};
use rand_core::OsRng;

use crate::{Error, Result};

/// Hash `password` into an argon2 PHC string suitable for the settings table.
pub fn hash_secret(password: &str) -> Result<String> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| Error::validation(format!("cannot hash secret: {e}")))
}

/// An argon2 PHC string carrying a hash output, or `None`.
fn parse_hash(stored: &str) -> Option<PasswordHash<'_>> {
  PasswordHash::new(stored).ok().filter(|parsed| {
    parsed.algorithm.as_str().starts_with("argon2") && parsed.hash.is_some()
  })
}

pub fn is_hashed(stored: &str) -> bool { parse_hash(stored).is_some() }

/// Check `candidate` against a stored secret. An empty stored secret never
/// matches.
pub fn verify_secret(candidate: &str, stored: &str) -> bool {
  if stored.is_empty() {
    return false;
  }
  if let Some(parsed) = parse_hash(stored) {
    return Argon2::default()
      .verify_password(candidate.as_bytes(), &parsed)
      .is_ok();
  }
  constant_time_eq(candidate.as_bytes(), stored.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
  if a.len() != b.len() {
    return false;
  }
  a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn plaintext_secret() {
    assert!(verify_secret("hunter2", "hunter2"));
    assert!(!verify_secret("hunter3", "hunter2"));
    assert!(!verify_secret("hunter", "hunter2"));
  }

  #[test]
  fn hashed_secret() {
    let stored = hash_secret("hunter2").unwrap();
    assert!(is_hashed(&stored));
    assert!(verify_secret("hunter2", &stored));
    assert!(!verify_secret("wrong", &stored));
  }

  #[test]
  fn phc_lookalike_is_plaintext() {
    for lookalike in ["$argon2!hunter2", "$argon2id$v=19", "$abc"] {
      assert!(!is_hashed(lookalike), "{lookalike}");
      assert!(verify_secret(lookalike, lookalike), "{lookalike}");
    }
  }

  #[test]
  fn empty_stored_secret_never_matches() {
    assert!(!verify_secret("", ""));
  }
}
