//! Typed site settings assembled from the key-value `settings` table.
//!
//! The table stays a loose bag of strings for compatibility; everything above
//! the store works with [`SiteSettings`], built and validated once per use.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Result, secret};

pub const KEY_SITE_TITLE: &str = "site_title";
pub const KEY_CLASS_NAME: &str = "class_name";
pub const KEY_CURRENT_MONTH: &str = "current_month";
pub const KEY_CLASS_USERNAME: &str = "class_username";
pub const KEY_CLASS_PASSWORD: &str = "class_password";
pub const KEY_ADMIN_PASSWORD: &str = "admin_password";

const DEFAULT_SITE_TITLE: &str = "Class Scoreboard";

/// The shared secrets that grant the two roles.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
  pub class_username: String,
  /// Plaintext or argon2 PHC string; see [`crate::secret`].
  pub class_password: String,
  pub admin_password: String,
}

impl std::fmt::Debug for Credentials {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Credentials")
      .field("class_username", &self.class_username)
      .finish_non_exhaustive()
  }
}

impl Credentials {
  fn validate(&self) -> Result<()> {
    if self.class_username.trim().is_empty() {
      return Err(Error::validation("class username must not be empty"));
    }
    if self.class_password.is_empty() {
      return Err(Error::validation("class password must not be empty"));
    }
    if self.admin_password.is_empty() {
      return Err(Error::validation("admin password must not be empty"));
    }
    Ok(())
  }

  /// Replace plaintext secrets with argon2 hashes.
  pub fn sealed(self) -> Result<Self> {
    Ok(Self {
      class_username: self.class_username.trim().to_owned(),
      class_password: seal(self.class_password)?,
      admin_password: seal(self.admin_password)?,
    })
  }
}

fn seal(value: String) -> Result<String> {
  if secret::is_hashed(&value) {
    Ok(value)
  } else {
    secret::hash_secret(&value)
  }
}

/// Site configuration. Last write wins per key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SiteSettings {
  #[serde(default = "default_site_title")]
  pub site_title:    String,
  #[serde(default)]
  pub class_name:    String,
  /// The `YYYY-MM` tag the class is currently working in.
  #[serde(default)]
  pub current_month: String,
  #[serde(flatten)]
  pub credentials:   Credentials,
}

fn default_site_title() -> String { DEFAULT_SITE_TITLE.to_owned() }

impl SiteSettings {
  /// Assemble from raw key/value rows. Fails if any credential is missing.
  pub fn from_pairs(
    pairs: impl IntoIterator<Item = (String, String)>,
  ) -> Result<Self> {
    let mut map: HashMap<String, String> = pairs.into_iter().collect();
    let mut take = |key: &str| map.remove(key).unwrap_or_default();

    let site_title = take(KEY_SITE_TITLE);
    let settings = Self {
      site_title:    if site_title.is_empty() {
        default_site_title()
      } else {
        site_title
      },
      class_name:    take(KEY_CLASS_NAME),
      current_month: take(KEY_CURRENT_MONTH),
      credentials:   Credentials {
        class_username: take(KEY_CLASS_USERNAME),
        class_password: take(KEY_CLASS_PASSWORD),
        admin_password: take(KEY_ADMIN_PASSWORD),
      },
    };
    settings.validate()?;
    Ok(settings)
  }

  pub fn validate(&self) -> Result<()> { self.credentials.validate() }

  /// Flatten into the rows of the `settings` table.
  pub fn to_pairs(&self) -> Vec<(String, String)> {
    vec![
      (KEY_SITE_TITLE.into(), self.site_title.clone()),
      (KEY_CLASS_NAME.into(), self.class_name.clone()),
      (KEY_CURRENT_MONTH.into(), self.current_month.clone()),
      (KEY_CLASS_USERNAME.into(), self.credentials.class_username.clone()),
      (KEY_CLASS_PASSWORD.into(), self.credentials.class_password.clone()),
      (KEY_ADMIN_PASSWORD.into(), self.credentials.admin_password.clone()),
    ]
  }

  pub fn public_view(&self) -> PublicSettings {
    PublicSettings {
      site_title:     self.site_title.clone(),
      class_name:     self.class_name.clone(),
      current_month:  self.current_month.clone(),
      class_username: self.credentials.class_username.clone(),
    }
  }
}

/// Settings with every secret removed; safe to return to any caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicSettings {
  pub site_title:     String,
  pub class_name:     String,
  pub current_month:  String,
  pub class_username: String,
}

/// A partial update; `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SettingsPatch {
  pub site_title:     Option<String>,
  pub class_name:     Option<String>,
  pub current_month:  Option<String>,
  pub class_username: Option<String>,
  pub class_password: Option<String>,
  pub admin_password: Option<String>,
}

impl SettingsPatch {
  pub fn is_empty(&self) -> bool { self.to_pairs().is_empty() }

  /// Reject values that would leave the site without a usable login.
  pub fn validate(&self) -> Result<()> {
    let blank = |v: &Option<String>| v.as_deref().is_some_and(|s| s.trim().is_empty());
    if blank(&self.class_username)
      || blank(&self.class_password)
      || blank(&self.admin_password)
    {
      return Err(Error::validation("credentials must not be set to empty"));
    }
    Ok(())
  }

  /// Hash any plaintext secrets in the patch.
  pub fn sealed(self) -> Result<Self> {
    let Self {
      site_title,
      class_name,
      current_month,
      class_username,
      class_password,
      admin_password,
    } = self;
    Ok(Self {
      site_title,
      class_name,
      current_month,
      class_username: class_username.map(|u| u.trim().to_owned()),
      class_password: class_password.map(seal).transpose()?,
      admin_password: admin_password.map(seal).transpose()?,
    })
  }

  pub fn to_pairs(&self) -> Vec<(String, String)> {
    [
      (KEY_SITE_TITLE, &self.site_title),
      (KEY_CLASS_NAME, &self.class_name),
      (KEY_CURRENT_MONTH, &self.current_month),
      (KEY_CLASS_USERNAME, &self.class_username),
      (KEY_CLASS_PASSWORD, &self.class_password),
      (KEY_ADMIN_PASSWORD, &self.admin_password),
    ]
    .into_iter()
    .filter_map(|(k, v)| v.clone().map(|v| (k.to_owned(), v)))
    .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
    items
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect()
  }

  #[test]
  fn assembles_from_rows() {
    let s = SiteSettings::from_pairs(pairs(&[
      (KEY_CLASS_USERNAME, "class7"),
      (KEY_CLASS_PASSWORD, "pw"),
      (KEY_ADMIN_PASSWORD, "root"),
      (KEY_CURRENT_MONTH, "2026-10"),
      ("unrelated", "ignored"),
    ]))
    .unwrap();
    assert_eq!(s.site_title, DEFAULT_SITE_TITLE);
    assert_eq!(s.current_month, "2026-10");
    assert_eq!(s.credentials.class_username, "class7");
  }

  #[test]
  fn missing_credentials_rejected() {
    let err = SiteSettings::from_pairs(pairs(&[(KEY_CLASS_USERNAME, "class7")]))
      .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
  }

  #[test]
  fn patch_only_emits_present_keys() {
    let patch = SettingsPatch {
      class_name: Some("7B".into()),
      ..Default::default()
    };
    assert_eq!(patch.to_pairs(), pairs(&[(KEY_CLASS_NAME, "7B")]));
    assert!(SettingsPatch::default().is_empty());
  }

  #[test]
  fn patch_cannot_blank_credentials() {
    let patch = SettingsPatch {
      admin_password: Some("  ".into()),
      ..Default::default()
    };
    assert!(matches!(patch.validate(), Err(Error::Validation(_))));
  }

  #[test]
  fn sealing_hashes_plaintext_once() {
    let sealed = Credentials {
      class_username: " class7 ".into(),
      class_password: "pw".into(),
      admin_password: "root".into(),
    }
    .sealed()
    .unwrap();
    assert_eq!(sealed.class_username, "class7");
    assert!(secret::is_hashed(&sealed.admin_password));

    let again = sealed.clone().sealed().unwrap();
    assert_eq!(again.admin_password, sealed.admin_password);
  }

  #[test]
  fn sealing_hashes_argon2_lookalike() {
    let sealed = Credentials {
      class_username: "class7".into(),
      class_password: "pw".into(),
      admin_password: "$argon2!root".into(),
    }
    .sealed()
    .unwrap();
    assert!(secret::is_hashed(&sealed.admin_password));
    assert!(secret::verify_secret("$argon2!root", &sealed.admin_password));
  }

  #[test]
  fn debug_hides_secrets() {
    let creds = Credentials {
      class_username: "class7".into(),
      class_password: "pw-visible?".into(),
      admin_password: "root".into(),
    };
    assert!(!format!("{creds:?}").contains("pw-visible?"));
  }
}
