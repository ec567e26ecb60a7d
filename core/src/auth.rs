use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

/// Who is logged in. Passed explicitly into every write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    user: String,
}

impl Session {
    /// Name as spelled in the credential table.
    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Whether a sheet user name refers to this session's user.
    #[must_use]
    pub fn owns(&self, user: &str) -> bool {
        same_user(&self.user, user)
    }
}

fn same_user(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// Static user → secret table.
///
/// Stored as a flat JSON object: `{"ana": "secret", "juan": "peso01"}`.
/// Secrets are plain text; this is a gate for a friends' sheet, not an
/// account system.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credentials {
    users: BTreeMap<String, String>,
}

impl Credentials {
    pub fn from_pairs<I, U, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (U, S)>,
        U: Into<String>,
        S: Into<String>,
    {
        Self {
            users: pairs
                .into_iter()
                .map(|(u, s)| (u.into(), s.into()))
                .collect(),
        }
    }

    /// Load the table from disk. A missing file is an empty table.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read credentials: {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Invalid credentials file: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)
            .with_context(|| format!("Failed to write credentials: {}", path.display()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .context("Failed to set credentials file permissions")?;
        }
        Ok(())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn users(&self) -> impl Iterator<Item = &str> {
        self.users.keys().map(String::as_str)
    }

    /// Add a user or change their secret. Names differing only in case are the
    /// same user; the existing spelling is kept.
    pub fn set(&mut self, user: &str, secret: &str) -> Result<()> {
        let user = user.trim();
        if user.is_empty() {
            bail!("User name cannot be empty");
        }
        if secret.is_empty() {
            bail!("Secret cannot be empty");
        }
        let key = self
            .find(user)
            .map_or_else(|| user.to_string(), str::to_string);
        self.users.insert(key, secret.to_string());
        Ok(())
    }

    fn find(&self, user: &str) -> Option<&str> {
        self.users
            .keys()
            .find(|k| same_user(k, user))
            .map(String::as_str)
    }

    /// Check a user/secret pair. The user name is matched ignoring case and
    /// surrounding whitespace; the secret must match exactly.
    #[must_use]
    pub fn login(&self, user: &str, secret: &str) -> Option<Session> {
        let name = self.find(user)?;
        (self.users[name] == secret).then(|| Session {
            user: name.to_string(),
        })
    }
}
