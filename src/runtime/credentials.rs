use std::{
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AgentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    ReadOnly,
    ReadWrite,
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessLevel::ReadOnly => write!(f, "readonly"),
            AccessLevel::ReadWrite => write!(f, "readwrite"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl AsRef<str>, password: impl AsRef<str>) -> Self {
        Self {
            username: username.as_ref().to_string(),
            password: password.as_ref().to_string(),
        }
    }
}

/// Paths handed to the runtime as configured; contents are read by the runtime only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialFiles {
    pub password_file: Option<PathBuf>,
    pub access_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Granted(AccessLevel),
    /// Missing or wrong credentials.
    Unauthenticated,
    /// Authenticated but not listed in the access file.
    Denied,
}

#[derive(Debug, Clone)]
pub enum Authenticator {
    Anonymous,
    PasswordFile {
        passwords: HashMap<String, String>,
        access: Option<HashMap<String, AccessLevel>>,
    },
}

impl Authenticator {
    pub async fn load(files: &CredentialFiles) -> Result<Self, AgentError> {
        let Some(password_file) = &files.password_file else {
            return Err(AgentError::Auth(
                "a password file is required when authentication is enabled".to_string(),
            ));
        };

        let passwords = parse_entries(password_file, &read_file(password_file).await?, |v| {
            Some(v.to_string())
        })?;
        debug!(
            "loaded {} password entries from {}",
            passwords.len(),
            password_file.display()
        );

        let access = match &files.access_file {
            Some(access_file) => Some(parse_entries(
                access_file,
                &read_file(access_file).await?,
                |v| match v {
                    "readonly" => Some(AccessLevel::ReadOnly),
                    "readwrite" => Some(AccessLevel::ReadWrite),
                    _ => None,
                },
            )?),
            None => None,
        };

        Ok(Authenticator::PasswordFile { passwords, access })
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Authenticator::Anonymous)
    }

    pub fn authenticate(&self, credentials: Option<&Credentials>) -> AuthOutcome {
        let Authenticator::PasswordFile { passwords, access } = self else {
            return AuthOutcome::Granted(AccessLevel::ReadWrite);
        };

        let Some(credentials) = credentials else {
            return AuthOutcome::Unauthenticated;
        };

        if passwords.get(&credentials.username) != Some(&credentials.password) {
            return AuthOutcome::Unauthenticated;
        }

        match access {
            None => AuthOutcome::Granted(AccessLevel::ReadWrite),
            Some(access) => match access.get(&credentials.username) {
                Some(level) => AuthOutcome::Granted(*level),
                None => AuthOutcome::Denied,
            },
        }
    }
}

async fn read_file(path: &Path) -> Result<String, AgentError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| AgentError::CredentialFile {
            path: path.to_path_buf(),
            source,
        })
}

/// Parses `<user> <value> [ignored...]` lines; `#` starts a comment line.
fn parse_entries<T>(
    path: &Path,
    contents: &str,
    parse_value: impl Fn(&str) -> Option<T>,
) -> Result<HashMap<String, T>, AgentError> {
    let mut entries = HashMap::new();

    for (index, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let invalid = || AgentError::InvalidCredentialEntry {
            path: path.to_path_buf(),
            line: index + 1,
        };

        let mut fields = line.split_whitespace();
        let (Some(user), Some(value)) = (fields.next(), fields.next()) else {
            return Err(invalid());
        };
        let value = parse_value(value).ok_or_else(invalid)?;

        entries.insert(user.to_string(), value);
    }

    Ok(entries)
}
