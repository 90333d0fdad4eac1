//! Member credentials, already encoded, loaded once at broker startup

use log::warn;
use shared::protocol::AuthStatus;
use shared::{CredentialEncoder, DataSourceError};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    members: HashMap<String, String>,
}

impl CredentialStore {
    /// Reads `username,secret` lines
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, DataSourceError> {
        let path = path.as_ref();
        let contents =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| DataSourceError::Unreadable {
                    path: path.to_path_buf(),
                    source,
                })?;
        Ok(Self::parse(&contents))
    }

    /// Parses credential file contents
    ///
    /// Whitespace around either field is ignored, so both `user,secret` and
    /// `user, secret` lines are accepted.
    pub fn parse(contents: &str) -> Self {
        let mut members = HashMap::new();

        for (number, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match line.split_once(',') {
                Some((username, secret)) if !username.trim().is_empty() => {
                    members.insert(username.trim().to_string(), secret.trim().to_string());
                }
                _ => warn!("Skipping malformed credential on line {}", number + 1),
            }
        }

        Self { members }
    }

    pub fn from_pairs<I, U, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (U, S)>,
        U: Into<String>,
        S: Into<String>,
    {
        Self {
            members: pairs
                .into_iter()
                .map(|(username, secret)| (username.into(), secret.into()))
                .collect(),
        }
    }

    /// Checks a member login; both values are in encoded form
    pub fn verify(&self, username: &str, secret: &str) -> AuthStatus {
        match self.members.get(username) {
            None => AuthStatus::InvalidUser,
            Some(saved) if saved == secret => AuthStatus::ValidMember,
            Some(_) => AuthStatus::InvalidPassword,
        }
    }

    pub fn contains(&self, username: &str) -> bool {
        self.members.contains_key(username)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Encodes a plaintext `username,password` file into credential store lines
///
/// Each output line reads `encoded_user, encoded_password`. Lines without a
/// comma are skipped.
pub fn encode_plaintext(contents: &str, encoder: &dyn CredentialEncoder) -> Vec<String> {
    contents
        .lines()
        .filter_map(|line| line.split_once(','))
        .map(|(username, password)| {
            format!(
                "{}, {}",
                encoder.encode(username.trim()),
                encoder.encode(password.trim())
            )
        })
        .collect()
}
