//! Credential persistence
//!
//! Credentials generated during first-run setup exist nowhere else, so they
//! are appended to a plain record file next to the executable before the
//! console ever sees them.

use anyhow::{Context, Result, ensure};
use log::{debug, info};
use std::{
    fs,
    io::ErrorKind,
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};
use uuid::Uuid;

const GENERATED_LENGTH: usize = 16;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredCredential {
    pub timestamp: u64,
    pub address: String,
    pub credential: String,
}

/// Service for credential records
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Generate a fresh random credential
    pub fn generate() -> String {
        Uuid::new_v4().simple().to_string()[..GENERATED_LENGTH].to_string()
    }

    /// Append a credential record
    ///
    /// The record file is rewritten through a temporary file and renamed into
    /// place, so a crash never leaves a truncated file behind.
    ///
    /// # Arguments
    /// * `address` - Console address the credential belongs to
    /// * `credential` - The plaintext credential
    ///
    /// # Returns
    /// Result indicating success or failure
    pub fn persist(&self, address: &str, credential: &str) -> Result<()> {
        debug!("persist() called");

        ensure!(!credential.is_empty(), "failed to persist credential: empty");
        ensure!(
            !credential.contains(['\t', '\n']),
            "failed to persist credential: contains separators"
        );

        let mut content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e).context("failed to read credential file"),
        };

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .context("failed to get system time")?
            .as_secs();

        content.push_str(&format!("{timestamp}\t{address}\t{credential}\n"));

        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, content).context("failed to write credential file")?;
        fs::rename(&tmp_path, &self.path).context("failed to replace credential file")?;

        info!("credential for {address} stored in {}", self.path.display());
        Ok(())
    }

    /// All stored records, oldest first
    pub fn entries(&self) -> Result<Vec<StoredCredential>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e).context("failed to read credential file"),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                let mut fields = line.splitn(3, '\t');
                let (Some(timestamp), Some(address), Some(credential)) =
                    (fields.next(), fields.next(), fields.next())
                else {
                    anyhow::bail!("failed to parse credential record: {line}");
                };

                Ok(StoredCredential {
                    timestamp: timestamp
                        .parse()
                        .context("failed to parse credential timestamp")?,
                    address: address.to_string(),
                    credential: credential.to_string(),
                })
            })
            .collect()
    }
}
