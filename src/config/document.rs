//! Independent read of single leaf values from the configuration file
//!
//! The email-alert step reopens the file through this type instead of
//! reusing the loader's parse; it only ever needs a handful of leaves.

use std::path::Path;

use super::ConfigError;

/// Element path of the SMTP server host
pub const SMTP_SERVER: &[&str] = &["global", "smtp_server"];
/// Element path of the alert sender address
pub const EMAIL_FROM: &[&str] = &["global", "email_from"];
/// Element path of the display name used in alerts
pub const EMAIL_IDSNAME: &[&str] = &["global", "email_idsname"];

/// A parsed configuration document, released on drop.
#[derive(Debug)]
pub struct ConfigDocument {
    root: toml::Table,
}

impl ConfigDocument {
    /// Open and parse the document at `path`.
    pub fn open(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &content)
    }

    fn parse(path: &Path, content: &str) -> Result<Self, ConfigError> {
        let root = content
            .parse::<toml::Table>()
            .map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                details: e.message().to_string(),
            })?;

        Ok(Self { root })
    }

    /// Return the string content at `element`, or `None` when the element is
    /// missing, not a string, or empty.
    pub fn get_one(&self, element: &[&str]) -> Option<String> {
        let (leaf, parents) = element.split_last()?;

        let mut table = &self.root;
        for name in parents {
            table = table.get(*name)?.as_table()?;
        }

        table
            .get(*leaf)?
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}
