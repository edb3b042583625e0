//! Zotero connection configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use zotero_llm_core::defaults::{STORE_TIMEOUT_SECS, ZOTERO_API_URL};
use zotero_llm_core::{Error, Result};

/// Whether the library belongs to a user or a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LibraryType {
    #[default]
    User,
    Group,
}

impl LibraryType {
    /// URL path segment for this library type.
    pub fn path_segment(&self) -> &'static str {
        match self {
            Self::User => "users",
            Self::Group => "groups",
        }
    }
}

impl fmt::Display for LibraryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Group => write!(f, "group"),
        }
    }
}

/// The `zotero` configuration section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZoteroConfig {
    #[serde(default)]
    pub library_id: String,
    #[serde(default)]
    pub library_type: LibraryType,
    #[serde(default)]
    pub api_key: String,
    /// Overrides the Web API root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl ZoteroConfig {
    pub fn new(library_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            library_id: library_id.into(),
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.library_id.trim().is_empty() || self.api_key.trim().is_empty() {
            return Err(Error::Config(
                "Missing required Zotero credentials. Set zotero.library_id and zotero.api_key in config.yaml"
                    .to_string(),
            ));
        }
        Ok(())
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or(ZOTERO_API_URL)
            .trim_end_matches('/')
    }

    /// Library prefix, e.g. `/users/123456`.
    pub fn library_prefix(&self) -> String {
        format!("/{}/{}", self.library_type.path_segment(), self.library_id)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(STORE_TIMEOUT_SECS))
    }
}
