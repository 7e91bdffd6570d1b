use crate::error::{IpaLinkError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use url::Url;

pub const ENV_TOKEN: &str = "GITHUB_TOKEN";
pub const ENV_REPO: &str = "GITHUB_REPO";
pub const ENV_BRANCH: &str = "GITHUB_BRANCH";
pub const ENV_PUBLIC_BASE_URL: &str = "PUBLIC_BASE_URL";
pub const ENV_IPA_DIR: &str = "IPA_DIR";
pub const ENV_PLIST_DIR: &str = "PLIST_DIR";
pub const ENV_SHORTEN: &str = "SHORTEN_LINKS";
pub const ENV_API_BASE: &str = "GITHUB_API_URL";

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Where and how published files are stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublisherConfig {
    pub github_token: String,
    /// `owner/name`
    pub github_repo: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// GitHub REST endpoint; GitHub Enterprise hosts live elsewhere.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Custom domain serving the repository, used instead of raw.githubusercontent.com.
    #[serde(default)]
    pub public_base_url: Option<String>,
    #[serde(default = "default_ipa_dir")]
    pub ipa_dir: String,
    #[serde(default = "default_plist_dir")]
    pub plist_dir: String,
    #[serde(default = "default_true")]
    pub shorten_links: bool,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_ipa_dir() -> String {
    "iPA".to_string()
}

fn default_plist_dir() -> String {
    "Plist".to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> u64 {
    60
}

impl PublisherConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(IpaLinkError::FileNotFound(path.to_path_buf()));
        }
        let config: Self = serde_json::from_str(&fs::read_to_string(path)?)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &str| {
            get(key).ok_or_else(|| IpaLinkError::Config(format!("{} is not set", key)))
        };

        let shorten_links = match get(ENV_SHORTEN) {
            Some(v) => parse_bool(&v)
                .ok_or_else(|| IpaLinkError::Config(format!("{} must be true or false", ENV_SHORTEN)))?,
            None => default_true(),
        };

        let config = Self {
            github_token: required(ENV_TOKEN)?,
            github_repo: required(ENV_REPO)?,
            branch: get(ENV_BRANCH).unwrap_or_else(default_branch),
            api_base: get(ENV_API_BASE).unwrap_or_else(default_api_base),
            public_base_url: get(ENV_PUBLIC_BASE_URL),
            ipa_dir: get(ENV_IPA_DIR).unwrap_or_else(default_ipa_dir),
            plist_dir: get(ENV_PLIST_DIR).unwrap_or_else(default_plist_dir),
            shorten_links,
            timeout_secs: default_timeout(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let mut parts = self.github_repo.split('/');
        let valid_repo = matches!(
            (parts.next(), parts.next(), parts.next()),
            (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty()
        );
        if !valid_repo {
            return Err(IpaLinkError::Config(format!(
                "repository must look like owner/name, got {:?}",
                self.github_repo
            )));
        }
        match Url::parse(&self.api_base) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => {
                return Err(IpaLinkError::Config(format!(
                    "invalid API base URL {:?}",
                    self.api_base
                )))
            }
        }
        if self.github_token.trim().is_empty() {
            return Err(IpaLinkError::Config("GitHub token is empty".to_string()));
        }
        for dir in [&self.ipa_dir, &self.plist_dir] {
            if dir.is_empty() || dir.starts_with('/') || dir.split('/').any(|s| s == "..") {
                return Err(IpaLinkError::Config(format!("invalid folder name {:?}", dir)));
            }
        }
        Ok(())
    }

    /// Public URL a stored object will be served from.
    pub fn public_url(&self, path: &str) -> String {
        match &self.public_base_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), path),
            None => format!(
                "https://raw.githubusercontent.com/{}/{}/{}",
                self.github_repo, self.branch, path
            ),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
