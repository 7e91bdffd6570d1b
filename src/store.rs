use crate::config::PublisherConfig;
use crate::error::{IpaLinkError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const USER_AGENT_VALUE: &str = concat!("ipalink/", env!("CARGO_PKG_VERSION"));

/// A file previously stored under a folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub size: u64,
}

pub trait ObjectStore {
    /// Create or overwrite `path`, returning the URL it is served from.
    fn put(&self, path: &str, content: &[u8], message: &str) -> Result<String>;

    /// Files directly under `folder`. A missing folder is empty.
    fn list(&self, folder: &str) -> Result<Vec<StoredObject>>;

    /// `Ok(false)` when there was nothing to delete.
    fn delete(&self, path: &str) -> Result<bool>;
}

pub struct GithubStore {
    agent: ureq::Agent,
    config: PublisherConfig,
}

#[derive(Deserialize)]
struct ContentEntry {
    name: String,
    path: String,
    sha: String,
    #[serde(default)]
    size: u64,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Serialize)]
struct PutRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
}

#[derive(Serialize)]
struct DeleteRequest<'a> {
    message: String,
    sha: String,
    branch: &'a str,
}

impl GithubStore {
    pub fn new(config: PublisherConfig) -> Result<Self> {
        config.validate()?;
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT_VALUE)
            .build();
        Ok(Self { agent, config })
    }

    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    fn contents_url(&self, path: &str) -> Result<String> {
        contents_url(&self.config.api_base, &self.config.github_repo, path)
    }

    fn authorized(&self, request: ureq::Request) -> ureq::Request {
        request
            .set("Authorization", &format!("Bearer {}", self.config.github_token))
            .set("Accept", GITHUB_ACCEPT)
    }

    /// Blob sha of an existing file, needed to overwrite or delete it.
    fn existing_sha(&self, path: &str) -> Result<Option<String>> {
        let request = self
            .authorized(self.agent.get(&self.contents_url(path)?))
            .query("ref", &self.config.branch);

        match request.call() {
            Ok(response) => {
                let entry: ContentEntry = response.into_json()?;
                Ok(Some(entry.sha))
            }
            Err(ureq::Error::Status(404, _)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl ObjectStore for GithubStore {
    fn put(&self, path: &str, content: &[u8], message: &str) -> Result<String> {
        let sha = self.existing_sha(path)?;
        if sha.is_some() {
            debug!(path, "overwriting existing file");
        }

        let body = PutRequest {
            message,
            content: STANDARD.encode(content),
            branch: &self.config.branch,
            sha,
        };

        self.authorized(self.agent.put(&self.contents_url(path)?))
            .send_json(body)
            .map_err(|e| IpaLinkError::Upload(format!("{}: {}", path, IpaLinkError::from(e))))?;

        info!(path, bytes = content.len(), "uploaded");
        Ok(self.config.public_url(path))
    }

    fn list(&self, folder: &str) -> Result<Vec<StoredObject>> {
        let request = self
            .authorized(self.agent.get(&self.contents_url(folder)?))
            .query("ref", &self.config.branch);

        let entries: Vec<ContentEntry> = match request.call() {
            Ok(response) => response.into_json()?,
            Err(ureq::Error::Status(404, _)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        Ok(entries
            .into_iter()
            .filter(|e| e.kind == "file")
            .map(|e| StoredObject {
                name: e.name,
                path: e.path,
                size: e.size,
            })
            .collect())
    }

    fn delete(&self, path: &str) -> Result<bool> {
        let Some(sha) = self.existing_sha(path)? else {
            return Ok(false);
        };

        let body = DeleteRequest {
            message: format!("Delete {}", path),
            sha,
            branch: &self.config.branch,
        };
        self.authorized(self.agent.delete(&self.contents_url(path)?))
            .send_json(body)?;

        info!(path, "deleted");
        Ok(true)
    }
}

/// `{api_base}/repos/{owner}/{name}/contents/{path}`, each segment percent-encoded.
fn contents_url(api_base: &str, repo: &str, path: &str) -> Result<String> {
    let invalid = || IpaLinkError::Config(format!("invalid API base URL {:?}", api_base));
    let mut url = Url::parse(api_base).map_err(|_| invalid())?;
    url.path_segments_mut()
        .map_err(|_| invalid())?
        .pop_if_empty()
        .push("repos")
        .extend(repo.split('/'))
        .push("contents")
        .extend(path.split('/').filter(|s| !s.is_empty()));
    Ok(url.into())
}

/// In-process store; URLs point at `base_url`.
pub struct MemoryStore {
    base_url: String,
    files: RefCell<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            files: RefCell::new(BTreeMap::new()),
        }
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.files.borrow().get(path).cloned()
    }

    pub fn len(&self) -> usize {
        self.files.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.borrow().is_empty()
    }
}

impl ObjectStore for MemoryStore {
    fn put(&self, path: &str, content: &[u8], _message: &str) -> Result<String> {
        self.files
            .borrow_mut()
            .insert(path.to_string(), content.to_vec());
        Ok(format!("{}/{}", self.base_url, path))
    }

    fn list(&self, folder: &str) -> Result<Vec<StoredObject>> {
        let prefix = format!("{}/", folder.trim_end_matches('/'));
        Ok(self
            .files
            .borrow()
            .iter()
            .filter_map(|(path, content)| {
                let name = path.strip_prefix(&prefix)?;
                (!name.contains('/')).then(|| StoredObject {
                    name: name.to_string(),
                    path: path.clone(),
                    size: content.len() as u64,
                })
            })
            .collect())
    }

    fn delete(&self, path: &str) -> Result<bool> {
        Ok(self.files.borrow_mut().remove(path).is_some())
    }
}
