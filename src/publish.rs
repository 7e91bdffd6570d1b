use crate::error::{IpaLinkError, Result};
use crate::manifest;
use crate::resolver::{self, ResolvedMetadata};
use crate::shorten::{self, LinkShortener};
use crate::store::{ObjectStore, StoredObject};
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};
use uuid::Uuid;

const OBJECT_ID_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Ipa,
    Plist,
}

impl FileKind {
    pub fn extension(self) -> &'static str {
        match self {
            FileKind::Ipa => "ipa",
            FileKind::Plist => "plist",
        }
    }
}

/// Result of one upload, ready to show to whoever sent the file.
#[derive(Debug, Clone, Serialize)]
pub struct PublishedApp {
    pub metadata: ResolvedMetadata,
    pub ipa_url: String,
    pub manifest_url: String,
    /// Possibly shortened `itms-services` link.
    pub install_url: String,
}

impl fmt::Display for PublishedApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.metadata;
        writeln!(f, "App:     {}", m.app_name)?;
        writeln!(f, "Bundle:  {}", m.bundle_id)?;
        writeln!(f, "Version: {}", m.version)?;
        match &m.team_id {
            Some(id) if *id != m.team_name => writeln!(f, "Team:    {} ({})", m.team_name, id)?,
            _ => writeln!(f, "Team:    {}", m.team_name)?,
        }
        writeln!(f, "IPA:     {}", self.ipa_url)?;
        write!(f, "Install: {}", self.install_url)
    }
}

pub struct Publisher<'a> {
    store: &'a dyn ObjectStore,
    shortener: &'a dyn LinkShortener,
    ipa_dir: String,
    plist_dir: String,
}

impl<'a> Publisher<'a> {
    pub fn new(store: &'a dyn ObjectStore, shortener: &'a dyn LinkShortener) -> Self {
        Self {
            store,
            shortener,
            ipa_dir: "iPA".to_string(),
            plist_dir: "Plist".to_string(),
        }
    }

    pub fn folders(mut self, ipa_dir: &str, plist_dir: &str) -> Self {
        self.ipa_dir = ipa_dir.trim_matches('/').to_string();
        self.plist_dir = plist_dir.trim_matches('/').to_string();
        self
    }

    fn folder(&self, kind: FileKind) -> &str {
        match kind {
            FileKind::Ipa => &self.ipa_dir,
            FileKind::Plist => &self.plist_dir,
        }
    }

    /// Publish an uploaded archive. `file_name` is the name it was sent under.
    pub fn publish(&self, archive_bytes: &[u8], file_name: &str) -> Result<PublishedApp> {
        let metadata = resolver::resolve(archive_bytes, file_name);
        info!(
            app = %metadata.app_name,
            bundle_id = %metadata.bundle_id,
            version = %metadata.version,
            "resolved metadata"
        );

        let id = new_object_id();

        let ipa_path = format!("{}/{}.{}", self.ipa_dir, id, FileKind::Ipa.extension());
        let ipa_url = self
            .store
            .put(&ipa_path, archive_bytes, &format!("Upload {}", ipa_path))?;

        let manifest_path = format!("{}/{}.{}", self.plist_dir, id, FileKind::Plist.extension());
        let manifest_url = match manifest::generate(&ipa_url, &metadata).and_then(|manifest| {
            self.store
                .put(&manifest_path, &manifest, &format!("Create {}", manifest_path))
        }) {
            Ok(url) => url,
            Err(e) => {
                // nothing points at the .ipa without its manifest
                if let Err(cleanup) = self.store.delete(&ipa_path) {
                    warn!(path = %ipa_path, error = %cleanup, "could not remove orphaned upload");
                }
                return Err(e);
            }
        };

        let install_url = shorten::shorten_or_original(self.shortener, &manifest::install_uri(&manifest_url));

        Ok(PublishedApp {
            metadata,
            ipa_url,
            manifest_url,
            install_url,
        })
    }

    /// Newest-looking names first, at most `limit`.
    pub fn recent(&self, kind: FileKind, limit: usize) -> Result<Vec<StoredObject>> {
        let mut files = self.store.list(self.folder(kind))?;
        files.sort_by(|a, b| b.name.cmp(&a.name));
        files.truncate(limit);
        Ok(files)
    }

    pub fn remove(&self, kind: FileKind, name: &str) -> Result<bool> {
        if name.is_empty() || name.contains('/') || name.contains('\\') || name == "." || name == ".." {
            return Err(IpaLinkError::InvalidInput(format!("invalid file name: {:?}", name)));
        }
        self.store.delete(&format!("{}/{}", self.folder(kind), name))
    }
}

/// Short random lowercase/digit id for uploaded objects.
pub fn new_object_id() -> String {
    Uuid::new_v4().simple().to_string()[..OBJECT_ID_LEN].to_string()
}

/// Rough processing time, for progress messages.
pub fn estimate_seconds(size_bytes: u64) -> u64 {
    let mb = size_bytes as f64 / (1024.0 * 1024.0);
    (5.0 + mb * 3.0).ceil() as u64
}
