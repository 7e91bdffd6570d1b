pub mod archive;
pub mod candidate;
pub mod config;
pub mod error;
pub mod manifest;
pub mod plist_ext;
pub mod profile;
pub mod publish;
pub mod resolver;
pub mod shorten;
pub mod store;

pub use config::PublisherConfig;
pub use error::{IpaLinkError, Result};
pub use manifest::{generate, install_uri, InstallerManifest};
pub use profile::SigningProfileInfo;
pub use publish::{FileKind, PublishedApp, Publisher};
pub use resolver::{resolve, ResolvedMetadata};
pub use shorten::{IsGd, LinkShortener, NoShortener};
pub use store::{GithubStore, MemoryStore, ObjectStore, StoredObject};
