use crate::archive::{self, IpaArchive};
use crate::candidate::{self, PlistCandidate};
use crate::plist_ext::{DecoderChain, DictionaryExt};
use crate::profile::{SigningProfileInfo, UNKNOWN_TEAM};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

pub const DEFAULT_NAME: &str = "Unknown";
pub const DEFAULT_BUNDLE_ID: &str = "unknown.bundle";
pub const DEFAULT_VERSION: &str = "1.0";
pub const DEFAULT_TEAM: &str = UNKNOWN_TEAM;

const ARCHIVE_EXTENSIONS: &[&str] = &["ipa", "tipa"];

/// What we could learn about an uploaded app. Every field is always set;
/// anything we couldn't find carries its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedMetadata {
    pub app_name: String,
    pub bundle_id: String,
    pub version: String,
    pub team_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
}

impl Default for ResolvedMetadata {
    fn default() -> Self {
        Self {
            app_name: DEFAULT_NAME.to_string(),
            bundle_id: DEFAULT_BUNDLE_ID.to_string(),
            version: DEFAULT_VERSION.to_string(),
            team_name: DEFAULT_TEAM.to_string(),
            team_id: None,
        }
    }
}

impl ResolvedMetadata {
    pub fn has_default_name(&self) -> bool {
        self.app_name == DEFAULT_NAME
    }

    /// Fill whichever of name/bundle id/version still hold their default.
    fn fill_defaults(&mut self, name: Option<&str>, bundle_id: Option<&str>, version: Option<&str>) {
        fill(&mut self.app_name, DEFAULT_NAME, name);
        fill(&mut self.bundle_id, DEFAULT_BUNDLE_ID, bundle_id);
        fill(&mut self.version, DEFAULT_VERSION, version);
    }
}

fn fill(field: &mut String, default: &str, value: Option<&str>) {
    if let Some(value) = value {
        if *field == default {
            *field = value.to_string();
        }
    }
}

/// Resolve app metadata from raw .ipa bytes.
///
/// `fallback_name` is the uploaded file's name; it labels the app when no
/// descriptor provides one. This never fails: unreadable archives, missing or
/// undecodable descriptors and absent profiles each fall back to defaults.
pub fn resolve(archive_bytes: &[u8], fallback_name: &str) -> ResolvedMetadata {
    let mut metadata = match IpaArchive::open(archive_bytes) {
        Ok(mut ipa) => resolve_archive(&mut ipa),
        Err(e) => {
            warn!(error = %e, "upload is not a readable zip archive");
            ResolvedMetadata::default()
        }
    };

    if metadata.has_default_name() {
        if let Some(name) = name_from_file(fallback_name) {
            debug!(name = %name, "naming app after uploaded file");
            metadata.app_name = name;
        }
    }

    metadata
}

fn resolve_archive(ipa: &mut IpaArchive<'_>) -> ResolvedMetadata {
    let decoders = DecoderChain::default();
    let mut metadata = ResolvedMetadata::default();

    let profile = read_profile(ipa);
    metadata.team_name = profile.team_name.clone();
    metadata.team_id = profile.team_id.clone();

    let mut candidates = ipa
        .find(|path| archive::is_descriptor_path(path) && archive::is_in_app_bundle(path))
        .iter()
        .filter_map(|name| ipa.read(name))
        .filter_map(|entry| PlistCandidate::from_entry(&entry, &decoders))
        .collect::<Vec<_>>();
    debug!(count = candidates.len(), "decoded descriptor candidates");

    match candidate::select(&mut candidates, profile.bundle_id_hint.as_deref()) {
        Some(index) => {
            let fields = &candidates[index].parsed_fields;
            metadata.fill_defaults(fields.name(), fields.bundle_id.as_deref(), fields.version());
        }
        None => debug!("no usable application descriptor"),
    }

    if metadata.has_default_name() {
        apply_itunes_metadata(ipa, &decoders, &mut metadata);
    }

    metadata
}

/// Main bundle's profile if present, else the first one found.
fn read_profile(ipa: &mut IpaArchive<'_>) -> SigningProfileInfo {
    let profiles = ipa.find(archive::is_profile_path);
    let chosen = profiles
        .iter()
        .find(|p| archive::is_main_profile_path(p))
        .or_else(|| profiles.first());

    match chosen.and_then(|name| ipa.read(name)) {
        Some(entry) => {
            let info = SigningProfileInfo::parse(&entry.raw_bytes);
            debug!(
                path = %entry.path,
                team = %info.team_name,
                hint = ?info.bundle_id_hint,
                "read signing profile"
            );
            info
        }
        None => SigningProfileInfo::default(),
    }
}

fn apply_itunes_metadata(
    ipa: &mut IpaArchive<'_>,
    decoders: &DecoderChain,
    metadata: &mut ResolvedMetadata,
) {
    let Some(name) = ipa.find(archive::is_itunes_metadata_path).into_iter().next() else {
        return;
    };
    let Some(dict) = ipa.read(&name).and_then(|e| decoders.decode(&e.raw_bytes)) else {
        debug!(path = %name, "undecodable iTunesMetadata");
        return;
    };

    let version = dict
        .get_string("bundleShortVersionString")
        .or_else(|| dict.get_string("bundleVersion"));
    metadata.fill_defaults(
        dict.get_string("itemName"),
        dict.get_string("softwareVersionBundleId"),
        version,
    );
}

/// `uploads/My App.ipa` -> `My App`.
fn name_from_file(fallback_name: &str) -> Option<String> {
    let file_name = Path::new(fallback_name.trim())
        .file_name()?
        .to_string_lossy()
        .into_owned();

    let stem = match file_name.rsplit_once('.') {
        Some((stem, ext))
            if ARCHIVE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known)) =>
        {
            stem
        }
        _ => file_name.as_str(),
    };

    let stem = stem.trim();
    (!stem.is_empty()).then(|| stem.to_string())
}
