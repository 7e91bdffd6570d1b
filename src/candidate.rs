//! Scoring of `Info.plist` candidates.
//!
//! An .ipa routinely carries one descriptor per extension, plugin and watch
//! app next to the main one, all called `Info.plist`. Taking the first match
//! surfaces extension metadata, so every candidate is scored and the best
//! eligible one wins.

use crate::archive::{self, ArchiveEntry};
use crate::plist_ext::{DecoderChain, DictionaryExt};
use plist::Dictionary;
use tracing::{debug, trace};

pub const KEY_DISPLAY_NAME: &str = "CFBundleDisplayName";
pub const KEY_BUNDLE_NAME: &str = "CFBundleName";
pub const KEY_BUNDLE_ID: &str = "CFBundleIdentifier";
pub const KEY_SHORT_VERSION: &str = "CFBundleShortVersionString";
pub const KEY_BUILD_VERSION: &str = "CFBundleVersion";
pub const KEY_PACKAGE_TYPE: &str = "CFBundlePackageType";
pub const KEY_EXECUTABLE: &str = "CFBundleExecutable";
pub const KEY_EXTENSION: &str = "NSExtension";

pub const PACKAGE_TYPE_APP: &str = "APPL";

const SCORE_CANONICAL: i32 = 4;
const SCORE_EXTENSION: i32 = -6;
const SCORE_BUNDLE_ID: i32 = 4;
const SCORE_PROFILE_MATCH: i32 = 6;
const SCORE_APP_PACKAGE: i32 = 2;
const SCORE_EXECUTABLE: i32 = 1;

/// The descriptor fields the resolver cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptorFields {
    pub display_name: Option<String>,
    pub bundle_name: Option<String>,
    pub bundle_id: Option<String>,
    pub short_version: Option<String>,
    pub build_version: Option<String>,
    pub package_type: Option<String>,
    pub executable: Option<String>,
    pub declares_extension: bool,
}

impl DescriptorFields {
    pub fn from_dictionary(dict: &Dictionary) -> Self {
        let get = |key: &str| dict.get_string(key).map(str::to_string);
        Self {
            display_name: get(KEY_DISPLAY_NAME),
            bundle_name: get(KEY_BUNDLE_NAME),
            bundle_id: get(KEY_BUNDLE_ID),
            short_version: get(KEY_SHORT_VERSION),
            build_version: get(KEY_BUILD_VERSION),
            package_type: get(KEY_PACKAGE_TYPE),
            executable: get(KEY_EXECUTABLE),
            declares_extension: dict.contains_key(KEY_EXTENSION),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.display_name.as_deref().or(self.bundle_name.as_deref())
    }

    pub fn version(&self) -> Option<&str> {
        self.short_version.as_deref().or(self.build_version.as_deref())
    }
}

#[derive(Debug, Clone)]
pub struct PlistCandidate {
    pub path: String,
    pub parsed_fields: DescriptorFields,
    pub score: i32,
}

impl PlistCandidate {
    /// Decode an archive entry. `None` if no decoder accepts it.
    pub fn from_entry(entry: &ArchiveEntry, decoders: &DecoderChain) -> Option<Self> {
        let Some(dict) = decoders.decode(&entry.raw_bytes) else {
            debug!(path = %entry.path, "discarding undecodable descriptor");
            return None;
        };
        Some(Self {
            path: entry.path.clone(),
            parsed_fields: DescriptorFields::from_dictionary(&dict),
            score: 0,
        })
    }

    /// Path or contents mark this as an extension/plugin/watch descriptor.
    pub fn is_extension(&self) -> bool {
        archive::has_extension_marker(&self.path) || self.parsed_fields.declares_extension
    }

    pub fn compute_score(&self, bundle_id_hint: Option<&str>) -> i32 {
        let fields = &self.parsed_fields;
        let mut score = 0;

        if archive::is_canonical_descriptor(&self.path) {
            score += SCORE_CANONICAL;
        }
        if self.is_extension() {
            score += SCORE_EXTENSION;
        }
        if let Some(bundle_id) = fields.bundle_id.as_deref() {
            score += SCORE_BUNDLE_ID;
            if bundle_id_hint == Some(bundle_id) {
                score += SCORE_PROFILE_MATCH;
            }
        }
        if fields.package_type.as_deref() == Some(PACKAGE_TYPE_APP) {
            score += SCORE_APP_PACKAGE;
        }
        if fields.executable.is_some() {
            score += SCORE_EXECUTABLE;
        }

        score
    }

    /// Only a non-extension application descriptor with a bundle id can
    /// describe the uploaded app.
    pub fn is_eligible(&self) -> bool {
        let fields = &self.parsed_fields;
        fields.bundle_id.is_some()
            && !self.is_extension()
            && fields
                .package_type
                .as_deref()
                .map_or(true, |t| t == PACKAGE_TYPE_APP)
    }
}

/// Score every candidate in place and return the index of the winner.
///
/// Highest score wins; ties go to the earliest candidate.
pub fn select(candidates: &mut [PlistCandidate], bundle_id_hint: Option<&str>) -> Option<usize> {
    let mut best: Option<usize> = None;

    for candidate in candidates.iter_mut() {
        candidate.score = candidate.compute_score(bundle_id_hint);
        trace!(
            path = %candidate.path,
            score = candidate.score,
            eligible = candidate.is_eligible(),
            "scored descriptor"
        );
    }

    for (index, candidate) in candidates.iter().enumerate() {
        if !candidate.is_eligible() {
            continue;
        }
        match best {
            Some(b) if candidates[b].score >= candidate.score => {}
            _ => best = Some(index),
        }
    }

    if let Some(index) = best {
        debug!(
            path = %candidates[index].path,
            score = candidates[index].score,
            "selected primary descriptor"
        );
    }
    best
}
