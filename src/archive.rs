use crate::error::Result;
use std::io::{Cursor, Read};
use tracing::warn;
use zip::ZipArchive;

pub const DESCRIPTOR_NAME: &str = "info.plist";
pub const PROFILE_NAME: &str = "embedded.mobileprovision";
pub const ITUNES_METADATA_NAME: &str = "itunesmetadata.plist";

/// Descriptors and profiles are small; anything past this is not one.
const MAX_METADATA_SIZE: u64 = 16 * 1024 * 1024;

const FRAMEWORK_MARKERS: &[&str] = &[".framework/", "/frameworks/"];
const SUPPORT_MARKERS: &[&str] = &["_codesignature/", "sc_info/"];
const EXTENSION_MARKERS: &[&str] = &[".appex/", "/plugins/", "/extensions/", "/watch/"];

/// A named file inside the uploaded archive.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub path: String,
    pub raw_bytes: Vec<u8>,
}

/// Read-only view of an in-memory .ipa.
pub struct IpaArchive<'a> {
    zip: ZipArchive<Cursor<&'a [u8]>>,
    names: Vec<String>,
}

impl<'a> IpaArchive<'a> {
    pub fn open(bytes: &'a [u8]) -> Result<Self> {
        let zip = ZipArchive::new(Cursor::new(bytes))?;
        // central directory order
        let names = zip.file_names().map(str::to_string).collect();
        Ok(Self { zip, names })
    }

    /// Entry names in stored order, directories excluded.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names
            .iter()
            .map(String::as_str)
            .filter(|name| !name.ends_with('/'))
    }

    pub fn find(&self, pred: impl Fn(&str) -> bool) -> Vec<String> {
        self.names()
            .filter(|name| pred(normalize(name).as_str()))
            .map(str::to_string)
            .collect()
    }

    /// Read a small metadata entry. Oversized or unreadable entries yield `None`.
    pub fn read(&mut self, name: &str) -> Option<ArchiveEntry> {
        let mut file = match self.zip.by_name(name) {
            Ok(f) => f,
            Err(e) => {
                warn!(entry = name, error = %e, "could not open archive entry");
                return None;
            }
        };

        if file.size() > MAX_METADATA_SIZE {
            warn!(entry = name, size = file.size(), "skipping oversized metadata entry");
            return None;
        }

        // the declared size can lie; cap what we decompress
        let mut raw_bytes = Vec::with_capacity(file.size() as usize);
        if let Err(e) = (&mut file).take(MAX_METADATA_SIZE + 1).read_to_end(&mut raw_bytes) {
            warn!(entry = name, error = %e, "could not read archive entry");
            return None;
        }
        if raw_bytes.len() as u64 > MAX_METADATA_SIZE {
            warn!(entry = name, "metadata entry inflates past its size limit");
            return None;
        }

        Some(ArchiveEntry {
            path: normalize(name),
            raw_bytes,
        })
    }
}

fn normalize(name: &str) -> String {
    name.replace('\\', "/")
}

fn lower(path: &str) -> String {
    path.to_ascii_lowercase()
}

/// An `Info.plist` that is not a framework or support-file resource.
pub fn is_descriptor_path(path: &str) -> bool {
    let path = lower(path);
    if !path.ends_with(DESCRIPTOR_NAME) {
        return false;
    }
    // require a whole file name, not e.g. "GoogleService-Info.plist"
    if path.len() > DESCRIPTOR_NAME.len()
        && !path[..path.len() - DESCRIPTOR_NAME.len()].ends_with('/')
    {
        return false;
    }
    let path = format!("/{}", path);
    !FRAMEWORK_MARKERS
        .iter()
        .chain(SUPPORT_MARKERS)
        .any(|m| path.contains(m))
}

/// Sits below `Payload/<something>.app/`.
pub fn is_in_app_bundle(path: &str) -> bool {
    let mut parts = path.split('/');
    let payload = parts.next().map(lower);
    let bundle = parts.next().map(lower);
    payload.as_deref() == Some("payload")
        && bundle.map(|b| b.len() > 4 && b.ends_with(".app")).unwrap_or(false)
        && parts.next().is_some()
}

/// Exactly `Payload/<name>.app/Info.plist`.
pub fn is_canonical_descriptor(path: &str) -> bool {
    let parts = path.split('/').collect::<Vec<_>>();
    parts.len() == 3 && is_in_app_bundle(path) && lower(parts[2]) == DESCRIPTOR_NAME
}

/// Path belongs to an app extension, plugin or watch companion.
pub fn has_extension_marker(path: &str) -> bool {
    let path = format!("/{}", lower(path));
    if EXTENSION_MARKERS.iter().any(|m| path.contains(m)) {
        return true;
    }
    // directories below the main bundle; the bundle's own name doesn't count
    let dirs = path.trim_start_matches('/').split('/').collect::<Vec<_>>();
    dirs.len() > 3
        && dirs[2..dirs.len() - 1]
            .iter()
            .any(|segment| segment.contains("extension"))
}

pub fn is_profile_path(path: &str) -> bool {
    lower(path).ends_with(PROFILE_NAME)
}

/// The main bundle's profile: `Payload/<name>.app/embedded.mobileprovision`.
pub fn is_main_profile_path(path: &str) -> bool {
    let parts = path.split('/').collect::<Vec<_>>();
    parts.len() == 3 && is_in_app_bundle(path) && lower(parts[2]) == PROFILE_NAME
}

pub fn is_itunes_metadata_path(path: &str) -> bool {
    let path = lower(path);
    path == ITUNES_METADATA_NAME || path.ends_with(&format!("/{}", ITUNES_METADATA_NAME))
}
