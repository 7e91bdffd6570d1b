use crate::error::Result;
use crate::resolver::ResolvedMetadata;
use serde::{Deserialize, Serialize};

pub const ASSET_KIND: &str = "software-package";
pub const METADATA_KIND: &str = "software";

const INSTALL_SCHEME: &str = "itms-services://?action=download-manifest&url=";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallerManifest {
    pub items: Vec<ManifestItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestItem {
    pub assets: Vec<ManifestAsset>,
    pub metadata: ManifestMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestAsset {
    pub kind: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestMetadata {
    #[serde(rename = "bundle-identifier")]
    pub bundle_identifier: String,
    #[serde(rename = "bundle-version")]
    pub bundle_version: String,
    pub kind: String,
    pub title: String,
}

impl InstallerManifest {
    /// One software package at `asset_url`, described by `metadata`.
    pub fn new(asset_url: &str, metadata: &ResolvedMetadata) -> Self {
        Self {
            items: vec![ManifestItem {
                assets: vec![ManifestAsset {
                    kind: ASSET_KIND.to_string(),
                    url: asset_url.to_string(),
                }],
                metadata: ManifestMetadata {
                    bundle_identifier: xml_text(&metadata.bundle_id),
                    bundle_version: xml_text(&metadata.version),
                    kind: METADATA_KIND.to_string(),
                    title: xml_text(&metadata.app_name),
                },
            }],
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(plist::from_bytes(bytes)?)
    }

    /// UTF-8 XML plist.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        plist::to_writer_xml(&mut buf, self)?;
        Ok(buf)
    }

    /// URL of the first software package asset.
    pub fn asset_url(&self) -> Option<&str> {
        self.items
            .first()?
            .assets
            .iter()
            .find(|a| a.kind == ASSET_KIND)
            .map(|a| a.url.as_str())
    }

    pub fn metadata(&self) -> Option<&ManifestMetadata> {
        self.items.first().map(|item| &item.metadata)
    }
}

/// Drop control characters XML 1.0 can't carry; binary descriptors may hold them.
fn xml_text(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\t' | '\n' | '\r'))
        .collect()
}

/// Serialize the install manifest for `asset_url`. Same inputs, same bytes.
pub fn generate(asset_url: &str, metadata: &ResolvedMetadata) -> Result<Vec<u8>> {
    InstallerManifest::new(asset_url, metadata).to_bytes()
}

/// The link iOS hands to its installer for a hosted manifest.
pub fn install_uri(manifest_url: &str) -> String {
    format!("{}{}", INSTALL_SCHEME, manifest_url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(name: &str) -> ResolvedMetadata {
        ResolvedMetadata {
            app_name: name.to_string(),
            bundle_id: "com.x.y".to_string(),
            version: "1.0".to_string(),
            team_name: "T".to_string(),
            team_id: None,
        }
    }

    #[test]
    fn deterministic() {
        let a = generate("https://host/a.ipa", &metadata("X")).unwrap();
        let b = generate("https://host/a.ipa", &metadata("X")).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, generate("https://host/b.ipa", &metadata("X")).unwrap());
    }

    #[test]
    fn document_layout() {
        let bytes = generate("https://host/a.ipa", &metadata("X")).unwrap();
        let value = plist::Value::from_reader_xml(bytes.as_slice()).unwrap();

        let item = value
            .as_dictionary()
            .and_then(|d| d.get("items"))
            .and_then(|v| v.as_array())
            .and_then(|items| items.first())
            .and_then(|v| v.as_dictionary())
            .unwrap();

        let string = |dict: &plist::Dictionary, key: &str| {
            dict.get(key).and_then(|v| v.as_string()).map(str::to_string)
        };

        let assets = item.get("assets").and_then(|v| v.as_array()).unwrap();
        assert_eq!(assets.len(), 1);
        let asset = assets[0].as_dictionary().unwrap();
        assert_eq!(string(asset, "kind").as_deref(), Some("software-package"));
        assert_eq!(string(asset, "url").as_deref(), Some("https://host/a.ipa"));

        let meta = item.get("metadata").and_then(|v| v.as_dictionary()).unwrap();
        assert_eq!(string(meta, "bundle-identifier").as_deref(), Some("com.x.y"));
        assert_eq!(string(meta, "bundle-version").as_deref(), Some("1.0"));
        assert_eq!(string(meta, "kind").as_deref(), Some("software"));
        assert_eq!(string(meta, "title").as_deref(), Some("X"));
    }

    #[test]
    fn escapes_reserved_characters() {
        let bytes = generate("https://host/a.ipa?x=1&y=<2>", &metadata("X & Y <beta>")).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains("X &amp; Y &lt;beta"));
        assert!(!text.contains("X & Y"));

        let manifest = InstallerManifest::from_bytes(&bytes).unwrap();
        assert_eq!(manifest.metadata().unwrap().title, "X & Y <beta>");
        assert_eq!(manifest.asset_url(), Some("https://host/a.ipa?x=1&y=<2>"));
    }

    #[test]
    fn strips_control_characters() {
        let mut meta = metadata("A\u{1}B\u{1f}\tC");
        meta.version = "2.0\u{0}".to_string();
        let bytes = generate("https://host/a.ipa", &meta).unwrap();
        assert!(!bytes.iter().any(|b| matches!(b, 0x00..=0x08 | 0x0b | 0x0c | 0x0e..=0x1f)));

        let manifest = InstallerManifest::from_bytes(&bytes).unwrap();
        let parsed = manifest.metadata().unwrap();
        assert_eq!(parsed.title, "AB\tC");
        assert_eq!(parsed.bundle_version, "2.0");
    }

    #[test]
    fn install_link() {
        assert_eq!(
            install_uri("https://host/Plist/abc.plist"),
            "itms-services://?action=download-manifest&url=https://host/Plist/abc.plist"
        );
    }
}
