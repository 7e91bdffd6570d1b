#![allow(dead_code)]

use plist::{Dictionary, Value};
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

/// Builds .ipa archives in memory.
pub struct IpaBuilder {
    files: Vec<(String, Vec<u8>)>,
}

impl IpaBuilder {
    pub fn new() -> Self {
        Self { files: Vec::new() }
    }

    pub fn file(mut self, path: &str, content: &[u8]) -> Self {
        self.files.push((path.to_string(), content.to_vec()));
        self
    }

    pub fn xml_plist(self, path: &str, dict: &Dictionary) -> Self {
        let mut buf = Vec::new();
        plist::to_writer_xml(&mut buf, dict).unwrap();
        self.file(path, &buf)
    }

    pub fn binary_plist(self, path: &str, dict: &Dictionary) -> Self {
        let mut buf = Vec::new();
        plist::to_writer_binary(&mut buf, dict).unwrap();
        self.file(path, &buf)
    }

    /// XML plist wrapped in bytes that stand in for the CMS envelope.
    pub fn profile(self, path: &str, dict: &Dictionary) -> Self {
        let mut buf = vec![0x30, 0x80, 0x06, 0x09, 0x2a, 0x86, 0x48];
        plist::to_writer_xml(&mut buf, dict).unwrap();
        buf.extend_from_slice(&[0x00, 0x00, 0xa0, 0x82, 0x0b]);
        self.file(path, &buf)
    }

    pub fn build(self) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut cursor);
            let options =
                SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
            for (path, content) in &self.files {
                zip.start_file(path.as_str(), options).unwrap();
                zip.write_all(content).unwrap();
            }
            zip.finish().unwrap();
        }
        cursor.into_inner()
    }
}

pub fn dict(pairs: &[(&str, &str)]) -> Dictionary {
    let mut dict = Dictionary::new();
    for (key, value) in pairs {
        dict.insert(key.to_string(), Value::String(value.to_string()));
    }
    dict
}

/// A provisioning profile whose application identifier is `TEAMID.<bundle_id>`.
pub fn profile_dict(team_name: &str, team_id: &str, bundle_id: &str) -> Dictionary {
    let mut entitlements = Dictionary::new();
    entitlements.insert(
        "application-identifier".to_string(),
        Value::String(format!("{}.{}", team_id, bundle_id)),
    );

    let mut profile = Dictionary::new();
    profile.insert("TeamName".to_string(), Value::String(team_name.to_string()));
    profile.insert(
        "TeamIdentifier".to_string(),
        Value::Array(vec![Value::String(team_id.to_string())]),
    );
    profile.insert("Entitlements".to_string(), Value::Dictionary(entitlements));
    profile
}
