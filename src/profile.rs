use crate::plist_ext::{DictionaryExt, PlistDecoder, XmlDecoder};
use plist::Dictionary;
use tracing::debug;

pub const UNKNOWN_TEAM: &str = "Unknown";

const XML_PROLOG: &[u8] = b"<?xml";
const PLIST_CLOSE: &[u8] = b"</plist>";
const WILDCARD: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningProfileInfo {
    pub team_name: String,
    pub team_id: Option<String>,
    /// `application-identifier` with the `PREFIX.` removed.
    pub bundle_id_hint: Option<String>,
}

impl Default for SigningProfileInfo {
    fn default() -> Self {
        Self {
            team_name: UNKNOWN_TEAM.to_string(),
            team_id: None,
            bundle_id_hint: None,
        }
    }
}

impl SigningProfileInfo {
    /// Never fails; a malformed profile yields the defaults.
    pub fn parse(profile_data: &[u8]) -> Self {
        match embedded_plist(profile_data) {
            Some(dict) => Self::from_dictionary(&dict),
            None => {
                debug!("no decodable plist in signing profile");
                Self::default()
            }
        }
    }

    pub fn from_dictionary(dict: &Dictionary) -> Self {
        let team_id = dict.get_first_string("TeamIdentifier").map(str::to_string);

        let team_name = dict
            .get_string("TeamName")
            .or(team_id.as_deref())
            .or_else(|| dict.get_first_string("ApplicationIdentifierPrefix"))
            .unwrap_or(UNKNOWN_TEAM)
            .to_string();

        let bundle_id_hint = dict
            .get_dict("Entitlements")
            .and_then(|e| e.get_string("application-identifier"))
            .and_then(strip_team_prefix)
            .map(str::to_string);

        Self {
            team_name,
            team_id,
            bundle_id_hint,
        }
    }
}

/// `ABCDE12345.com.example.app` -> `com.example.app`; wildcards give `None`.
fn strip_team_prefix(app_id: &str) -> Option<&str> {
    let (_, rest) = app_id.split_once('.')?;
    if rest.is_empty() || rest == WILDCARD {
        return None;
    }
    Some(rest)
}

/// The XML payload of a CMS-signed profile, between `<?xml` and the last `</plist>`.
/// The signature is not checked.
fn embedded_plist(profile_data: &[u8]) -> Option<Dictionary> {
    let start = profile_data
        .windows(XML_PROLOG.len())
        .position(|w| w == XML_PROLOG)?;

    let end = profile_data
        .windows(PLIST_CLOSE.len())
        .rposition(|w| w == PLIST_CLOSE)?
        + PLIST_CLOSE.len();

    if start >= end {
        return None;
    }

    XmlDecoder.decode(&profile_data[start..end])
}
