use plist::{Dictionary, Value};
use std::io::Cursor;
use tracing::trace;

const BINARY_MAGIC: &[u8] = b"bplist";
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// One way of turning raw bytes into a top-level plist dictionary.
pub trait PlistDecoder {
    fn name(&self) -> &'static str;

    /// Returns `None` when the bytes are not in this decoder's format or the
    /// root object is not a dictionary.
    fn decode(&self, bytes: &[u8]) -> Option<Dictionary>;
}

/// Apple's legacy binary property-list encoding.
pub struct BinaryDecoder;

impl PlistDecoder for BinaryDecoder {
    fn name(&self) -> &'static str {
        "binary"
    }

    fn decode(&self, bytes: &[u8]) -> Option<Dictionary> {
        if !bytes.starts_with(BINARY_MAGIC) {
            return None;
        }
        plist::from_bytes::<Dictionary>(bytes).ok()
    }
}

/// XML property lists, tolerant of a byte-order mark and leading whitespace.
pub struct XmlDecoder;

impl PlistDecoder for XmlDecoder {
    fn name(&self) -> &'static str {
        "xml"
    }

    fn decode(&self, bytes: &[u8]) -> Option<Dictionary> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        let start = bytes.iter().position(|b| !b.is_ascii_whitespace())?;
        plist::from_reader_xml::<_, Dictionary>(Cursor::new(&bytes[start..])).ok()
    }
}

/// Ordered list of decoders; the first success wins.
pub struct DecoderChain {
    decoders: Vec<Box<dyn PlistDecoder + Send + Sync>>,
}

impl DecoderChain {
    pub fn new(decoders: Vec<Box<dyn PlistDecoder + Send + Sync>>) -> Self {
        Self { decoders }
    }

    pub fn decode(&self, bytes: &[u8]) -> Option<Dictionary> {
        for decoder in &self.decoders {
            if let Some(dict) = decoder.decode(bytes) {
                trace!(decoder = decoder.name(), "decoded property list");
                return Some(dict);
            }
        }
        None
    }
}

impl Default for DecoderChain {
    fn default() -> Self {
        let decoders: Vec<Box<dyn PlistDecoder + Send + Sync>> =
            vec![Box::new(BinaryDecoder), Box::new(XmlDecoder)];
        Self::new(decoders)
    }
}

/// Decode with the default binary-then-XML chain.
pub fn decode_dictionary(bytes: &[u8]) -> Option<Dictionary> {
    DecoderChain::default().decode(bytes)
}

/// Read helpers over descriptor dictionaries. Blank strings count as absent.
pub trait DictionaryExt {
    fn get_string(&self, key: &str) -> Option<&str>;

    /// First non-blank string of an array value.
    fn get_first_string(&self, key: &str) -> Option<&str>;

    fn get_dict(&self, key: &str) -> Option<&Dictionary>;
}

impl DictionaryExt for Dictionary {
    fn get_string(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(Value::as_string)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    fn get_first_string(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(Value::as_array)?
            .iter()
            .filter_map(Value::as_string)
            .map(str::trim)
            .find(|s| !s.is_empty())
    }

    fn get_dict(&self, key: &str) -> Option<&Dictionary> {
        self.get(key).and_then(Value::as_dictionary)
    }
}
