//! JSON metadata carried by fingerprint files.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{IndexError, Result};

/// Shared by every reader and writer, the generic container and the
/// inverted index alike.
pub const FORMAT_MAGIC: u32 = 0x4865_0001;

/// Physical order of a fingerprint payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Order {
    RowMajor,
    ColumnMajor,
}

/// Describes how the fingerprints were produced. Only `name` and `type` are
/// known; anything else a producer adds is kept as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FingerprintMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FingerprintMetadata {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        FingerprintMetadata {
            name: name.into(),
            kind: kind.into(),
            extra: Map::new(),
        }
    }

    /// Adds a producer-specific parameter such as a path length or prime.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Header of a fingerprint file:
///
/// ```json
/// {"filetype":"fingerprints","order":"row-major","num_bits":1024,
///  "num_fingerprints":1000000,"fingerprint":{"name":"paths","type":"trees","k":7}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingerprintHeader {
    #[serde(default = "default_filetype")]
    pub filetype: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Order>,
    pub num_bits: usize,
    pub num_fingerprints: usize,
    #[serde(default)]
    pub fingerprint: FingerprintMetadata,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_filetype() -> String {
    "fingerprints".to_owned()
}

const REQUIRED: [&str; 2] = ["num_bits", "num_fingerprints"];

impl FingerprintHeader {
    pub fn new(
        order: Order,
        num_bits: usize,
        num_fingerprints: usize,
        fingerprint: FingerprintMetadata,
    ) -> Self {
        FingerprintHeader {
            filetype: default_filetype(),
            order: Some(order),
            num_bits,
            num_fingerprints,
            fingerprint,
            extra: Map::new(),
        }
    }

    /// Parses the header text of the file at `path`. `path` only feeds
    /// error messages.
    pub fn parse(path: &Path, json: &str) -> Result<Self> {
        let invalid = |source| IndexError::InvalidHeader {
            path: path.to_path_buf(),
            source,
        };
        let value: Value = serde_json::from_str(json).map_err(invalid)?;
        if let Value::Object(fields) = &value {
            if let Some(field) = REQUIRED.into_iter().find(|f| !fields.contains_key(*f)) {
                return Err(IndexError::MissingField {
                    path: path.to_path_buf(),
                    field,
                });
            }
        }
        serde_json::from_value(value).map_err(invalid)
    }

    pub fn to_json(&self) -> String {
        // Maps with string keys always serialize.
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn producer_fields_pass_through() {
        let json = r#"{"filetype":"fingerprints","order":"row-major","num_bits":1024,
            "num_fingerprints":3,"fingerprint":{"name":"My custom fingerprint",
            "type":"paths","k":7,"prime":1021},"created_by":"tool"}"#;
        let header = FingerprintHeader::parse(Path::new("x.fp"), json).unwrap();
        assert_eq!(header.order, Some(Order::RowMajor));
        assert_eq!(header.num_bits, 1024);
        assert_eq!(header.num_fingerprints, 3);
        assert_eq!(header.fingerprint.kind, "paths");
        assert_eq!(header.fingerprint.extra["k"], 7);
        assert_eq!(header.extra["created_by"], "tool");

        let again = FingerprintHeader::parse(Path::new("x.fp"), &header.to_json()).unwrap();
        assert_eq!(again, header);
    }

    #[test]
    fn only_counts_are_required() {
        let json = r#"{"num_bits":8,"num_fingerprints":0}"#;
        let header = FingerprintHeader::parse(Path::new("x.fp"), json).unwrap();
        assert_eq!(header.filetype, "fingerprints");
        assert_eq!(header.order, None);
        assert_eq!(header.fingerprint, FingerprintMetadata::default());
    }

    #[test]
    fn missing_field_is_named() {
        let err = FingerprintHeader::parse(Path::new("x.fp"), r#"{"num_bits":8}"#).unwrap_err();
        assert!(matches!(err, IndexError::MissingField { field: "num_fingerprints", .. }));
        assert_eq!(
            err.to_string(),
            "JSON header for x.fp does not contain 'num_fingerprints' attribute"
        );
    }

    #[test]
    fn malformed_json() {
        let err = FingerprintHeader::parse(Path::new("x.fp"), "{num_bits").unwrap_err();
        assert!(matches!(err, IndexError::InvalidHeader { .. }));
        let json = r#"{"num_bits":"many","num_fingerprints":1}"#;
        let err = FingerprintHeader::parse(Path::new("x.fp"), json).unwrap_err();
        assert!(matches!(err, IndexError::InvalidHeader { .. }));
    }

    #[test]
    fn metadata_builder() {
        let meta = FingerprintMetadata::new("trees", "chemsift::trees").with("k", 7);
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["type"], "chemsift::trees");
        assert_eq!(json["k"], 7);
    }
}
