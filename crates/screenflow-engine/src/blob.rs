//! Codec for the persisted `screens` column: JSON → gzip → base85.
//!
//! Flow screen lists are the widest column in the flow row by far;
//! compressing them keeps row reads cheap, and base85 keeps the blob a
//! plain text column.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::errors::BlobError;
use crate::types::ClientFlowScreen;

/// Encode a screens list into its persisted text representation.
pub fn encode_screens(screens: &[ClientFlowScreen]) -> Result<String, BlobError> {
    let json = serde_json::to_vec(screens).map_err(|e| BlobError::Serde {
        message: e.to_string(),
    })?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json).map_err(|e| BlobError::Compress {
        message: e.to_string(),
    })?;
    let compressed = encoder.finish().map_err(|e| BlobError::Compress {
        message: e.to_string(),
    })?;
    Ok(base85::encode(&compressed))
}

/// Decode a persisted blob back into a screens list.
pub fn decode_screens(blob: &str) -> Result<Vec<ClientFlowScreen>, BlobError> {
    let compressed = base85::decode(blob).map_err(|e| BlobError::Decode {
        message: e.to_string(),
    })?;
    let mut decoder = GzDecoder::new(&compressed[..]);
    let mut json = Vec::new();
    decoder
        .read_to_end(&mut json)
        .map_err(|e| BlobError::Decompress {
            message: e.to_string(),
        })?;
    serde_json::from_slice(&json).map_err(|e| BlobError::Serde {
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ScreenRules, Substitution};
    use serde_json::json;

    #[test]
    fn round_trips_screen_lists() {
        let screens = vec![ClientFlowScreen {
            slug: "confirmation".into(),
            name: Some("Welcome".into()),
            fixed: json!({"header": "Hello"}),
            variable: vec![Substitution::Copy {
                input_path: vec!["name".into()],
                output_path: vec!["body".into()],
            }],
            allowed_triggers: vec!["home".into()],
            rules: ScreenRules::default(),
        }];

        let blob = encode_screens(&screens).unwrap();
        assert!(!blob.is_empty());
        let decoded = decode_screens(&blob).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].slug, "confirmation");
        assert_eq!(decoded[0].fixed, json!({"header": "Hello"}));
    }

    #[test]
    fn empty_list_round_trips() {
        let blob = encode_screens(&[]).unwrap();
        assert!(decode_screens(&blob).unwrap().is_empty());
    }

    #[test]
    fn garbage_blob_is_rejected() {
        assert!(decode_screens("definitely not base85 \u{1F980}").is_err());
    }
}
