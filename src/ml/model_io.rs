//! Model file format.
//!
//! A model file stores a [`TrainedPipeline`] and the schema of its input:
//!
//! ```text
//! magic "QLNM" | version [1, 0] | payload length (u64 LE) | CRC-32 of payload (u32 LE) | payload
//! ```
//!
//! The payload is the bincode encoding of the input schema followed by the
//! fitted transforms. Everything in it is stored in ordered containers, so
//! saving the same pipeline always produces the same bytes.

use std::fs::{self, File};
use std::io::{BufWriter, Cursor, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{QuillonError, Result};
use crate::ml::pipeline::TrainedPipeline;
use crate::ml::schema::Schema;
use crate::ml::transforms::Transform;

/// File magic.
pub const MODEL_MAGIC: &[u8; 4] = b"QLNM";

/// Format version (major, minor).
pub const MODEL_VERSION: [u8; 2] = [1, 0];

/// Bytes before the payload.
const HEADER_LEN: usize = 4 + 2 + 8 + 4;

#[derive(Serialize)]
struct PayloadRef<'a> {
    input_schema: &'a Schema,
    transforms: &'a [Transform],
}

#[derive(Deserialize)]
struct Payload {
    input_schema: Schema,
    transforms: Vec<Transform>,
}

/// Encode a pipeline into model file bytes.
pub fn encode_model(pipeline: &TrainedPipeline) -> Result<Vec<u8>> {
    let payload = bincode::serde::encode_to_vec(
        PayloadRef {
            input_schema: pipeline.input_schema(),
            transforms: pipeline.transforms(),
        },
        bincode::config::standard(),
    )
    .map_err(|e| QuillonError::serialization(format!("Failed to encode model: {e}")))?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.write_all(MODEL_MAGIC)?;
    bytes.write_all(&MODEL_VERSION)?;
    bytes.write_u64::<LittleEndian>(payload.len() as u64)?;
    bytes.write_u32::<LittleEndian>(crc32fast::hash(&payload))?;
    bytes.write_all(&payload)?;

    Ok(bytes)
}

/// Decode model file bytes, verifying magic, version, length and checksum.
pub fn decode_model(bytes: &[u8]) -> Result<TrainedPipeline> {
    if bytes.len() < HEADER_LEN {
        return Err(QuillonError::model_format(format!(
            "file too short for a model header: {} bytes",
            bytes.len()
        )));
    }

    let mut reader = Cursor::new(bytes);
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != MODEL_MAGIC {
        return Err(QuillonError::model_format("not a model file (bad magic)"));
    }

    let mut version = [0u8; 2];
    reader.read_exact(&mut version)?;
    if version[0] != MODEL_VERSION[0] {
        return Err(QuillonError::model_format(format!(
            "unsupported model version {}.{}",
            version[0], version[1]
        )));
    }

    let payload_len = reader.read_u64::<LittleEndian>()?;
    let stored_checksum = reader.read_u32::<LittleEndian>()?;
    let payload = &bytes[HEADER_LEN..];
    if payload.len() as u64 != payload_len {
        return Err(QuillonError::model_format(format!(
            "payload length mismatch: header says {payload_len}, found {}",
            payload.len()
        )));
    }

    let checksum = crc32fast::hash(payload);
    if checksum != stored_checksum {
        return Err(QuillonError::model_format(format!(
            "checksum mismatch: expected {stored_checksum:08x}, got {checksum:08x}"
        )));
    }

    let (decoded, _): (Payload, usize) =
        bincode::serde::decode_from_slice(payload, bincode::config::standard())
            .map_err(|e| QuillonError::serialization(format!("Failed to decode model: {e}")))?;

    TrainedPipeline::new(decoded.input_schema, decoded.transforms)
}

/// Write a pipeline to `path`, creating parent directories.
pub fn save_model<P: AsRef<Path>>(path: P, pipeline: &TrainedPipeline) -> Result<()> {
    let path = path.as_ref();
    let bytes = encode_model(pipeline)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&bytes)?;
    writer.flush()?;

    info!("Saved model to {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

/// Read a pipeline from `path`.
pub fn load_model<P: AsRef<Path>>(path: P) -> Result<TrainedPipeline> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| {
        QuillonError::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {e}", path.display()),
        ))
    })?;
    let pipeline = decode_model(&bytes)?;
    debug!(
        "Loaded model from {} ({} transforms)",
        path.display(),
        pipeline.transforms().len()
    );
    Ok(pipeline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::record::QuestionRecord;
    use crate::data::view::DataView;
    use crate::ml::pipeline::question_pipeline;
    use crate::ml::trainers::{NaiveBayesOptions, TrainerOptions};
    use crate::ml::transforms::TextFeaturizerOptions;

    fn trained() -> TrainedPipeline {
        let data = DataView::from_records(&[
            QuestionRecord::new("Magazzino", "inventario magazzino"),
            QuestionRecord::new("Fatturazione", "fattura scartata"),
        ]);
        question_pipeline(
            TextFeaturizerOptions::default(),
            TrainerOptions::NaiveBayes(NaiveBayesOptions::default()),
        )
        .fit(&data, 3)
        .unwrap()
    }

    #[test]
    fn test_header_layout() {
        let bytes = encode_model(&trained()).unwrap();
        assert_eq!(&bytes[..4], b"QLNM");
        assert_eq!(&bytes[4..6], &[1, 0]);
        let len = u64::from_le_bytes(bytes[6..14].try_into().unwrap());
        assert_eq!(len as usize, bytes.len() - HEADER_LEN);
    }

    #[test]
    fn test_decode_restores_pipeline() {
        let pipeline = trained();
        let restored = decode_model(&encode_model(&pipeline).unwrap()).unwrap();

        assert_eq!(restored.input_schema(), pipeline.input_schema());
        assert_eq!(restored.output_schema(), pipeline.output_schema());
        assert_eq!(
            encode_model(&restored).unwrap(),
            encode_model(&pipeline).unwrap()
        );
    }

    #[test]
    fn test_corruption_detected() {
        let mut bytes = encode_model(&trained()).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        let err = decode_model(&bytes).unwrap_err();
        assert!(err.to_string().contains("checksum mismatch"));
    }

    #[test]
    fn test_bad_magic_and_truncation() {
        let mut bytes = encode_model(&trained()).unwrap();
        bytes.truncate(bytes.len() - 5);
        assert!(decode_model(&bytes).unwrap_err().to_string().contains("length"));

        bytes[0] = b'X';
        assert!(decode_model(&bytes).unwrap_err().to_string().contains("magic"));

        assert!(decode_model(b"QL").is_err());
    }

    #[test]
    fn test_major_version_mismatch_rejected() {
        let mut bytes = encode_model(&trained()).unwrap();
        bytes[4] = 2;

        match decode_model(&bytes) {
            Err(QuillonError::ModelFormat(msg)) => {
                assert_eq!(msg, "unsupported model version 2.0")
            }
            other => panic!("expected a model format error, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_minor_version_is_accepted() {
        let mut bytes = encode_model(&trained()).unwrap();
        bytes[5] = 7;
        assert!(decode_model(&bytes).is_ok());
    }
}
