//! Loaders for descriptor files and per-query ground truth.
//!
//! Descriptor files hold one record per line, `<id> <d_1> ... <d_D>`,
//! whitespace separated. Ground-truth files hold one relevant id per line.

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{LshError, Result};
use crate::evaluation::GroundTruth;
use crate::storage::VectorRecord;
use crate::vector::Vector;

/// Read and parse a descriptor file.
///
/// The file is memory-mapped when possible and read into memory otherwise.
pub fn load_descriptors(path: impl AsRef<Path>) -> Result<Vec<VectorRecord>> {
    let path = path.as_ref();
    let file = File::open(path)?;

    let records = match unsafe { memmap2::Mmap::map(&file) } {
        Ok(mmap) => parse_descriptors(as_utf8(&mmap)?)?,
        Err(_) => {
            // Fallback to regular I/O
            let bytes = std::fs::read(path)?;
            parse_descriptors(as_utf8(&bytes)?)?
        }
    };

    debug!(path = %path.display(), records = records.len(), "loaded descriptors");
    Ok(records)
}

fn as_utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|e| LshError::Parse {
        line: bytes[..e.valid_up_to()]
            .iter()
            .filter(|&&b| b == b'\n')
            .count()
            + 1,
        reason: format!("line is not valid UTF-8: {}", e),
    })
}

/// Parse descriptor text. Blank lines are skipped; every record must have
/// the dimensionality of the first one.
pub fn parse_descriptors(text: &str) -> Result<Vec<VectorRecord>> {
    let mut records = Vec::new();
    let mut dimension: Option<usize> = None;

    for (i, line) in text.lines().enumerate() {
        let line_no = i + 1;
        let mut tokens = line.split_whitespace();
        let Some(id) = tokens.next() else {
            continue;
        };

        let vector = Vector::from_tokens(tokens).map_err(|e| LshError::Parse {
            line: line_no,
            reason: e.to_string(),
        })?;
        if vector.dimension() == 0 {
            return Err(LshError::Parse {
                line: line_no,
                reason: format!("record {} has no components", id),
            });
        }

        match dimension {
            Some(expected) if expected != vector.dimension() => {
                return Err(LshError::DimensionMismatch {
                    expected,
                    actual: vector.dimension(),
                });
            }
            Some(_) => {}
            None => dimension = Some(vector.dimension()),
        }

        records.push(VectorRecord::new(id, vector));
    }

    Ok(records)
}

/// Path of the ground-truth file for `query` inside `dir`.
pub fn ground_truth_path(dir: impl AsRef<Path>, query: &str) -> PathBuf {
    dir.as_ref().join(format!("{}.txt", query))
}

/// Read a ground-truth file: one relevant id per line, blanks ignored.
pub fn load_ground_truth(path: impl AsRef<Path>) -> Result<GroundTruth> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_ground_truth(&text))
}

pub fn parse_ground_truth(text: &str) -> GroundTruth {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect()
}
