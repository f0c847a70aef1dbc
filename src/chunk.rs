use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{ModelError, Result};

/// Byte-aligned division of a training file into per-worker chunks.
#[derive(Clone, Debug)]
pub struct FileChunks {
    /// Starting byte offset of each chunk; every offset is the beginning of
    /// a line. Worker `i` reads from `offsets[i]` up to `offsets[i + 1]`
    /// (end of file for the last worker).
    pub offsets: Vec<u64>,
    /// Lines in the file.
    pub lines: u64,
    /// Whitespace-separated tokens in the file.
    pub words: u64,
}

/// Scan the file once, recording line starts and counting tokens, then pick
/// `n_chunks` chunk boundaries with the same number of lines each.
///
/// The chunk count is clamped to the line count so no two chunks start on
/// the same line.
pub fn chunkify(path: &Path, n_chunks: usize) -> Result<FileChunks> {
    let file = File::open(path).map_err(|e| {
        ModelError::InvalidInput(format!("cannot open training file {}: {e}", path.display()))
    })?;
    let mut reader = BufReader::new(file);

    let mut line_positions: Vec<u64> = vec![0];
    let mut words = 0u64;
    let mut pos = 0u64;
    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line)?;
        if n == 0 {
            break;
        }
        words += line.split_ascii_whitespace().count() as u64;
        pos += n as u64;
        line_positions.push(pos);
    }

    let lines = (line_positions.len() - 1) as u64;
    if lines == 0 {
        return Err(ModelError::InvalidInput(format!(
            "training file {} is empty",
            path.display()
        )));
    }

    let n_chunks = n_chunks.clamp(1, lines as usize);
    let chunk_size = lines as usize / n_chunks;
    let offsets = (0..n_chunks)
        .map(|i| line_positions[i * chunk_size])
        .collect();

    Ok(FileChunks {
        offsets,
        lines,
        words,
    })
}
