//! Whole-buffer compression/decompression for framed objects, with
//! magic-byte auto-detection so readers never need to know which format
//! wrote a given object.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::config::CompressionFormat;
use crate::errors::AvcError;

const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

fn looks_like_zstd(data: &[u8]) -> bool {
    data.len() >= 4 && data[..4] == ZSTD_MAGIC
}

fn looks_like_zlib(data: &[u8]) -> bool {
    match data.first() {
        Some(&cmf) => cmf == 0x78 || cmf & 0x0f == 0x08,
        None => false,
    }
}

/// Compress `framed` (already-hashed object bytes) under `format`. `fast`
/// selects compression level 0 (store, no compression work) instead of the
/// mid-level default.
pub fn compress(format: CompressionFormat, framed: &[u8], fast: bool) -> Result<Vec<u8>, AvcError> {
    match format {
        CompressionFormat::ZlibV1 => {
            let level = if fast { 0 } else { 6 };
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level));
            encoder.write_all(framed)?;
            Ok(encoder.finish()?)
        }
        CompressionFormat::ZstdV2 => {
            let level = if fast { 0 } else { 3 };
            zstd::stream::encode_all(framed, level)
                .map_err(|e| AvcError::ObjectCorrupt("<write>".to_string(), e.to_string()))
        }
    }
}

/// Decompress a stored object, auto-detecting zstd vs zlib framing.
/// `size_hint` pre-sizes the output buffer from the caller's best guess at
/// the decompressed length (e.g. compressed-file length times a fudge
/// factor); `Vec` grows past that hint automatically if the guess was
/// short, which is what gives readers the "retry with a larger buffer"
/// behavior without a literal second pass.
pub fn decompress(data: &[u8], size_hint: usize) -> Result<Vec<u8>, AvcError> {
    let mut out = Vec::with_capacity(size_hint);
    if looks_like_zstd(data) {
        let mut decoder =
            zstd::stream::Decoder::new(data).map_err(|e| AvcError::ObjectCorrupt("<read>".to_string(), e.to_string()))?;
        decoder.read_to_end(&mut out)?;
    } else if looks_like_zlib(data) {
        let mut decoder = ZlibDecoder::new(data);
        decoder.read_to_end(&mut out)?;
    } else {
        return Err(AvcError::FormatUnsupported(
            "unrecognized compression magic bytes".to_string(),
        ));
    }
    Ok(out)
}
