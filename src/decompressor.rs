//! LAZ decompression of single COPC chunks.

use laz::laszip::LazVlr;
use laz::record::{LayeredPointRecordDecompressor, RecordDecompressor};
use std::io::Cursor;

/// Decompresses one chunk into `point_count` point records.
///
/// Chunks are independently compressed, so no chunk table is needed; the
/// record schema comes from the laszip vlr.
pub(crate) fn decompress_chunk(
    chunk: &[u8],
    point_count: u64,
    vlr: &LazVlr,
) -> crate::Result<Vec<u8>> {
    let point_size = vlr.items_size() as usize;
    let mut decompressor = LayeredPointRecordDecompressor::new(Cursor::new(chunk));
    decompressor.set_fields_from(vlr.items())?;

    let mut points = vec![0u8; point_count as usize * point_size];
    for point in points.chunks_exact_mut(point_size) {
        decompressor.decompress_next(point)?;
    }
    Ok(points)
}
