//! Chunked LAZ compression of COPC point data.

use byteorder::{LittleEndian, WriteBytesExt};
use laz::laszip::{ChunkTable, ChunkTableEntry, LazItemRecordBuilder, LazVlr};
use laz::record::{LayeredPointRecordCompressor, RecordCompressor};
use std::io::{Seek, SeekFrom, Write};

/// Builds the LAZ record schema for a COPC point format plus extra bytes.
pub(crate) fn build_laz_vlr(point_format_id: u8, extra_bytes: u16) -> LazVlr {
    let mut laz_items = LazItemRecordBuilder::new();
    laz_items.add_item(laz::LazItemType::Point14);
    if point_format_id == 7 {
        laz_items.add_item(laz::LazItemType::RGB14);
    }
    if point_format_id == 8 {
        laz_items.add_item(laz::LazItemType::RGBNIR14);
    }
    if extra_bytes > 0 {
        laz_items.add_item(laz::LazItemType::Byte14(extra_bytes));
    }
    laz::LazVlrBuilder::new(laz_items.build())
        .with_variable_chunk_size()
        .build()
}

/// Compresses point chunks to the destination stream, one chunk per node,
/// and accumulates the LAZ chunk table.
pub(crate) struct CopcCompressor<'a, W: Write + Seek + 'a> {
    vlr: LazVlr,
    record_compressor: LayeredPointRecordCompressor<'a, W>,
    /// Position of the reserved offset to the chunk table
    start_pos: u64,
    /// Table of chunks written so far
    chunk_table: ChunkTable,
    /// Entry for the chunk we are currently compressing
    current_chunk_entry: ChunkTableEntry,
    /// Absolute position where the current chunk starts, 0 until the
    /// chunk table offset has been reserved
    chunk_start_pos: u64,
}

impl<'a, W: Write + Seek + 'a> CopcCompressor<'a, W> {
    /// Creates a compressor using the provided vlr.
    pub(crate) fn new(write: W, vlr: LazVlr) -> crate::Result<Self> {
        let mut record_compressor = LayeredPointRecordCompressor::new(write);
        record_compressor.set_fields_from(vlr.items())?;
        let start_pos = record_compressor.get_mut().stream_position()?;
        Ok(Self {
            vlr,
            record_compressor,
            start_pos,
            chunk_table: ChunkTable::default(),
            current_chunk_entry: ChunkTableEntry::default(),
            chunk_start_pos: 0,
        })
    }

    /// Compresses one chunk of points laid out exactly as they would be in a
    /// LAS file, in little endian order. Returns the chunk table entry and
    /// the absolute offset of the written chunk.
    pub(crate) fn compress_chunk(
        &mut self,
        chunk: &[u8],
    ) -> crate::Result<(ChunkTableEntry, u64)> {
        if self.chunk_start_pos == 0 {
            self.reserve_offset_to_chunk_table()?;
        }
        for point in chunk.chunks_exact(self.vlr.items_size() as usize) {
            self.record_compressor.compress_next(point)?;
            self.current_chunk_entry.point_count += 1;
        }
        self.finish_current_chunk()
    }

    /// Writes an already compressed chunk verbatim and records it in the
    /// chunk table with the declared point count.
    pub(crate) fn write_chunk(
        &mut self,
        chunk: &[u8],
        point_count: u64,
    ) -> crate::Result<(ChunkTableEntry, u64)> {
        if self.chunk_start_pos == 0 {
            self.reserve_offset_to_chunk_table()?;
        }
        let stream = self.record_compressor.get_mut();
        stream.write_all(chunk)?;

        let entry = ChunkTableEntry {
            point_count,
            byte_count: chunk.len() as u64,
        };
        self.chunk_table.push(entry);
        let chunk_offset = self.chunk_start_pos;
        self.chunk_start_pos += chunk.len() as u64;
        Ok((entry, chunk_offset))
    }

    /// Must be called once all chunks are written: writes the chunk table
    /// and patches the reserved offset pointing to it.
    pub(crate) fn done(&mut self) -> crate::Result<()> {
        if self.chunk_start_pos == 0 {
            self.reserve_offset_to_chunk_table()?;
        }
        self.record_compressor.done()?;

        let stream = self.record_compressor.get_mut();
        let start_of_chunk_table_pos = stream.stream_position()?;
        stream.seek(SeekFrom::Start(self.start_pos))?;
        stream.write_i64::<LittleEndian>(start_of_chunk_table_pos as i64)?;
        stream.seek(SeekFrom::Start(start_of_chunk_table_pos))?;
        self.chunk_table.write_to(stream, &self.vlr)?;
        Ok(())
    }

    pub(crate) fn get_mut(&mut self) -> &mut W {
        self.record_compressor.get_mut()
    }

    /// Finish the chunk formed by the points compressed since the previous
    /// finish, flushing the record compressor so the next chunk is
    /// independently decompressable.
    fn finish_current_chunk(&mut self) -> crate::Result<(ChunkTableEntry, u64)> {
        self.record_compressor.done()?;
        self.record_compressor.reset();
        self.record_compressor.set_fields_from(self.vlr.items())?;

        let chunk_offset = self.chunk_start_pos;
        let current_pos = self.record_compressor.get_mut().stream_position()?;
        self.current_chunk_entry.byte_count = current_pos - self.chunk_start_pos;
        self.chunk_start_pos = current_pos;

        let written_chunk_entry = self.current_chunk_entry;
        self.chunk_table.push(written_chunk_entry);
        self.current_chunk_entry = ChunkTableEntry::default();
        Ok((written_chunk_entry, chunk_offset))
    }

    /// The 8 first bytes of the laz data block are the offset to the chunk
    /// table; reserve them before the first chunk. Patched in [done].
    ///
    /// [done]: Self::done
    fn reserve_offset_to_chunk_table(&mut self) -> crate::Result<()> {
        debug_assert_eq!(self.chunk_start_pos, 0);
        let stream = self.record_compressor.get_mut();
        self.start_pos = stream.stream_position()?;
        stream.write_i64::<LittleEndian>(-1)?;
        self.chunk_start_pos = self.start_pos + 8;
        Ok(())
    }
}
