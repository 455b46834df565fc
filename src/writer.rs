//! COPC file writer.

use crate::compressor::{build_laz_vlr, CopcCompressor};
use crate::config::CopcConfigWriter;
use crate::copc::{CopcInfo, COPC_INFO_SIZE};
use crate::error::Error;
use crate::geometry::{Bounds, VoxelKey};
use crate::header::{LasHeader, HEADER_SIZE};
use crate::hierarchy::PageTree;
use crate::vlr::{VlrHeader, EVLR_HEADER_SIZE, VLR_HEADER_SIZE};
use byteorder::{ByteOrder, LittleEndian};
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

/// COPC file writer
///
/// Chunks appear in the file in `add_node` call order. Closing the writer
/// appends the chunk table and the hierarchy pages and patches the header
/// and COPC info with the final offsets.
pub struct CopcWriter<'a, W: Write + Seek + 'a> {
    is_closed: bool,
    start: u64,
    compressor: CopcCompressor<'a, W>,
    config: CopcConfigWriter,
    pages: PageTree,
    point_record_length: u16,
    point_count: u64,
    uncompressed_points: u64,
    bounds: Bounds,
    points_by_return: [u64; 15],
    gpstime_minimum: f64,
    gpstime_maximum: f64,
}

impl CopcWriter<'_, BufWriter<File>> {
    /// Creates a file at `path` and writes a COPC stream to it.
    ///
    /// The file name must carry the `.copc.laz` double extension.
    pub fn from_path<P: AsRef<Path>>(path: P, config: CopcConfigWriter) -> crate::Result<Self> {
        let stem = path.as_ref().file_stem().ok_or(Error::WrongCopcExtension)?;
        let copc_ext = Path::new(stem).extension().and_then(|e| e.to_str());
        let laz_ext = path.as_ref().extension().and_then(|e| e.to_str());
        match (copc_ext, laz_ext) {
            (Some(copc), Some(laz))
                if copc.eq_ignore_ascii_case("copc") && laz.eq_ignore_ascii_case("laz") => {}
            _ => return Err(Error::WrongCopcExtension),
        }
        File::create(path)
            .map_err(Error::from)
            .and_then(|file| CopcWriter::new(BufWriter::new(file), config))
    }
}

impl<'a, W: Write + Seek + 'a> CopcWriter<'a, W> {
    /// Creates a COPC writer over the write- and seekable `write`.
    ///
    /// The header and the VLRs are laid out immediately; nodes are then
    /// appended with [add_node] or [add_node_compressed] and the stream is
    /// finalized by [close].
    ///
    /// Only the LAS 1.4 point formats 6 to 8 can be written.
    ///
    /// [add_node]: Self::add_node
    /// [add_node_compressed]: Self::add_node_compressed
    /// [close]: Self::close
    pub fn new(mut write: W, mut config: CopcConfigWriter) -> crate::Result<Self> {
        let start = write.stream_position()?;

        let point_format_id = config.las_header().point_format_id;
        if !(6..=8).contains(&point_format_id) {
            return Err(Error::UnsupportedPointFormat(point_format_id));
        }

        let laz_vlr = build_laz_vlr(point_format_id, config.extra_bytes_vlr().extra_bytes_len());
        let point_record_length = config.las_header().point_record_length;
        if laz_vlr.items_size() != u64::from(point_record_length) {
            return Err(Error::PointRecordLengthMismatch {
                header: point_record_length,
                laz: laz_vlr.items_size(),
            });
        }
        let mut laz_vlr_payload = Vec::new();
        laz_vlr.write_to(&mut laz_vlr_payload)?;

        // the vlr payloads are known up front, so the point data offset is too
        let wkt_payload_size = config.wkt().len() as u64 + 1;
        let eb_vlr_size = config.extra_bytes_vlr().size();
        let mut offset_to_point_data = start
            + u64::from(HEADER_SIZE)
            + VLR_HEADER_SIZE
            + COPC_INFO_SIZE
            + VLR_HEADER_SIZE
            + laz_vlr_payload.len() as u64
            + VLR_HEADER_SIZE
            + wkt_payload_size;
        let mut number_of_variable_length_records = 3;
        if eb_vlr_size > 0 {
            offset_to_point_data += VLR_HEADER_SIZE + eb_vlr_size;
            number_of_variable_length_records += 1;
        }

        {
            let header = config.las_header_mut();
            header.offset_to_point_data = offset_to_point_data as u32;
            header.number_of_variable_length_records = number_of_variable_length_records;
            // pdrf 6-8 requires a wkt crs
            header.global_encoding |= 0b10000;
            header.generating_software = format!("copc v{}", crate::VERSION);
            header.start_of_first_evlr = 0;
            header.number_of_evlrs = 0;
        }

        // header fields are patched on close, this reserves the space
        config.las_header().write_to(&mut write)?;

        // copc requires its info vlr directly after the header
        VlrHeader {
            reserved: 0,
            user_id: "copc".to_string(),
            record_id: 1,
            data_length: COPC_INFO_SIZE,
            description: "COPC info VLR".to_string(),
            evlr_flag: false,
        }
        .write_to(&mut write)?;
        config.copc_info().write_to(&mut write)?;

        VlrHeader {
            reserved: 0,
            user_id: "laszip encoded".to_string(),
            record_id: 22204,
            data_length: laz_vlr_payload.len() as u64,
            description: "http://laszip.org".to_string(),
            evlr_flag: false,
        }
        .write_to(&mut write)?;
        write.write_all(&laz_vlr_payload)?;

        VlrHeader {
            reserved: 0,
            user_id: "LASF_Projection".to_string(),
            record_id: 2112,
            data_length: wkt_payload_size,
            description: "WKT Projection".to_string(),
            evlr_flag: false,
        }
        .write_to(&mut write)?;
        write.write_all(config.wkt().as_bytes())?;
        write.write_all(&[0])?;

        if eb_vlr_size > 0 {
            VlrHeader {
                reserved: 0,
                user_id: "LASF_Spec".to_string(),
                record_id: 4,
                data_length: eb_vlr_size,
                description: "Extra bytes record".to_string(),
                evlr_flag: false,
            }
            .write_to(&mut write)?;
            config.extra_bytes_vlr().write_to(&mut write)?;
        }

        Ok(CopcWriter {
            is_closed: false,
            start,
            compressor: CopcCompressor::new(write, laz_vlr)?,
            config,
            pages: PageTree::new(),
            point_record_length,
            point_count: 0,
            uncompressed_points: 0,
            bounds: Bounds::default(),
            points_by_return: [0; 15],
            gpstime_minimum: f64::INFINITY,
            gpstime_maximum: f64::NEG_INFINITY,
        })
    }

    /// Compresses `points` into one chunk stored under `key`.
    ///
    /// `points` are raw little endian point records matching the header's
    /// point format. The header bounds, GPS time range and per-return counts
    /// are accumulated from the records and patched on close.
    ///
    /// `page_key` selects the hierarchy page of the node and defaults to the
    /// root page; the page must contain `key`.
    pub fn add_node(
        &mut self,
        key: VoxelKey,
        points: &[u8],
        page_key: Option<VoxelKey>,
    ) -> crate::Result<()> {
        if self.is_closed {
            return Err(Error::ClosedWriter);
        }
        let page_key = page_key.unwrap_or_else(VoxelKey::root);
        self.pages.check_node(&key, &page_key)?;
        if points.is_empty() {
            return Err(Error::EmptyPointBuffer);
        }
        if points.len() % self.point_record_length as usize != 0 {
            return Err(Error::InvalidPointBufferLength {
                len: points.len(),
                point_record_length: self.point_record_length,
            });
        }

        self.accumulate(points);
        let (chunk_table_entry, chunk_offset) = self.compressor.compress_chunk(points)?;
        self.pages.insert_node(
            key,
            page_key,
            chunk_offset,
            chunk_table_entry.byte_count as i32,
            chunk_table_entry.point_count as i32,
        );
        self.point_count += chunk_table_entry.point_count;
        self.uncompressed_points += chunk_table_entry.point_count;
        Ok(())
    }

    /// Stores an already compressed chunk under `key`, taking `point_count`
    /// verbatim.
    ///
    /// The chunk is not decompressed, so header bounds, GPS time range and
    /// per-return counts are not derived from it; whatever the caller set on
    /// the configuration is kept.
    pub fn add_node_compressed(
        &mut self,
        key: VoxelKey,
        chunk: &[u8],
        point_count: i32,
        page_key: Option<VoxelKey>,
    ) -> crate::Result<()> {
        if self.is_closed {
            return Err(Error::ClosedWriter);
        }
        let page_key = page_key.unwrap_or_else(VoxelKey::root);
        self.pages.check_node(&key, &page_key)?;
        if chunk.is_empty() {
            return Err(Error::EmptyPointBuffer);
        }
        if point_count < 1 {
            return Err(Error::InvalidPointCount(point_count));
        }

        let (chunk_table_entry, chunk_offset) =
            self.compressor.write_chunk(chunk, point_count as u64)?;
        self.pages.insert_node(
            key,
            page_key,
            chunk_offset,
            chunk_table_entry.byte_count as i32,
            point_count,
        );
        self.point_count += point_count as u64;
        Ok(())
    }

    /// Finalizes the stream: writes the chunk table, the hierarchy pages and
    /// patches the header and COPC info. Closing an already closed writer is
    /// a no-op.
    pub fn close(&mut self) -> crate::Result<()> {
        if self.is_closed {
            return Ok(());
        }
        if self.pages.is_empty() {
            return Err(Error::EmptyCopcFile);
        }

        self.compressor.done()?;

        let stream = self.compressor.get_mut();
        let start_of_first_evlr = stream.stream_position()?;
        let root_hier_offset = start_of_first_evlr + EVLR_HEADER_SIZE;
        let (hierarchy, root_hier_size) = self.pages.to_bytes(root_hier_offset)?;
        VlrHeader {
            reserved: 0,
            user_id: "copc".to_string(),
            record_id: 1000,
            data_length: hierarchy.len() as u64,
            description: "EPT Hierarchy".to_string(),
            evlr_flag: true,
        }
        .write_to(stream)?;
        stream.write_all(&hierarchy)?;

        {
            let info = self.config.copc_info_mut();
            info.root_hier_offset = root_hier_offset;
            info.root_hier_size = root_hier_size;
            if self.uncompressed_points > 0 {
                info.gpstime_minimum = self.gpstime_minimum;
                info.gpstime_maximum = self.gpstime_maximum;
            }
        }
        {
            let header = self.config.las_header_mut();
            header.point_count = self.point_count;
            header.start_of_first_evlr = start_of_first_evlr;
            header.number_of_evlrs = 1;
            if self.uncompressed_points > 0 {
                header.min = self.bounds.min;
                header.max = self.bounds.max;
                header.number_of_points_by_return = self.points_by_return;
            }
        }

        let stream = self.compressor.get_mut();
        stream.seek(SeekFrom::Start(self.start))?;
        self.config.las_header().write_to(stream)?;
        stream.seek(SeekFrom::Start(
            self.start + u64::from(HEADER_SIZE) + VLR_HEADER_SIZE,
        ))?;
        self.config.copc_info().write_to(stream)?;
        stream.seek(SeekFrom::Start(self.start))?;

        self.is_closed = true;
        Ok(())
    }

    /// Whether this writer is closed or not
    pub fn is_closed(&self) -> bool {
        self.is_closed
    }

    /// This writer's configuration, patched on close
    pub fn config(&self) -> &CopcConfigWriter {
        &self.config
    }

    /// This writer's header, some fields are updated on closing of the writer
    pub fn las_header(&self) -> &LasHeader {
        self.config.las_header()
    }

    /// This writer's COPC info, offsets are updated on closing of the writer
    pub fn copc_info(&self) -> &CopcInfo {
        self.config.copc_info()
    }

    /// Folds the raw records of an uncompressed chunk into the running
    /// bounds, per-return counts and GPS time range.
    fn accumulate(&mut self, points: &[u8]) {
        let scale = self.config.las_header().scale;
        let offset = self.config.las_header().offset;
        for point in points.chunks_exact(self.point_record_length as usize) {
            let x = f64::from(LittleEndian::read_i32(&point[0..4]));
            let y = f64::from(LittleEndian::read_i32(&point[4..8]));
            let z = f64::from(LittleEndian::read_i32(&point[8..12]));
            self.bounds.expand_xyz(
                x * scale.x + offset.x,
                y * scale.y + offset.y,
                z * scale.z + offset.z,
            );

            let return_number = point[14] & 0x0f;
            if (1..=15).contains(&return_number) {
                self.points_by_return[return_number as usize - 1] += 1;
            }

            let gps_time = LittleEndian::read_f64(&point[22..30]);
            if gps_time < self.gpstime_minimum {
                self.gpstime_minimum = gps_time;
            }
            if gps_time > self.gpstime_maximum {
                self.gpstime_maximum = gps_time;
            }
        }
    }
}

impl<W: Write + Seek> Drop for CopcWriter<'_, W> {
    fn drop(&mut self) {
        if !self.is_closed {
            if let Err(err) = self.close() {
                log::error!("failed to close COPC writer on drop: {err}");
            }
        }
    }
}
