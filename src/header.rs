//! LAS 1.4 public header block.

use crate::geometry::Vector3;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Byte size of the LAS 1.4 public header block.
pub(crate) const HEADER_SIZE: u16 = 375;

/// Bits set on the point format byte of LAZ containers.
const COMPRESSION_BITS: u8 = 0b1100_0000;

/// Base record size of the COPC point formats.
pub fn point_base_byte_size(point_format_id: u8) -> Option<u16> {
    match point_format_id {
        6 => Some(30),
        7 => Some(36),
        8 => Some(38),
        9 => Some(59),
        10 => Some(67),
        _ => None,
    }
}

fn read_trimmed_string(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches(|c| c as u8 == 0)
        .to_string()
}

fn write_padded_string<W: Write>(write: &mut W, s: &str, len: usize) -> crate::Result<()> {
    let mut buffer = vec![0u8; len];
    for (dst, src) in buffer.iter_mut().zip(s.bytes()) {
        *dst = src;
    }
    write.write_all(&buffer)?;
    Ok(())
}

/// In-memory mirror of the LAS 1.4 public header fields relevant to COPC.
///
/// `offset_to_point_data`, `point_count`, `min`/`max` and
/// `number_of_points_by_return` are not authoritative on the write side
/// until [CopcWriter::close] patches them.
///
/// [CopcWriter::close]: crate::CopcWriter::close
#[derive(Clone, Debug, PartialEq)]
pub struct LasHeader {
    pub file_source_id: u16,
    pub global_encoding: u16,
    pub guid: [u8; 16],
    pub system_identifier: String,
    pub generating_software: String,
    pub file_creation_day_of_year: u16,
    pub file_creation_year: u16,
    pub offset_to_point_data: u32,
    pub number_of_variable_length_records: u32,
    /// Point format id with the compression bits masked off
    pub point_format_id: u8,
    pub point_record_length: u16,
    pub scale: Vector3,
    pub offset: Vector3,
    pub min: Vector3,
    pub max: Vector3,
    pub start_of_waveform_data: u64,
    pub start_of_first_evlr: u64,
    pub number_of_evlrs: u32,
    pub point_count: u64,
    pub number_of_points_by_return: [u64; 15],
    /// Marks headers that belong to a COPC container. Not serialized, the
    /// marker on disk is the COPC info VLR.
    pub is_copc: bool,
}

impl Default for LasHeader {
    fn default() -> Self {
        LasHeader {
            file_source_id: 0,
            global_encoding: 0,
            guid: [0; 16],
            system_identifier: String::new(),
            generating_software: String::new(),
            file_creation_day_of_year: 0,
            file_creation_year: 0,
            offset_to_point_data: 0,
            number_of_variable_length_records: 0,
            point_format_id: 6,
            point_record_length: 30,
            scale: Vector3::default_scale(),
            offset: Vector3::default_offset(),
            min: Vector3::default(),
            max: Vector3::default(),
            start_of_waveform_data: 0,
            start_of_first_evlr: 0,
            number_of_evlrs: 0,
            point_count: 0,
            number_of_points_by_return: [0; 15],
            is_copc: false,
        }
    }
}

impl LasHeader {
    pub fn new(
        point_format_id: u8,
        point_record_length: u16,
        scale: Vector3,
        offset: Vector3,
    ) -> Self {
        LasHeader {
            point_format_id,
            point_record_length,
            scale,
            offset,
            ..Default::default()
        }
    }

    /// Reads a LAS 1.4 public header block from a `Read`.
    pub(crate) fn read_from<R: Read>(src: &mut R) -> crate::Result<Self> {
        let mut signature = [0u8; 4];
        src.read_exact(&mut signature)?;
        if &signature != b"LASF" {
            return Err(crate::Error::InvalidFileSignature(signature));
        }
        let file_source_id = src.read_u16::<LittleEndian>()?;
        let global_encoding = src.read_u16::<LittleEndian>()?;
        let mut guid = [0u8; 16];
        src.read_exact(&mut guid)?;
        let version_major = src.read_u8()?;
        let version_minor = src.read_u8()?;
        if (version_major, version_minor) != (1, 4) {
            return Err(crate::Error::UnsupportedVersion {
                major: version_major,
                minor: version_minor,
            });
        }
        let mut system_identifier = [0u8; 32];
        src.read_exact(&mut system_identifier)?;
        let mut generating_software = [0u8; 32];
        src.read_exact(&mut generating_software)?;
        let file_creation_day_of_year = src.read_u16::<LittleEndian>()?;
        let file_creation_year = src.read_u16::<LittleEndian>()?;
        let header_size = src.read_u16::<LittleEndian>()?;
        let offset_to_point_data = src.read_u32::<LittleEndian>()?;
        let number_of_variable_length_records = src.read_u32::<LittleEndian>()?;
        let point_format_id = src.read_u8()? & !COMPRESSION_BITS;
        let point_record_length = src.read_u16::<LittleEndian>()?;
        // legacy point counts, superseded by the 64 bit fields below
        src.read_u32::<LittleEndian>()?;
        for _ in 0..5 {
            src.read_u32::<LittleEndian>()?;
        }
        let scale = Vector3::new(
            src.read_f64::<LittleEndian>()?,
            src.read_f64::<LittleEndian>()?,
            src.read_f64::<LittleEndian>()?,
        );
        let offset = Vector3::new(
            src.read_f64::<LittleEndian>()?,
            src.read_f64::<LittleEndian>()?,
            src.read_f64::<LittleEndian>()?,
        );
        let mut min = Vector3::default();
        let mut max = Vector3::default();
        max.x = src.read_f64::<LittleEndian>()?;
        min.x = src.read_f64::<LittleEndian>()?;
        max.y = src.read_f64::<LittleEndian>()?;
        min.y = src.read_f64::<LittleEndian>()?;
        max.z = src.read_f64::<LittleEndian>()?;
        min.z = src.read_f64::<LittleEndian>()?;
        let start_of_waveform_data = src.read_u64::<LittleEndian>()?;
        let start_of_first_evlr = src.read_u64::<LittleEndian>()?;
        let number_of_evlrs = src.read_u32::<LittleEndian>()?;
        let point_count = src.read_u64::<LittleEndian>()?;
        let mut number_of_points_by_return = [0u64; 15];
        for count in number_of_points_by_return.iter_mut() {
            *count = src.read_u64::<LittleEndian>()?;
        }
        // tolerate headers padded beyond the 1.4 block
        for _ in HEADER_SIZE..header_size {
            src.read_u8()?;
        }

        Ok(LasHeader {
            file_source_id,
            global_encoding,
            guid,
            system_identifier: read_trimmed_string(&system_identifier),
            generating_software: read_trimmed_string(&generating_software),
            file_creation_day_of_year,
            file_creation_year,
            offset_to_point_data,
            number_of_variable_length_records,
            point_format_id,
            point_record_length,
            scale,
            offset,
            min,
            max,
            start_of_waveform_data,
            start_of_first_evlr,
            number_of_evlrs,
            point_count,
            number_of_points_by_return,
            is_copc: false,
        })
    }

    /// Writes the fixed 375 byte public header block to a `Write`.
    pub(crate) fn write_to<W: Write>(&self, dst: &mut W) -> crate::Result<()> {
        dst.write_all(b"LASF")?;
        dst.write_u16::<LittleEndian>(self.file_source_id)?;
        dst.write_u16::<LittleEndian>(self.global_encoding)?;
        dst.write_all(&self.guid)?;
        dst.write_u8(1)?;
        dst.write_u8(4)?;
        write_padded_string(dst, &self.system_identifier, 32)?;
        write_padded_string(dst, &self.generating_software, 32)?;
        dst.write_u16::<LittleEndian>(self.file_creation_day_of_year)?;
        dst.write_u16::<LittleEndian>(self.file_creation_year)?;
        dst.write_u16::<LittleEndian>(HEADER_SIZE)?;
        dst.write_u32::<LittleEndian>(self.offset_to_point_data)?;
        dst.write_u32::<LittleEndian>(self.number_of_variable_length_records)?;
        let format_byte = if self.is_copc {
            self.point_format_id | COMPRESSION_BITS
        } else {
            self.point_format_id
        };
        dst.write_u8(format_byte)?;
        dst.write_u16::<LittleEndian>(self.point_record_length)?;
        // legacy counts must be zero for the 1.4 only point formats
        dst.write_u32::<LittleEndian>(0)?;
        for _ in 0..5 {
            dst.write_u32::<LittleEndian>(0)?;
        }
        dst.write_f64::<LittleEndian>(self.scale.x)?;
        dst.write_f64::<LittleEndian>(self.scale.y)?;
        dst.write_f64::<LittleEndian>(self.scale.z)?;
        dst.write_f64::<LittleEndian>(self.offset.x)?;
        dst.write_f64::<LittleEndian>(self.offset.y)?;
        dst.write_f64::<LittleEndian>(self.offset.z)?;
        dst.write_f64::<LittleEndian>(self.max.x)?;
        dst.write_f64::<LittleEndian>(self.min.x)?;
        dst.write_f64::<LittleEndian>(self.max.y)?;
        dst.write_f64::<LittleEndian>(self.min.y)?;
        dst.write_f64::<LittleEndian>(self.max.z)?;
        dst.write_f64::<LittleEndian>(self.min.z)?;
        dst.write_u64::<LittleEndian>(self.start_of_waveform_data)?;
        dst.write_u64::<LittleEndian>(self.start_of_first_evlr)?;
        dst.write_u32::<LittleEndian>(self.number_of_evlrs)?;
        dst.write_u64::<LittleEndian>(self.point_count)?;
        for count in &self.number_of_points_by_return {
            dst.write_u64::<LittleEndian>(*count)?;
        }
        Ok(())
    }
}
