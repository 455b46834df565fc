//! COPC info VLR.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::io::{Read, Write};

/// Serialized size of the COPC info VLR payload.
pub(crate) const COPC_INFO_SIZE: u64 = 160;

/// COPC info VLR data ("copc", record id 1).
///
/// Always the first VLR of a COPC file, directly after the public header.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CopcInfo {
    /// Actual (unscaled) x coordinate of the center of the octree
    pub center_x: f64,
    /// Actual (unscaled) y coordinate of the center of the octree
    pub center_y: f64,
    /// Actual (unscaled) z coordinate of the center of the octree
    pub center_z: f64,
    /// Perpendicular distance from the center to any side of the root node.
    pub halfsize: f64,
    /// Space between points at the root node.
    /// This value is halved at each octree level
    pub spacing: f64,
    /// File offset to the first hierarchy page
    pub root_hier_offset: u64,
    /// Size of the first hierarchy page in bytes
    pub root_hier_size: u64,
    /// Minimum of GPSTime
    pub gpstime_minimum: f64,
    /// Maximum of GPSTime
    pub gpstime_maximum: f64,
    // trailed by [u64; 11] reserved bytes, all zero
}

impl CopcInfo {
    /// Reads COPC info VLR data from a `Read`.
    pub(crate) fn read_from<R: Read>(mut read: R) -> crate::Result<Self> {
        let info = CopcInfo {
            center_x: read.read_f64::<LittleEndian>()?,
            center_y: read.read_f64::<LittleEndian>()?,
            center_z: read.read_f64::<LittleEndian>()?,
            halfsize: read.read_f64::<LittleEndian>()?,
            spacing: read.read_f64::<LittleEndian>()?,
            root_hier_offset: read.read_u64::<LittleEndian>()?,
            root_hier_size: read.read_u64::<LittleEndian>()?,
            gpstime_minimum: read.read_f64::<LittleEndian>()?,
            gpstime_maximum: read.read_f64::<LittleEndian>()?,
        };
        for _ in 0..11 {
            read.read_u64::<LittleEndian>()?;
        }
        Ok(info)
    }

    /// Writes the fixed 160 byte payload to a `Write`.
    pub(crate) fn write_to<W: Write>(&self, write: &mut W) -> crate::Result<()> {
        write.write_f64::<LittleEndian>(self.center_x)?;
        write.write_f64::<LittleEndian>(self.center_y)?;
        write.write_f64::<LittleEndian>(self.center_z)?;
        write.write_f64::<LittleEndian>(self.halfsize)?;
        write.write_f64::<LittleEndian>(self.spacing)?;
        write.write_u64::<LittleEndian>(self.root_hier_offset)?;
        write.write_u64::<LittleEndian>(self.root_hier_size)?;
        write.write_f64::<LittleEndian>(self.gpstime_minimum)?;
        write.write_f64::<LittleEndian>(self.gpstime_maximum)?;
        for _ in 0..11 {
            write.write_u64::<LittleEndian>(0)?;
        }
        Ok(())
    }
}

impl fmt::Display for CopcInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CopcInfo:")?;
        writeln!(f, "\tcenter: ({}, {}, {})", self.center_x, self.center_y, self.center_z)?;
        writeln!(f, "\thalfsize: {}", self.halfsize)?;
        writeln!(f, "\tspacing: {}", self.spacing)?;
        writeln!(f, "\troot_hier_offset: {}", self.root_hier_offset)?;
        writeln!(f, "\troot_hier_size: {}", self.root_hier_size)?;
        writeln!(f, "\tgpstime_minimum: {}", self.gpstime_minimum)?;
        write!(f, "\tgpstime_maximum: {}", self.gpstime_maximum)
    }
}
