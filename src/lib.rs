//! Library for reading and writing Cloud Optimized Point Cloud
//! ([COPC](https://copc.io/)) data.
//!
//! A COPC file is a LAS 1.4 / LAZ file whose compressed point chunks are
//! organized in an octree and indexed by hierarchy pages, so spatial subsets
//! can be located and decoded without scanning the whole file.
//!
//! Usage example:
//! ```
//! use copc::{CopcConfigWriter, CopcReader, CopcWriter, VoxelKey};
//! use std::io::Cursor;
//!
//! fn main() -> copc::Result<()> {
//!     let config = CopcConfigWriter::new(6)?;
//!     let point_record_length = config.las_header().point_record_length as usize;
//!     let points = vec![0_u8; 20 * point_record_length];
//!
//!     let mut stream = Cursor::new(Vec::new());
//!     let mut writer = CopcWriter::new(&mut stream, config)?;
//!     writer.add_node(VoxelKey::root(), &points, None)?;
//!     writer.close()?;
//!     drop(writer);
//!
//!     let mut reader = CopcReader::open(stream)?;
//!     let node = reader.find_node(VoxelKey::root())?;
//!     assert!(node.is_valid());
//!     assert_eq!(reader.get_point_data(&node)?, points);
//!     Ok(())
//! }
//! ```

mod compressor;
mod config;
mod copc;
mod decompressor;
mod error;
mod geometry;
mod header;
mod hierarchy;
mod reader;
mod vlr;
mod writer;

pub use config::{CopcConfig, CopcConfigWriter, LazConfig, LazConfigWriter};
pub use copc::CopcInfo;
pub use error::{Error, Result};
pub use geometry::{Bounds, Vector3, VoxelKey};
pub use header::{point_base_byte_size, LasHeader};
pub use hierarchy::{Entry, Node, ENTRY_SIZE};
pub use reader::CopcReader;
pub use vlr::{EbField, EbVlr, VlrHeader, EVLR_HEADER_SIZE, VLR_HEADER_SIZE};
pub use writer::CopcWriter;

/// Version of this crate, stamped into the generating software field of
/// written headers.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
