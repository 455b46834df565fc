use crate::geometry::VoxelKey;
use thiserror::Error;

/// crate specific Result type
pub type Result<T> = std::result::Result<T, Error>;

/// crate specific Error enum
#[derive(Error, Debug)]
pub enum Error {
    /// When trying to add nodes to a writer that has already been closed
    #[error("this writer has already been closed")]
    ClosedWriter,

    /// When trying to close a writer without any nodes
    #[error("there are no points added to this file")]
    EmptyCopcFile,

    /// An operation was handed an invalid voxel key
    #[error("invalid voxel key {0}")]
    InvalidKey(VoxelKey),

    /// A node with the same key has already been written
    #[error("a node with key {0} has already been added")]
    DuplicateNode(VoxelKey),

    /// The node key is not contained by the declared hierarchy page
    #[error("page {page} does not contain node key {key}")]
    NodeOutsidePage { page: VoxelKey, key: VoxelKey },

    /// Point data was added with an empty buffer
    #[error("cannot add an empty point buffer")]
    EmptyPointBuffer,

    /// The point buffer is not a whole number of point records
    #[error("point buffer of {len} bytes is not a multiple of the point record length {point_record_length}")]
    InvalidPointBufferLength {
        len: usize,
        point_record_length: u16,
    },

    /// A compressed chunk was declared with a non-positive point count
    #[error("invalid point count {0} for a pre-compressed chunk")]
    InvalidPointCount(i32),

    /// Reading point data for a node that was not found in the hierarchy
    #[error("cannot read point data for an invalid node")]
    InvalidNode,

    /// The point format is not one COPC stores
    #[error("point format {0} is not a COPC point format")]
    UnsupportedPointFormat(u8),

    /// The source does not start with the LAS magic bytes
    #[error("invalid file signature {0:?}, expected \"LASF\"")]
    InvalidFileSignature([u8; 4]),

    /// COPC files are always LAS 1.4
    #[error("unsupported LAS version {major}.{minor}, COPC requires 1.4")]
    UnsupportedVersion { major: u8, minor: u8 },

    /// The Copc info vlr was not found, the octree can not be located
    #[error("the source does not carry a COPC info VLR as its first VLR")]
    CopcInfoVlrNotFound,

    /// The laszip vlr was not found, the points cannot be decompressed
    #[error("laszip vlr not found")]
    LasZipVlrNotFound,

    /// The laszip record schema disagrees with the header
    #[error("laszip vlr describes {laz} byte records, the header {header}")]
    PointRecordLengthMismatch { header: u16, laz: u64 },

    /// The root hierarchy page has no entries
    #[error("the root hierarchy page is empty")]
    EmptyRootPage,

    /// Hierarchy pages are a whole number of 32 byte entries
    #[error("hierarchy page size {0} is not a multiple of 32")]
    InvalidPageSize(u64),

    /// An extra bytes field was declared with an unknown data type
    #[error("extra bytes data type {0} is out of range")]
    InvalidExtraByteDataType(u8),

    /// No extra bytes field with the given name
    #[error("no extra bytes field named {0:?}")]
    FieldNotFound(String),

    /// The output file-path does not end in .copc.laz
    #[error("the extension of the file to write does not match .copc.laz")]
    WrongCopcExtension,

    /// [laz::LasZipError]
    #[error(transparent)]
    Laz(#[from] laz::LasZipError),

    /// [std::io::Error]
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
