//! COPC file reader.

use crate::config::CopcConfig;
use crate::copc::CopcInfo;
use crate::decompressor::decompress_chunk;
use crate::error::Error;
use crate::geometry::VoxelKey;
use crate::header::LasHeader;
use crate::hierarchy::{Node, Page};
use crate::vlr::{EbVlr, VlrHeader};
use laz::laszip::LazVlr;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

/// COPC file reader
///
/// The hierarchy is traversed lazily: the root page is loaded on open, sub
/// pages on the first lookup that walks through them. Loaded pages are
/// cached for the lifetime of the reader.
pub struct CopcReader<R> {
    src: R,
    config: CopcConfig,
    laszip_vlr: LazVlr,
    /// Hierarchy pages by their root key, loaded or still pending
    pages: HashMap<VoxelKey, Page>,
}

impl CopcReader<BufReader<File>> {
    /// Opens the file at `path` wrapped in a `BufReader`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        File::open(path)
            .map_err(Error::from)
            .and_then(|file| CopcReader::open(BufReader::new(file)))
    }
}

impl<R: Read + Seek> CopcReader<R> {
    /// Setup by reading the LAS header and the COPC, LasZip and projection
    /// VLRs, then loading the root hierarchy page.
    pub fn open(mut src: R) -> crate::Result<Self> {
        let las_header = LasHeader::read_from(&mut src)?;
        if !(6..=10).contains(&las_header.point_format_id) {
            return Err(Error::UnsupportedPointFormat(las_header.point_format_id));
        }

        // copc requires its info vlr directly after the header
        let copc_vlr = VlrHeader::read_from(&mut src, false)?;
        if copc_vlr.user_id != "copc" || copc_vlr.record_id != 1 {
            return Err(Error::CopcInfoVlrNotFound);
        }
        let mut payload = vec![0u8; copc_vlr.data_length as usize];
        src.read_exact(&mut payload)?;
        let copc_info = CopcInfo::read_from(Cursor::new(payload))?;

        let mut laszip_vlr = None;
        let mut wkt = String::new();
        let mut eb_vlr = EbVlr::default();
        for _ in 1..las_header.number_of_variable_length_records {
            let vlr = VlrHeader::read_from(&mut src, false)?;
            let mut data = vec![0u8; vlr.data_length as usize];
            src.read_exact(&mut data)?;
            match (vlr.user_id.as_str(), vlr.record_id) {
                ("laszip encoded", 22204) => laszip_vlr = Some(LazVlr::read_from(data.as_slice())?),
                ("LASF_Projection", 2112) => {
                    wkt = String::from_utf8_lossy(&data)
                        .trim_end_matches(|c| c as u8 == 0)
                        .to_string()
                }
                ("LASF_Spec", 4) => {
                    eb_vlr = EbVlr::read_from(&mut Cursor::new(&data), data.len() as u64)?
                }
                (user_id, record_id) => {
                    log::debug!("ignoring VLR {user_id}/{record_id}")
                }
            }
        }

        let laszip_vlr = laszip_vlr.ok_or(Error::LasZipVlrNotFound)?;
        if laszip_vlr.items_size() != u64::from(las_header.point_record_length) {
            return Err(Error::PointRecordLengthMismatch {
                header: las_header.point_record_length,
                laz: laszip_vlr.items_size(),
            });
        }

        let config = CopcConfig::new(las_header, copc_info, wkt, eb_vlr);
        if config.copc_info().root_hier_size == 0 {
            return Err(Error::EmptyRootPage);
        }

        let mut reader = CopcReader {
            src,
            config,
            laszip_vlr,
            pages: HashMap::new(),
        };
        let root_page = Page::pending(
            VoxelKey::root(),
            reader.config.copc_info().root_hier_offset,
            reader.config.copc_info().root_hier_size,
        );
        reader.pages.insert(VoxelKey::root(), root_page);
        reader.load_page(VoxelKey::root())?;
        Ok(reader)
    }

    /// This file's configuration
    pub fn copc_config(&self) -> &CopcConfig {
        &self.config
    }

    /// LAS header
    pub fn las_header(&self) -> &LasHeader {
        self.config.las_header()
    }

    /// COPC info VLR content
    pub fn copc_info(&self) -> &CopcInfo {
        self.config.copc_info()
    }

    /// Looks up the node for `key`, loading any sub pages on the way.
    ///
    /// An absent key yields an invalid [Node], not an error.
    pub fn find_node(&mut self, key: VoxelKey) -> crate::Result<Node> {
        if !key.is_valid() {
            return Ok(Node::default());
        }
        let mut page_key = VoxelKey::root();
        loop {
            if !self.pages[&page_key].loaded {
                self.load_page(page_key)?;
            }
            let page = &self.pages[&page_key];
            let mut sub_page = None;
            for entry in &page.entries {
                if entry.is_page_pointer() {
                    if entry.key.contains(&key) {
                        sub_page = Some(entry.key);
                    }
                } else if entry.key == key {
                    return Ok(Node::from_entry(entry));
                }
            }
            match sub_page {
                Some(next) if next != page_key => page_key = next,
                _ => return Ok(Node::default()),
            }
        }
    }

    /// Reads and decompresses the point data of `node`.
    ///
    /// The returned buffer holds `point_count` raw little endian point
    /// records of the header's point format.
    pub fn get_point_data(&mut self, node: &Node) -> crate::Result<Vec<u8>> {
        if !node.is_valid() {
            return Err(Error::InvalidNode);
        }
        self.src.seek(SeekFrom::Start(node.offset))?;
        let mut chunk = vec![0u8; node.byte_size as usize];
        self.src.read_exact(&mut chunk)?;
        decompress_chunk(&chunk, node.point_count as u64, &self.laszip_vlr)
    }

    /// Reads the entries of a pending page and registers any sub pages they
    /// point at for lazy loading.
    fn load_page(&mut self, key: VoxelKey) -> crate::Result<()> {
        let (offset, byte_size) = {
            let page = &self.pages[&key];
            (page.byte_offset, page.byte_size)
        };
        self.src.seek(SeekFrom::Start(offset))?;
        let entries = Page::read_entries(&mut self.src, byte_size)?;
        if key == VoxelKey::root() && entries.is_empty() {
            return Err(Error::EmptyRootPage);
        }

        for entry in &entries {
            if entry.is_page_pointer() {
                self.pages.entry(entry.key).or_insert_with(|| {
                    Page::pending(entry.key, entry.offset, entry.byte_size as u64)
                });
            }
        }
        let page = self.pages.get_mut(&key).expect("page was registered");
        debug_assert_eq!(page.key, key);
        page.entries = entries;
        page.loaded = true;
        Ok(())
    }
}
