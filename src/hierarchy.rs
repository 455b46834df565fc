//! COPC hierarchy entries and pages.

use crate::geometry::VoxelKey;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::collections::{HashMap, HashSet};
use std::io::{Read, Write};

/// Serialized size of one hierarchy entry.
pub const ENTRY_SIZE: u64 = 32;

/// Hierarchy entry
///
/// An entry corresponds to a single key/value pair in an EPT hierarchy, but
/// contains additional information to allow direct access and decoding of the
/// corresponding point data.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Entry {
    /// EPT key of the data to which this entry corresponds
    pub key: VoxelKey,

    /// Absolute offset to the data chunk if the point_count > 0.
    /// Absolute offset to a child hierarchy page if the point_count is -1.
    /// 0 if the point_count is 0.
    pub offset: u64,

    /// Size of the data chunk in bytes (compressed size) if the point_count > 0.
    /// Size of the hierarchy page if the point_count is -1.
    /// 0 if the point_count is 0.
    pub byte_size: i32,

    /// If > 0, represents the number of points in the data chunk.
    /// If -1, indicates the information for this octree node is found in another hierarchy page.
    /// If 0, no point data exists for this key, though may exist for child entries.
    pub point_count: i32,
}

impl Entry {
    /// Reads a hierarchy entry from a `Read`.
    pub(crate) fn read_from<R: Read>(read: &mut R) -> crate::Result<Self> {
        Ok(Entry {
            key: VoxelKey::read_from(read)?,
            offset: read.read_u64::<LittleEndian>()?,
            byte_size: read.read_i32::<LittleEndian>()?,
            point_count: read.read_i32::<LittleEndian>()?,
        })
    }

    /// Writes a hierarchy entry to a `Write`.
    pub(crate) fn write_to<W: Write>(&self, write: &mut W) -> crate::Result<()> {
        self.key.write_to(write)?;
        write.write_u64::<LittleEndian>(self.offset)?;
        write.write_i32::<LittleEndian>(self.byte_size)?;
        write.write_i32::<LittleEndian>(self.point_count)?;
        Ok(())
    }

    pub(crate) fn is_page_pointer(&self) -> bool {
        self.point_count == -1
    }
}

/// A leaf entry resolved in the hierarchy: one compressed point chunk at a
/// given [VoxelKey].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Node {
    pub key: VoxelKey,
    /// Absolute offset of the compressed chunk
    pub offset: u64,
    /// Compressed size of the chunk in bytes
    pub byte_size: i32,
    /// Number of points stored in the chunk
    pub point_count: i32,
}

impl Node {
    /// A lookup that found nothing yields an invalid node.
    pub fn is_valid(&self) -> bool {
        self.key.is_valid() && self.point_count >= 0
    }

    pub(crate) fn from_entry(entry: &Entry) -> Self {
        Node {
            key: entry.key,
            offset: entry.offset,
            byte_size: entry.byte_size,
            point_count: entry.point_count,
        }
    }
}

/// One hierarchy page cached by the reader.
#[derive(Clone, Debug)]
pub(crate) struct Page {
    pub key: VoxelKey,
    pub byte_offset: u64,
    pub byte_size: u64,
    pub loaded: bool,
    pub entries: Vec<Entry>,
}

impl Page {
    pub(crate) fn pending(key: VoxelKey, byte_offset: u64, byte_size: u64) -> Self {
        Page {
            key,
            byte_offset,
            byte_size,
            loaded: false,
            entries: Vec::new(),
        }
    }

    /// Reads `byte_size` bytes worth of entries from a `Read`.
    pub(crate) fn read_entries<R: Read>(read: &mut R, byte_size: u64) -> crate::Result<Vec<Entry>> {
        if byte_size % ENTRY_SIZE != 0 {
            return Err(crate::Error::InvalidPageSize(byte_size));
        }
        let num_entries = (byte_size / ENTRY_SIZE) as usize;
        let mut entries = Vec::with_capacity(num_entries);
        for _ in 0..num_entries {
            entries.push(Entry::read_from(read)?);
        }
        Ok(entries)
    }
}

struct PageNode {
    key: VoxelKey,
    entries: Vec<Entry>,
    children: Vec<usize>,
}

/// The page tree a writer builds while nodes are added.
///
/// Pages live in an arena and reference their children by index; the parent
/// of a new sub-page is the deepest existing page whose key contains it.
pub(crate) struct PageTree {
    pages: Vec<PageNode>,
    index: HashMap<VoxelKey, usize>,
    node_keys: HashSet<VoxelKey>,
}

impl PageTree {
    pub(crate) fn new() -> Self {
        let root = PageNode {
            key: VoxelKey::root(),
            entries: Vec::new(),
            children: Vec::new(),
        };
        PageTree {
            pages: vec![root],
            index: HashMap::from([(VoxelKey::root(), 0)]),
            node_keys: HashSet::new(),
        }
    }

    /// Validates a prospective node without touching the tree, so a rejected
    /// add leaves the writer untouched.
    pub(crate) fn check_node(&self, key: &VoxelKey, page_key: &VoxelKey) -> crate::Result<()> {
        if !key.is_valid() {
            return Err(crate::Error::InvalidKey(*key));
        }
        if !page_key.is_valid() {
            return Err(crate::Error::InvalidKey(*page_key));
        }
        if !page_key.contains(key) {
            return Err(crate::Error::NodeOutsidePage {
                page: *page_key,
                key: *key,
            });
        }
        if self.node_keys.contains(key) {
            return Err(crate::Error::DuplicateNode(*key));
        }
        Ok(())
    }

    /// Records a written chunk under `page_key`, creating the page on first
    /// use. Callers must have passed [check_node] first.
    ///
    /// [check_node]: Self::check_node
    pub(crate) fn insert_node(
        &mut self,
        key: VoxelKey,
        page_key: VoxelKey,
        offset: u64,
        byte_size: i32,
        point_count: i32,
    ) {
        let page = self.get_or_create(page_key);
        self.node_keys.insert(key);
        self.pages[page].entries.push(Entry {
            key,
            offset,
            byte_size,
            point_count,
        });
    }

    fn get_or_create(&mut self, page_key: VoxelKey) -> usize {
        if let Some(&index) = self.index.get(&page_key) {
            return index;
        }
        let parent = self
            .pages
            .iter()
            .enumerate()
            .filter(|(_, page)| page.key.contains(&page_key))
            .max_by_key(|(_, page)| page.key.level)
            .map(|(index, _)| index)
            .unwrap_or(0);
        let index = self.pages.len();
        self.pages.push(PageNode {
            key: page_key,
            entries: Vec::new(),
            children: Vec::new(),
        });
        self.index.insert(page_key, index);
        self.pages[parent].children.push(index);
        index
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.node_keys.is_empty()
    }

    fn byte_size_of(&self, index: usize) -> u64 {
        let page = &self.pages[index];
        (page.entries.len() + page.children.len()) as u64 * ENTRY_SIZE
    }

    /// Depth-first order over the arena, root first, siblings in creation
    /// order.
    fn depth_first_order(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.pages.len());
        let mut stack = vec![0];
        while let Some(index) = stack.pop() {
            order.push(index);
            stack.extend(self.pages[index].children.iter().rev());
        }
        order
    }

    /// Serializes every page with the first byte of the root page landing at
    /// `root_offset`. Page pointer entries carry the absolute offset and size
    /// of the child page. Returns the blob and the root page size.
    pub(crate) fn to_bytes(&self, root_offset: u64) -> crate::Result<(Vec<u8>, u64)> {
        let order = self.depth_first_order();
        let mut offsets = vec![0u64; self.pages.len()];
        let mut running = root_offset;
        for &index in &order {
            offsets[index] = running;
            running += self.byte_size_of(index);
        }

        let mut buffer = Vec::with_capacity((running - root_offset) as usize);
        for &index in &order {
            let page = &self.pages[index];
            for entry in &page.entries {
                entry.write_to(&mut buffer)?;
            }
            for &child in &page.children {
                Entry {
                    key: self.pages[child].key,
                    offset: offsets[child],
                    byte_size: self.byte_size_of(child) as i32,
                    point_count: -1,
                }
                .write_to(&mut buffer)?;
            }
        }
        Ok((buffer, self.byte_size_of(0)))
    }
}
