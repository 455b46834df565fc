//! Geometry primitives: coordinate vectors and octree voxel keys.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::io::{Read, Write};

/// Triple of f64 coordinates, compared componentwise.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Vector3 { x, y, z }
    }

    /// Coordinate scale used for headers that don't specify one.
    pub fn default_scale() -> Self {
        Vector3::new(0.01, 0.01, 0.01)
    }

    pub fn default_offset() -> Self {
        Vector3::default()
    }
}

impl fmt::Display for Vector3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// 3D bounding box
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: Vector3,
    pub max: Vector3,
}

impl Default for Bounds {
    fn default() -> Self {
        Bounds {
            min: Vector3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Vector3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }
}

impl Bounds {
    #[inline]
    pub fn expand_xyz(&mut self, x: f64, y: f64, z: f64) {
        if x < self.min.x {
            self.min.x = x;
        }
        if y < self.min.y {
            self.min.y = y;
        }
        if z < self.min.z {
            self.min.z = z;
        }
        if x > self.max.x {
            self.max.x = x;
        }
        if y > self.max.y {
            self.max.y = y;
        }
        if z > self.max.z {
            self.max.z = z;
        }
    }

    /// True until the first `expand_xyz` call.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x
    }
}

/// EPT hierarchy key
///
/// `level` is the octree depth, `x`, `y` and `z` the cell indices within
/// that level. A `level` < 0 indicates an invalid VoxelKey.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct VoxelKey {
    /// Level
    pub level: i32,
    /// x
    pub x: i32,
    /// y
    pub y: i32,
    /// z
    pub z: i32,
}

impl Default for VoxelKey {
    fn default() -> Self {
        VoxelKey::invalid()
    }
}

impl fmt::Display for VoxelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}-{}", self.level, self.x, self.y, self.z)
    }
}

fn coord_in_range(coord: i32, level: i32) -> bool {
    coord >= 0 && (level >= 31 || coord < (1 << level))
}

impl VoxelKey {
    pub fn new(level: i32, x: i32, y: i32, z: i32) -> Self {
        VoxelKey { level, x, y, z }
    }

    /// Key of the octree root cell.
    pub fn root() -> Self {
        VoxelKey::new(0, 0, 0, 0)
    }

    pub fn invalid() -> Self {
        VoxelKey::new(-1, 0, 0, 0)
    }

    /// A key is valid when its level is non-negative and every cell index
    /// lies within `[0, 2^level)`.
    pub fn is_valid(&self) -> bool {
        self.level >= 0
            && coord_in_range(self.x, self.level)
            && coord_in_range(self.y, self.level)
            && coord_in_range(self.z, self.level)
    }

    /// The containing key one level up. The parent of the root is invalid.
    pub fn parent(&self) -> VoxelKey {
        if self.level <= 0 {
            VoxelKey::invalid()
        } else {
            VoxelKey::new(self.level - 1, self.x >> 1, self.y >> 1, self.z >> 1)
        }
    }

    /// One of the eight children of this cell, selected by the three
    /// low bits of `dir`.
    pub fn child(&self, dir: i32) -> VoxelKey {
        VoxelKey {
            level: self.level + 1,
            x: (self.x << 1) | (dir & 0x1),
            y: (self.y << 1) | ((dir >> 1) & 0x1),
            z: (self.z << 1) | ((dir >> 2) & 0x1),
        }
    }

    /// Which child of its parent this key is.
    pub fn child_index(&self) -> i32 {
        (self.x & 0x1) | ((self.y & 0x1) << 1) | ((self.z & 0x1) << 2)
    }

    /// Whether `other` is this key or one of its descendants.
    pub fn contains(&self, other: &VoxelKey) -> bool {
        if !self.is_valid() || !other.is_valid() || other.level < self.level {
            return false;
        }
        let shift = other.level - self.level;
        if shift >= 31 {
            // valid coordinates fit in 31 bits, every ancestor that far up is at the origin
            return self.x == 0 && self.y == 0 && self.z == 0;
        }
        (other.x >> shift) == self.x && (other.y >> shift) == self.y && (other.z >> shift) == self.z
    }

    /// Strict ancestry, excluding the key itself.
    pub fn is_ancestor_of(&self, other: &VoxelKey) -> bool {
        other.level > self.level && self.contains(other)
    }

    /// Reads VoxelKey from a `Read`.
    pub(crate) fn read_from<R: Read>(read: &mut R) -> crate::Result<Self> {
        Ok(VoxelKey {
            level: read.read_i32::<LittleEndian>()?,
            x: read.read_i32::<LittleEndian>()?,
            y: read.read_i32::<LittleEndian>()?,
            z: read.read_i32::<LittleEndian>()?,
        })
    }

    /// Writes VoxelKey to a `Write`.
    pub(crate) fn write_to<W: Write>(&self, write: &mut W) -> crate::Result<()> {
        write.write_i32::<LittleEndian>(self.level)?;
        write.write_i32::<LittleEndian>(self.x)?;
        write.write_i32::<LittleEndian>(self.y)?;
        write.write_i32::<LittleEndian>(self.z)?;
        Ok(())
    }
}
