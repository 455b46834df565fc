//! LAS variable length records.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Byte size of a short VLR header.
pub const VLR_HEADER_SIZE: u64 = 54;
/// Byte size of an extended VLR header.
pub const EVLR_HEADER_SIZE: u64 = 60;

/// Serialized size of one extra bytes field descriptor.
const EB_FIELD_SIZE: u64 = 192;

/// Per-record byte length of each extra bytes data type, indexed by
/// `data_type`. Type 0 is an undocumented blob whose length lives in
/// `options`.
const EXTRA_BYTE_DATA_TYPE_LENGTHS: [u8; 31] = [
    0, 1, 1, 2, 2, 4, 4, 8, 8, 4, 8, 2, 2, 4, 4, 8, 8, 16, 16, 8, 16, 3, 3, 6, 6, 12, 12, 24, 24,
    12, 24,
];

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

/// Header shared by VLRs and EVLRs.
///
/// The two record kinds differ only in the width of the data length field;
/// `evlr_flag` selects which byte layout applies on serialization.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VlrHeader {
    pub reserved: u16,
    pub user_id: String,
    pub record_id: u16,
    pub data_length: u64,
    pub description: String,
    pub evlr_flag: bool,
}

impl VlrHeader {
    pub(crate) fn read_from<R: Read>(src: &mut R, evlr: bool) -> crate::Result<Self> {
        let reserved = src.read_u16::<LittleEndian>()?;
        let mut user_id = [0u8; 16];
        src.read_exact(&mut user_id)?;
        let record_id = src.read_u16::<LittleEndian>()?;
        let data_length = if evlr {
            src.read_u64::<LittleEndian>()?
        } else {
            u64::from(src.read_u16::<LittleEndian>()?)
        };
        let mut description = [0u8; 32];
        src.read_exact(&mut description)?;

        Ok(VlrHeader {
            reserved,
            user_id: read_trimmed_string(&user_id),
            record_id,
            data_length,
            description: read_trimmed_string(&description),
            evlr_flag: evlr,
        })
    }

    pub(crate) fn write_to<W: Write>(&self, dst: &mut W) -> crate::Result<()> {
        dst.write_u16::<LittleEndian>(self.reserved)?;
        write_padded_string(dst, &self.user_id, 16)?;
        dst.write_u16::<LittleEndian>(self.record_id)?;
        if self.evlr_flag {
            dst.write_u64::<LittleEndian>(self.data_length)?;
        } else {
            dst.write_u16::<LittleEndian>(self.data_length as u16)?;
        }
        write_padded_string(dst, &self.description, 32)?;
        Ok(())
    }
}

/// One extra bytes field descriptor, LAS 1.4 layout.
#[derive(Clone, Debug, Default)]
pub struct EbField {
    pub reserved: [u8; 2],
    pub data_type: u8,
    pub options: u8,
    pub name: String,
    pub unused: [u8; 4],
    pub no_data: [f64; 3],
    pub min: [f64; 3],
    pub max: [f64; 3],
    pub scale: [f64; 3],
    pub offset: [f64; 3],
    pub description: String,
}

// Strict equality: the f64 triples are compared on their bit patterns so two
// descriptors are equal exactly when their serialized forms are.
impl PartialEq for EbField {
    fn eq(&self, other: &Self) -> bool {
        fn bits(a: &[f64; 3]) -> [u64; 3] {
            [a[0].to_bits(), a[1].to_bits(), a[2].to_bits()]
        }
        self.reserved == other.reserved
            && self.data_type == other.data_type
            && self.options == other.options
            && self.name == other.name
            && self.unused == other.unused
            && bits(&self.no_data) == bits(&other.no_data)
            && bits(&self.min) == bits(&other.min)
            && bits(&self.max) == bits(&other.max)
            && bits(&self.scale) == bits(&other.scale)
            && bits(&self.offset) == bits(&other.offset)
            && self.description == other.description
    }
}

impl EbField {
    /// Number of bytes this field contributes to each point record.
    pub fn byte_length(&self) -> u8 {
        if self.data_type == 0 {
            self.options
        } else {
            EXTRA_BYTE_DATA_TYPE_LENGTHS
                .get(self.data_type as usize)
                .copied()
                .unwrap_or(0)
        }
    }

    fn read_from<R: Read>(src: &mut R) -> crate::Result<Self> {
        let mut field = EbField::default();
        let mut reserved = [0u8; 2];
        src.read_exact(&mut reserved)?;
        field.reserved = reserved;
        field.data_type = src.read_u8()?;
        field.options = src.read_u8()?;
        let mut name = [0u8; 32];
        src.read_exact(&mut name)?;
        field.name = read_trimmed_string(&name);
        src.read_exact(&mut field.unused)?;
        for triple in [
            &mut field.no_data,
            &mut field.min,
            &mut field.max,
            &mut field.scale,
            &mut field.offset,
        ] {
            for value in triple.iter_mut() {
                *value = src.read_f64::<LittleEndian>()?;
            }
        }
        let mut description = [0u8; 32];
        src.read_exact(&mut description)?;
        field.description = read_trimmed_string(&description);
        Ok(field)
    }

    fn write_to<W: Write>(&self, dst: &mut W) -> crate::Result<()> {
        dst.write_all(&self.reserved)?;
        dst.write_u8(self.data_type)?;
        dst.write_u8(self.options)?;
        write_padded_string(dst, &self.name, 32)?;
        dst.write_all(&self.unused)?;
        for triple in [&self.no_data, &self.min, &self.max, &self.scale, &self.offset] {
            for value in triple {
                dst.write_f64::<LittleEndian>(*value)?;
            }
        }
        write_padded_string(dst, &self.description, 32)?;
        Ok(())
    }
}

/// Extra bytes VLR: the schema of user-defined per-point fields appended to
/// each point record ("LASF_Spec", record id 4).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EbVlr {
    pub items: Vec<EbField>,
}

impl EbVlr {
    pub fn new() -> Self {
        EbVlr::default()
    }

    /// Appends a field descriptor to the schema.
    pub fn add_field(&mut self, field: EbField) -> crate::Result<()> {
        if field.data_type as usize >= EXTRA_BYTE_DATA_TYPE_LENGTHS.len() {
            return Err(crate::Error::InvalidExtraByteDataType(field.data_type));
        }
        self.items.push(field);
        Ok(())
    }

    /// Serialized payload size of this VLR in bytes.
    pub fn size(&self) -> u64 {
        self.items.len() as u64 * EB_FIELD_SIZE
    }

    /// Total number of bytes the fields add to each point record.
    pub fn extra_bytes_len(&self) -> u16 {
        self.items
            .iter()
            .map(|item| u16::from(item.byte_length()))
            .sum()
    }

    /// Byte offset of the named field within a record's extra bytes.
    pub fn item_position(&self, name: &str) -> crate::Result<usize> {
        let mut position = 0;
        for item in &self.items {
            if item.name == name {
                return Ok(position);
            }
            position += item.byte_length() as usize;
        }
        Err(crate::Error::FieldNotFound(name.to_string()))
    }

    pub(crate) fn read_from<R: Read>(src: &mut R, data_length: u64) -> crate::Result<Self> {
        let num_items = (data_length / EB_FIELD_SIZE) as usize;
        let mut items = Vec::with_capacity(num_items);
        for _ in 0..num_items {
            items.push(EbField::read_from(src)?);
        }
        Ok(EbVlr { items })
    }

    pub(crate) fn write_to<W: Write>(&self, dst: &mut W) -> crate::Result<()> {
        for item in &self.items {
            item.write_to(dst)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn blob_field(name: &str, options: u8) -> EbField {
        EbField {
            data_type: 0,
            options,
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn data_type_byte_lengths() {
        let expected: [u8; 31] = [
            0, 1, 1, 2, 2, 4, 4, 8, 8, 4, 8, 2, 2, 4, 4, 8, 8, 16, 16, 8, 16, 3, 3, 6, 6, 12, 12,
            24, 24, 12, 24,
        ];
        for (data_type, expected) in expected.iter().enumerate().skip(1) {
            let field = EbField {
                data_type: data_type as u8,
                ..Default::default()
            };
            assert_eq!(field.byte_length(), *expected, "data_type {data_type}");
        }
        assert_eq!(blob_field("blob", 13).byte_length(), 13);
    }

    #[test]
    fn record_contribution() {
        let mut vlr = EbVlr::new();
        vlr.add_field(blob_field("a", 4)).unwrap();
        vlr.add_field(EbField {
            data_type: 9, // f32
            name: "b".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(vlr.extra_bytes_len(), 8);
        assert_eq!(vlr.size(), 384);
    }

    #[test]
    fn rejects_unknown_data_type() {
        let mut vlr = EbVlr::new();
        let result = vlr.add_field(EbField {
            data_type: 31,
            ..Default::default()
        });
        assert!(matches!(
            result,
            Err(crate::Error::InvalidExtraByteDataType(31))
        ));
    }

    #[test]
    fn item_position() {
        let mut vlr = EbVlr::new();
        vlr.add_field(blob_field("first", 4)).unwrap();
        vlr.add_field(blob_field("second", 2)).unwrap();
        vlr.add_field(blob_field("third", 8)).unwrap();
        assert_eq!(vlr.item_position("first").unwrap(), 0);
        assert_eq!(vlr.item_position("second").unwrap(), 4);
        assert_eq!(vlr.item_position("third").unwrap(), 6);
        assert!(matches!(
            vlr.item_position("missing"),
            Err(crate::Error::FieldNotFound(_))
        ));
    }

    #[test]
    fn field_equality_is_strict() {
        let field = blob_field("eb1", 4);
        let mut other = field.clone();
        assert_eq!(field, other);
        other.reserved = [1, 0];
        assert_ne!(field, other);
        let mut other = field.clone();
        other.scale[2] = f64::from_bits(1);
        assert_ne!(field, other);
    }

    #[test]
    fn vlr_payload_roundtrip() {
        let mut vlr = EbVlr::new();
        let mut field = blob_field("eb1", 4);
        field.no_data = [1.0, 2.0, 3.0];
        field.description = "first field".to_string();
        vlr.add_field(field).unwrap();
        vlr.add_field(EbField {
            data_type: 21,
            name: "eb2".to_string(),
            ..Default::default()
        })
        .unwrap();

        let mut buffer = Vec::new();
        vlr.write_to(&mut buffer).unwrap();
        assert_eq!(buffer.len() as u64, vlr.size());
        let read = EbVlr::read_from(&mut Cursor::new(buffer), vlr.size()).unwrap();
        assert_eq!(read, vlr);
    }

    #[test]
    fn vlr_header_layouts() {
        let header = VlrHeader {
            reserved: 0,
            user_id: "copc".to_string(),
            record_id: 1000,
            data_length: 96,
            description: "EPT Hierarchy".to_string(),
            evlr_flag: true,
        };
        let mut buffer = Vec::new();
        header.write_to(&mut buffer).unwrap();
        assert_eq!(buffer.len() as u64, EVLR_HEADER_SIZE);
        let read = VlrHeader::read_from(&mut Cursor::new(buffer), true).unwrap();
        assert_eq!(read, header);

        let short = VlrHeader {
            evlr_flag: false,
            ..header
        };
        let mut buffer = Vec::new();
        short.write_to(&mut buffer).unwrap();
        assert_eq!(buffer.len() as u64, VLR_HEADER_SIZE);
        let read = VlrHeader::read_from(&mut Cursor::new(buffer), false).unwrap();
        assert_eq!(read, short);
    }
}
