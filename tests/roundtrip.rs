//! Write COPC streams in memory, read them back and check that every node
//! comes out exactly as it went in.

use copc::{
    CopcConfigWriter, CopcReader, CopcWriter, EbField, EbVlr, Error, Vector3, VoxelKey,
};
use std::io::Cursor;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Builds `count` synthetic point records. The x/y/z integers, the return
/// byte and the GPS time are laid out per the point format 6+ record layout
/// so the writer can accumulate extents from them.
fn make_points(count: usize, point_record_length: usize, seed: i32) -> Vec<u8> {
    let mut points = vec![0u8; count * point_record_length];
    for (i, record) in points.chunks_exact_mut(point_record_length).enumerate() {
        let value = seed + i as i32;
        for (j, byte) in record.iter_mut().enumerate() {
            *byte = (value as u8).wrapping_add(j as u8);
        }
        record[0..4].copy_from_slice(&value.to_le_bytes());
        record[4..8].copy_from_slice(&(-value).to_le_bytes());
        record[8..12].copy_from_slice(&(2 * value).to_le_bytes());
        record[14] = 0b0001_0001; // first of one return
        record[22..30].copy_from_slice(&f64::from(value).to_le_bytes());
    }
    points
}

fn unit_scale_config() -> CopcConfigWriter {
    CopcConfigWriter::with_options(
        7,
        Vector3::new(1.0, 1.0, 1.0),
        Vector3::default(),
        "test_wkt",
        EbVlr::default(),
    )
    .unwrap()
}

#[test]
fn single_root_node() {
    init();
    let config = CopcConfigWriter::new(7).unwrap();
    let point_record_length = config.las_header().point_record_length as usize;
    let twenty = make_points(20, point_record_length, 0);

    let mut stream = Cursor::new(Vec::new());
    let mut writer = CopcWriter::new(&mut stream, config).unwrap();

    assert!(matches!(
        writer.add_node(VoxelKey::invalid(), &twenty, None),
        Err(Error::InvalidKey(_))
    ));
    assert!(matches!(
        writer.add_node(VoxelKey::root(), &[], None),
        Err(Error::EmptyPointBuffer)
    ));
    assert!(matches!(
        writer.add_node(VoxelKey::root(), &twenty[..point_record_length - 1], None),
        Err(Error::InvalidPointBufferLength { .. })
    ));

    writer.add_node(VoxelKey::root(), &twenty, None).unwrap();
    writer.close().unwrap();
    assert!(writer.is_closed());
    // closing twice is a no-op
    writer.close().unwrap();
    drop(writer);

    let mut reader = CopcReader::open(stream).unwrap();
    assert!(reader.copc_info().root_hier_offset > 0);
    assert_eq!(reader.copc_info().root_hier_size, 32);
    assert_eq!(reader.las_header().point_count, 20);

    let node = reader.find_node(VoxelKey::root()).unwrap();
    assert!(node.is_valid());
    assert_eq!(node.point_count, 20);
    assert_eq!(reader.get_point_data(&node).unwrap(), twenty);
}

#[test]
fn multiple_nodes_in_root_page() {
    let config = unit_scale_config();
    let point_record_length = config.las_header().point_record_length as usize;
    let twenty = make_points(20, point_record_length, 0);
    let twelve = make_points(12, point_record_length, 100);
    let sixty = make_points(60, point_record_length, 200);

    let mut stream = Cursor::new(Vec::new());
    let mut writer = CopcWriter::new(&mut stream, config).unwrap();
    writer.add_node(VoxelKey::root(), &twenty, None).unwrap();
    writer
        .add_node(VoxelKey::new(1, 1, 1, 1), &twelve, None)
        .unwrap();
    writer
        .add_node(VoxelKey::new(1, 1, 1, 0), &sixty, None)
        .unwrap();
    writer.close().unwrap();
    drop(writer);

    let mut reader = CopcReader::open(stream).unwrap();
    assert!(reader.copc_info().root_hier_offset > 0);
    assert_eq!(reader.copc_info().root_hier_size, 32 * 3);
    assert_eq!(reader.copc_config().wkt(), "test_wkt");

    for (key, points) in [
        (VoxelKey::root(), &twenty),
        (VoxelKey::new(1, 1, 1, 1), &twelve),
        (VoxelKey::new(1, 1, 1, 0), &sixty),
    ] {
        let node = reader.find_node(key).unwrap();
        assert!(node.is_valid());
        assert_eq!(&reader.get_point_data(&node).unwrap(), points);
    }

    // extents were accumulated from the raw records at unit scale
    let header = reader.las_header();
    assert_eq!(header.point_count, 92);
    assert_eq!(header.number_of_points_by_return[0], 92);
    assert_eq!(header.min, Vector3::new(0.0, -259.0, 0.0));
    assert_eq!(header.max, Vector3::new(259.0, 0.0, 518.0));
    assert_eq!(reader.copc_info().gpstime_minimum, 0.0);
    assert_eq!(reader.copc_info().gpstime_maximum, 259.0);
}

#[test]
fn sub_pages() {
    init();
    let config = CopcConfigWriter::new(7).unwrap();
    let point_record_length = config.las_header().point_record_length as usize;
    let twenty = make_points(20, point_record_length, 0);
    let twelve = make_points(12, point_record_length, 100);
    let sixty = make_points(60, point_record_length, 200);

    let sub_page1 = VoxelKey::new(1, 0, 0, 0);
    let sub_page2 = VoxelKey::new(1, 1, 1, 1);

    let mut stream = Cursor::new(Vec::new());
    let mut writer = CopcWriter::new(&mut stream, config).unwrap();
    writer.add_node(VoxelKey::root(), &twenty, None).unwrap();
    writer
        .add_node(VoxelKey::new(1, 0, 0, 0), &twelve, Some(sub_page1))
        .unwrap();
    writer
        .add_node(VoxelKey::new(1, 1, 1, 1), &sixty, Some(sub_page2))
        .unwrap();
    writer
        .add_node(VoxelKey::new(2, 2, 2, 2), &twenty, Some(sub_page2))
        .unwrap();

    // can't add a node that's not a child of the page
    assert!(matches!(
        writer.add_node(VoxelKey::new(1, 2, 2, 2), &twenty, Some(sub_page2)),
        Err(Error::NodeOutsidePage { .. })
    ));
    // a rejected add must not corrupt the stream
    writer.close().unwrap();
    drop(writer);

    // the root page holds one node and two page pointers
    let mut reader = CopcReader::open(stream).unwrap();
    assert!(reader.copc_info().root_hier_offset > 0);
    assert_eq!(reader.copc_info().root_hier_size, 32 * 3);

    for (key, points) in [
        (VoxelKey::new(2, 2, 2, 2), &twenty),
        (VoxelKey::new(1, 1, 1, 1), &sixty),
        (VoxelKey::new(1, 0, 0, 0), &twelve),
        (VoxelKey::root(), &twenty),
    ] {
        let node = reader.find_node(key).unwrap();
        assert!(node.is_valid(), "node {key} not found");
        assert_eq!(&reader.get_point_data(&node).unwrap(), points);
    }

    // absent keys resolve to the invalid sentinel, not an error
    assert!(!reader.find_node(VoxelKey::new(3, 0, 0, 0)).unwrap().is_valid());
    assert!(!reader.find_node(VoxelKey::new(1, 1, 0, 0)).unwrap().is_valid());
    assert!(!reader.find_node(VoxelKey::invalid()).unwrap().is_valid());
}

#[test]
fn duplicate_and_closed_writer_errors() {
    let config = CopcConfigWriter::new(6).unwrap();
    let point_record_length = config.las_header().point_record_length as usize;
    let points = make_points(5, point_record_length, 0);

    let mut stream = Cursor::new(Vec::new());
    let mut writer = CopcWriter::new(&mut stream, config).unwrap();
    writer.add_node(VoxelKey::root(), &points, None).unwrap();
    assert!(matches!(
        writer.add_node(VoxelKey::root(), &points, None),
        Err(Error::DuplicateNode(_))
    ));

    writer.close().unwrap();
    assert!(matches!(
        writer.add_node(VoxelKey::new(1, 0, 0, 0), &points, None),
        Err(Error::ClosedWriter)
    ));
    assert!(matches!(
        writer.add_node_compressed(VoxelKey::new(1, 0, 0, 0), &points, 5, None),
        Err(Error::ClosedWriter)
    ));
}

#[test]
fn empty_writer_cannot_close() {
    let config = CopcConfigWriter::new(6).unwrap();
    let mut stream = Cursor::new(Vec::new());
    let mut writer = CopcWriter::new(&mut stream, config).unwrap();
    assert!(matches!(writer.close(), Err(Error::EmptyCopcFile)));
}

/// Writes a file the uncompressed way, slices its chunks back out and feeds
/// them to `add_node_compressed`; the second file must decompress to the
/// same points.
#[test]
fn compressed_nodes_roundtrip() {
    let point_record_length = CopcConfigWriter::new(7)
        .unwrap()
        .las_header()
        .point_record_length as usize;
    let twenty = make_points(20, point_record_length, 0);
    let twelve = make_points(12, point_record_length, 100);
    let sixty = make_points(60, point_record_length, 200);

    let keys = [
        VoxelKey::root(),
        VoxelKey::new(1, 1, 1, 1),
        VoxelKey::new(1, 1, 1, 0),
    ];
    let point_sets: [&Vec<u8>; 3] = [&twenty, &twelve, &sixty];

    let mut stream = Cursor::new(Vec::new());
    let mut writer = CopcWriter::new(&mut stream, CopcConfigWriter::new(7).unwrap()).unwrap();
    for (key, points) in keys.iter().zip(point_sets) {
        writer.add_node(*key, points, None).unwrap();
    }
    writer.close().unwrap();
    drop(writer);
    let bytes = stream.into_inner();

    // collect the compressed chunks of the first file
    let mut reader = CopcReader::open(Cursor::new(bytes.clone())).unwrap();
    let mut chunks = Vec::new();
    for key in keys {
        let node = reader.find_node(key).unwrap();
        assert!(node.is_valid());
        let chunk = bytes[node.offset as usize..][..node.byte_size as usize].to_vec();
        chunks.push((node.point_count, chunk));
    }

    let mut stream = Cursor::new(Vec::new());
    let mut writer = CopcWriter::new(&mut stream, CopcConfigWriter::new(7).unwrap()).unwrap();
    assert!(matches!(
        writer.add_node_compressed(VoxelKey::invalid(), &chunks[0].1, 20, None),
        Err(Error::InvalidKey(_))
    ));
    assert!(matches!(
        writer.add_node_compressed(VoxelKey::root(), &chunks[0].1, 0, None),
        Err(Error::InvalidPointCount(0))
    ));
    for (key, (point_count, chunk)) in keys.iter().zip(&chunks) {
        writer
            .add_node_compressed(*key, chunk, *point_count, None)
            .unwrap();
    }
    writer.close().unwrap();
    drop(writer);

    let mut reader = CopcReader::open(stream).unwrap();
    assert_eq!(reader.copc_info().root_hier_size, 32 * 3);
    assert_eq!(reader.las_header().point_count, 92);
    for (key, points) in keys.iter().zip(point_sets) {
        let node = reader.find_node(*key).unwrap();
        assert!(node.is_valid());
        assert_eq!(&reader.get_point_data(&node).unwrap(), points);
    }
}

#[test]
fn compressed_sub_pages() {
    let point_record_length = CopcConfigWriter::new(7)
        .unwrap()
        .las_header()
        .point_record_length as usize;
    let twenty = make_points(20, point_record_length, 50);

    let mut stream = Cursor::new(Vec::new());
    let mut writer = CopcWriter::new(&mut stream, CopcConfigWriter::new(7).unwrap()).unwrap();
    writer.add_node(VoxelKey::root(), &twenty, None).unwrap();
    writer.close().unwrap();
    drop(writer);
    let bytes = stream.into_inner();

    let mut reader = CopcReader::open(Cursor::new(bytes.clone())).unwrap();
    let node = reader.find_node(VoxelKey::root()).unwrap();
    let chunk = bytes[node.offset as usize..][..node.byte_size as usize].to_vec();

    let sub_page = VoxelKey::new(1, 1, 1, 1);
    let mut stream = Cursor::new(Vec::new());
    let mut writer = CopcWriter::new(&mut stream, CopcConfigWriter::new(7).unwrap()).unwrap();
    writer
        .add_node_compressed(VoxelKey::new(1, 1, 1, 1), &chunk, 20, Some(sub_page))
        .unwrap();
    writer
        .add_node_compressed(VoxelKey::new(2, 2, 2, 2), &chunk, 20, Some(sub_page))
        .unwrap();
    assert!(matches!(
        writer.add_node_compressed(VoxelKey::new(1, 2, 2, 2), &chunk, 20, Some(sub_page)),
        Err(Error::NodeOutsidePage { .. })
    ));
    writer.close().unwrap();
    drop(writer);

    let mut reader = CopcReader::open(stream).unwrap();
    // the root page only carries the pointer to the sub page
    assert_eq!(reader.copc_info().root_hier_size, 32);
    for key in [VoxelKey::new(1, 1, 1, 1), VoxelKey::new(2, 2, 2, 2)] {
        let node = reader.find_node(key).unwrap();
        assert!(node.is_valid(), "node {key} not found");
        assert_eq!(reader.get_point_data(&node).unwrap(), twenty);
    }
}

#[test]
fn roundtrip_with_extra_bytes() {
    let mut eb_vlr = EbVlr::new();
    eb_vlr
        .add_field(EbField {
            data_type: 0,
            options: 4,
            name: "eb1".to_string(),
            ..Default::default()
        })
        .unwrap();
    let config = CopcConfigWriter::with_options(
        7,
        Vector3::default_scale(),
        Vector3::default_offset(),
        "",
        eb_vlr,
    )
    .unwrap();
    let point_record_length = config.las_header().point_record_length as usize;
    assert_eq!(point_record_length, 40);
    let points = make_points(20, point_record_length, 7);

    let mut stream = Cursor::new(Vec::new());
    let mut writer = CopcWriter::new(&mut stream, config).unwrap();
    writer.add_node(VoxelKey::root(), &points, None).unwrap();
    writer.close().unwrap();
    drop(writer);

    let mut reader = CopcReader::open(stream).unwrap();
    let eb_vlr = reader.copc_config().extra_bytes_vlr().clone();
    assert_eq!(eb_vlr.items.len(), 1);
    assert_eq!(eb_vlr.items[0].name, "eb1");
    assert_eq!(eb_vlr.item_position("eb1").unwrap(), 0);
    assert_eq!(reader.las_header().point_record_length, 40);

    let node = reader.find_node(VoxelKey::root()).unwrap();
    assert_eq!(reader.get_point_data(&node).unwrap(), points);
}
