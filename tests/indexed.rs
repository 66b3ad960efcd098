mod common;

use rstest::rstest;

use colmap::columnar::index::OFFSETS_DIR;
use colmap::{
    AccessMode, Dataset, Error, ErrorKind, IndexedDataset, IndexedWriter, Schema, Value,
    WriteMode, WriterOptions,
};

fn schema() -> Schema {
    Schema::of::<(u64, f64)>(&["scan", "mz"]).unwrap()
}

/// Write one group per size; rows are numbered consecutively across groups.
fn write_groups(dir: &std::path::Path, sizes: &[usize]) {
    let mut writer = IndexedWriter::create(dir, &schema()).unwrap();
    let mut row = 0u64;
    for (group, &size) in sizes.iter().enumerate() {
        let scans = vec![group as u64; size];
        let mz: Vec<f64> = (row..row + size as u64).map(|r| r as f64 + 0.25).collect();
        writer.write_group((&scans[..], &mz[..])).unwrap();
        row += size as u64;
    }
    assert_eq!(writer.row_count() as u64, row);
    assert_eq!(writer.finish().unwrap(), sizes.len());
}

#[test]
fn groups_partition_the_base() {
    let dir = common::scratch();
    let sizes = [3, 4, 5, 6, 7];
    write_groups(dir.path(), &sizes);

    let dataset = IndexedDataset::open(dir.path(), &schema(), AccessMode::ReadOnly).unwrap();
    assert_eq!(dataset.number_of_groups(), 5);
    assert_eq!(dataset.offsets(), &[0, 3, 7, 12, 18, 25]);
    assert_eq!(dataset.base().row_count(), 25);

    let mut concatenated = Vec::new();
    for (g, &size) in sizes.iter().enumerate() {
        let group = dataset.get_group(g).unwrap();
        assert_eq!(group.len(), size);
        let scans = group.column_as::<u64>(0).unwrap();
        assert!(scans.iter().all(|&scan| scan == g as u64));
        concatenated.extend_from_slice(group.column_as::<f64>(1).unwrap());
    }
    assert_eq!(
        &concatenated[..],
        dataset.base().column_as::<f64>(1).unwrap().as_slice()
    );

    let err = dataset.get_group(5).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Range);
    assert!(matches!(err, Error::GroupIndexOutOfRange { index: 5, groups: 5 }));
}

#[test]
fn typed_group_views() {
    let dir = common::scratch();
    write_groups(dir.path(), &[2, 3]);

    let dataset = IndexedDataset::open(dir.path(), &schema(), AccessMode::ReadOnly).unwrap();
    let (scans, mz) = dataset.get_group_as::<(u64, f64)>(1).unwrap();
    assert_eq!(scans, &[1, 1, 1]);
    assert_eq!(mz, &[2.25, 3.25, 4.25]);

    let group = dataset.get_group(1).unwrap();
    assert_eq!(group.row(2), vec![Value::UInt64(1), Value::Float64(4.25)]);
    let (_, mz) = group.records::<(u64, f64)>().unwrap();
    assert_eq!(mz.len(), 3);

    let err = dataset.get_group_as::<(u64, f32)>(0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
}

#[rstest]
#[case(&[])]
#[case(&[0])]
#[case(&[0, 0, 0])]
#[case(&[1, 0, 2, 0])]
fn empty_groups_are_kept(#[case] sizes: &[usize]) {
    let dir = common::scratch();
    write_groups(dir.path(), sizes);

    let dataset = IndexedDataset::open(dir.path(), &schema(), AccessMode::ReadOnly).unwrap();
    assert_eq!(dataset.number_of_groups(), sizes.len());
    let lens: Vec<usize> = dataset.groups().map(|group| group.len()).collect();
    assert_eq!(lens, sizes);
    assert_eq!(dataset.offsets()[0], 0);
}

#[test]
fn zero_groups() {
    let dir = common::scratch();
    write_groups(dir.path(), &[]);

    let dataset = IndexedDataset::open(dir.path(), &schema(), AccessMode::ReadOnly).unwrap();
    assert_eq!(dataset.number_of_groups(), 0);
    assert_eq!(dataset.offsets(), &[0]);
    assert_eq!(dataset.groups().count(), 0);
    assert!(matches!(
        dataset.get_group(0),
        Err(Error::GroupIndexOutOfRange { index: 0, groups: 0 })
    ));
}

#[test]
fn offsets_are_a_plain_dataset() {
    let dir = common::scratch();
    write_groups(dir.path(), &[4, 1]);

    let offsets = Dataset::open_inferred(dir.path().join(OFFSETS_DIR), AccessMode::ReadOnly).unwrap();
    assert_eq!(offsets.schema().field(0).unwrap().name, "offset");
    assert_eq!(offsets.column_as::<u64>(0).unwrap().as_slice(), &[0, 4, 5]);
}

#[test]
fn base_longer_than_offsets_is_rejected() {
    let dir = common::scratch();
    write_groups(dir.path(), &[2, 2]);

    let mut base = Dataset::open(dir.path(), &schema(), AccessMode::ReadWrite).unwrap();
    base.resize(6).unwrap();
    drop(base);

    let err = IndexedDataset::open(dir.path(), &schema(), AccessMode::ReadOnly).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SizeConsistency);
}

#[test]
fn writable_base_allows_in_place_updates() {
    let dir = common::scratch();
    write_groups(dir.path(), &[2, 2]);

    let dataset = IndexedDataset::open(dir.path(), &schema(), AccessMode::ReadWrite).unwrap();
    assert_eq!(dataset.base().access_mode(), AccessMode::ReadWrite);

    let mut base = dataset.into_base();
    base.column_as_mut::<f64>(1).unwrap()[3] = -1.0;
    base.flush().unwrap();
    drop(base);

    let dataset = IndexedDataset::open(dir.path(), &schema(), AccessMode::ReadOnly).unwrap();
    let (_, mz) = dataset.get_group_as::<(u64, f64)>(1).unwrap();
    assert_eq!(mz, &[2.25, -1.0]);
}

#[test]
fn append_mode_adds_groups() {
    let dir = common::scratch();
    write_groups(dir.path(), &[3]);

    let options = WriterOptions::new().mode(WriteMode::Append);
    let mut writer = IndexedWriter::create_with(dir.path(), &schema(), &options).unwrap();
    writer.write_group((&[7u64, 7][..], &[0.5f64, 1.5][..])).unwrap();
    assert_eq!(writer.finish().unwrap(), 2);

    let dataset = IndexedDataset::open(dir.path(), &schema(), AccessMode::ReadOnly).unwrap();
    assert_eq!(dataset.offsets(), &[0, 3, 5]);
    assert_eq!(dataset.get_group(1).unwrap().column_as::<u64>(0).unwrap(), &[7, 7]);
}
