//! Mapping counters are process-wide, so this binary holds a single test.

mod common;

use colmap::{active_mappings, total_mapped_memory, AccessMode, Dataset, Schema};

#[test]
fn counters_follow_column_mappings() {
    let dir = common::scratch();
    let schema = Schema::of::<(u32, f64, u8)>(&["id", "value", "flag"]).unwrap();

    let (maps, bytes) = (active_mappings(), total_mapped_memory());

    let mut dataset = Dataset::create(dir.path(), &schema, 100).unwrap();
    assert_eq!(active_mappings(), maps + 3);
    assert_eq!(total_mapped_memory(), bytes + 100 * (4 + 8 + 1));

    dataset.column_as_mut::<f64>(1).unwrap()[99] = 1.5;
    dataset.flush_async().unwrap();

    dataset.resize(10).unwrap();
    assert_eq!(active_mappings(), maps + 3);
    assert_eq!(total_mapped_memory(), bytes + 10 * (4 + 8 + 1));

    // Empty columns hold no mapping at all.
    dataset.resize(0).unwrap();
    assert_eq!(active_mappings(), maps);
    assert_eq!(total_mapped_memory(), bytes);

    dataset.resize(4).unwrap();
    drop(dataset);
    assert_eq!(active_mappings(), maps);
    assert_eq!(total_mapped_memory(), bytes);

    let reopened = Dataset::open(dir.path(), &schema, AccessMode::ReadOnly).unwrap();
    assert_eq!(active_mappings(), maps + 3);
    reopened.flush_async().unwrap();
    drop(reopened);
    assert_eq!(active_mappings(), maps);
}
