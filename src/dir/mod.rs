pub use entry::{
    Attributes, DELETED_MARKER, DIR_ENTRY_SIZE, DirSlot, DirectoryEntry, END_OF_DIRECTORY,
};
pub use reader::DirEntryReader;

pub(crate) mod entry;
pub(crate) mod reader;

/// Lazily decodes the live entries of a directory region. Calling `scan` again on the same region
/// starts over.
pub fn scan(region: &[u8]) -> DirEntryReader<'_> {
    DirEntryReader::from(region)
}

#[cfg(test)]
fn record(name: &str) -> [u8; DIR_ENTRY_SIZE] {
    DirectoryEntry::new(name, "TXT", Attributes::ARCHIVE, Default::default(), 2, 1)
        .encode()
        .unwrap()
}

#[test]
fn scan_stops_at_end_marker() {
    let mut deleted = record("GONE");
    deleted[0] = DELETED_MARKER;

    let region = [
        record("A"),
        deleted,
        record("B"),
        [0u8; DIR_ENTRY_SIZE],
        record("C"),
    ]
    .concat();

    let names: Vec<String> = scan(&region).map(|e| e.name).collect();
    assert_eq!(names, ["A", "B"]);

    // restartable
    assert_eq!(scan(&region).count(), 2);
}

#[test]
fn scan_ends_with_region() {
    let region = [record("A"), record("B")].concat();
    let mut reader = scan(&region[..DIR_ENTRY_SIZE * 2 - 1]);

    assert_eq!(reader.next().map(|e| e.name), Some("A".into()));
    // the trailing partial record is not decoded
    assert_eq!(reader.next(), None);
    assert_eq!(reader.next(), None);
}

#[test]
fn scan_of_empty_region() {
    assert_eq!(scan(&[]).next(), None);
}
