use ktopi_core::schema::MAX_RECO;
use ktopi_core::{Collection, EventRecord};
use ktopi_io::{missing_columns, open_store, EventReader, Error, MemoryStore, MemoryTable};
use tempfile::tempdir;

fn event(nch: i64, kaon_scores: &[i64]) -> EventRecord {
    let mut record = EventRecord::new();
    record.scalars.nch = nch;
    record.scalars.ecm = 91.2;
    record.reco.count = kaon_scores.len() as i64;
    record.reco.pid_kaon[..kaon_scores.len()].copy_from_slice(kaon_scores);
    record.reco.charge[..kaon_scores.len()].fill(1.0);
    record
}

#[test]
fn test_json_store_end_to_end() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.json");
    let table = MemoryTable::from_records([event(8, &[2, 0, 3]), event(12, &[1])]);
    MemoryStore::new()
        .with_table("t", table)
        .to_json_file(&path)
        .unwrap();

    let store = open_store(&path).unwrap();
    let source = store.open_table("t").unwrap();
    assert!(missing_columns(source.as_ref(), EventRecord::schema())
        .unwrap()
        .is_empty());

    let mut reader = EventReader::bind(source.as_ref()).unwrap();
    assert_eq!(reader.entry_count(), 2);

    let mut seen = Vec::new();
    for entry in 0..reader.entry_count() {
        assert!(reader.read_entry(entry));
        let record = reader.record();
        seen.push((
            record.scalars.nch,
            record.reco.pid_kaon[..record.reco.len()].to_vec(),
        ));
    }
    assert_eq!(seen, vec![(8, vec![2, 0, 3]), (12, vec![1])]);
}

#[test]
fn test_counts_above_capacity_are_preserved_as_stored() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("overflow.json");
    let mut record = event(8, &[]);
    record.reco.count = MAX_RECO as i64 * 2;
    MemoryStore::new()
        .with_table("t", MemoryTable::from_records([record]))
        .to_json_file(&path)
        .unwrap();

    let store = open_store(&path).unwrap();
    let source = store.open_table("t").unwrap();
    let mut reader = EventReader::bind(source.as_ref()).unwrap();
    assert!(reader.read_entry(0));
    assert!(Collection::Reco.overflows(reader.record().reco.count));
    assert_eq!(reader.record().reco.len(), MAX_RECO);
}

#[test]
fn test_unknown_extension_and_missing_table() {
    let dir = tempdir().unwrap();
    let bogus = dir.path().join("events.root");
    std::fs::write(&bogus, b"not a store").unwrap();
    assert!(matches!(open_store(&bogus), Err(Error::InvalidFormat(_))));

    let path = dir.path().join("empty.json");
    MemoryStore::new().to_json_file(&path).unwrap();
    let store = open_store(&path).unwrap();
    assert!(matches!(store.open_table("t"), Err(Error::TableNotFound(_))));
}
