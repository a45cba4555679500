//! Integration tests for heap files driven through the buffer pool

use std::path::Path;
use std::sync::Arc;
use std::thread;

use sable::buffer::BufferPoolManager;
use sable::catalog::Catalog;
use sable::concurrency::{LockManager, Transaction};
use sable::storage::table::HeapFile;
use sable::tuple::{DataType, Schema, Tuple, Value};
use sable::{PageId, RecordId, SableError, SlotId};
use tempfile::NamedTempFile;

/// 200-byte tuples: 20 slots per page
const CAPACITY: usize = 20;

fn create_schema() -> Arc<Schema> {
    Schema::builder()
        .column("id", DataType::Integer)
        .column("payload", DataType::Char(194))
        .build_arc()
}

fn row(schema: &Arc<Schema>, id: i32) -> Tuple {
    Tuple::new(
        Arc::clone(schema),
        vec![Value::Integer(id), Value::from(format!("row-{id}"))],
    )
    .unwrap()
}

fn open_bpm(path: &Path, pool_size: usize) -> (BufferPoolManager, u32, Arc<Schema>) {
    let schema = create_schema();
    let catalog = Arc::new(Catalog::new());
    let table_id = catalog
        .add_table("rows", HeapFile::open(path, Arc::clone(&schema)).unwrap())
        .unwrap();
    let bpm = BufferPoolManager::new(pool_size, catalog, Arc::new(LockManager::new()));
    (bpm, table_id, schema)
}

fn insert_rows(bpm: &BufferPoolManager, table_id: u32, schema: &Arc<Schema>, ids: std::ops::Range<i32>) {
    let txn = Transaction::begin();
    for id in ids {
        let mut tuple = row(schema, id);
        let pages = bpm.insert_tuple(txn.id(), table_id, &mut tuple).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(tuple.record_id().map(|rid| rid.page_id), Some(pages[0]));
    }
    txn.commit(bpm).unwrap();
}

fn scan(bpm: &BufferPoolManager, table_id: u32) -> Vec<Tuple> {
    let txn = Transaction::begin();
    let file = bpm.catalog().table(table_id).unwrap();
    let tuples = file
        .iter(bpm, txn.id())
        .collect::<sable::Result<Vec<_>>>()
        .unwrap();
    txn.commit(bpm).unwrap();
    tuples
}

fn id_of(tuple: &Tuple) -> i32 {
    match tuple.value(0) {
        Some(Value::Integer(id)) => *id,
        other => panic!("unexpected id column {other:?}"),
    }
}

#[test]
fn test_insert_fills_pages_first_fit() {
    let temp_file = NamedTempFile::new().unwrap();
    let (bpm, table_id, schema) = open_bpm(temp_file.path(), 10);
    assert_eq!(
        bpm.catalog().table(table_id).unwrap().layout().capacity(),
        CAPACITY
    );

    let n = 45;
    insert_rows(&bpm, table_id, &schema, 0..n);

    let file = bpm.catalog().table(table_id).unwrap();
    assert_eq!(file.num_pages().unwrap(), 3);

    let tuples = scan(&bpm, table_id);
    let per_page = |page_no| {
        tuples
            .iter()
            .filter(|t| t.record_id().unwrap().page_id.page_no == page_no)
            .count()
    };
    assert_eq!(per_page(0), CAPACITY);
    assert_eq!(per_page(1), CAPACITY);
    assert_eq!(per_page(2), n as usize % CAPACITY);
}

#[test]
fn test_exact_multiple_fills_last_page() {
    let temp_file = NamedTempFile::new().unwrap();
    let (bpm, table_id, schema) = open_bpm(temp_file.path(), 10);

    insert_rows(&bpm, table_id, &schema, 0..(2 * CAPACITY as i32));

    let file = bpm.catalog().table(table_id).unwrap();
    assert_eq!(file.num_pages().unwrap(), 2);
    assert_eq!(scan(&bpm, table_id).len(), 2 * CAPACITY);
}

#[test]
fn test_scan_yields_page_then_slot_order_and_rewinds() {
    let temp_file = NamedTempFile::new().unwrap();
    let (bpm, table_id, schema) = open_bpm(temp_file.path(), 10);
    insert_rows(&bpm, table_id, &schema, 0..50);

    let tuples = scan(&bpm, table_id);
    let ids: Vec<_> = tuples.iter().map(id_of).collect();
    assert_eq!(ids, (0..50).collect::<Vec<_>>());

    let rids: Vec<RecordId> = tuples.iter().map(|t| t.record_id().unwrap()).collect();
    assert_eq!(rids[0], RecordId::new(PageId::new(table_id, 0), SlotId::new(0)));
    assert_eq!(rids[21], RecordId::new(PageId::new(table_id, 1), SlotId::new(1)));

    let txn = Transaction::begin();
    let file = bpm.catalog().table(table_id).unwrap();
    let mut iter = file.iter(&bpm, txn.id());
    for expected in 0..3 {
        assert_eq!(id_of(&iter.next_tuple().unwrap()), expected);
    }
    iter.rewind();
    assert_eq!(id_of(&iter.next_tuple().unwrap()), 0);

    iter.close();
    assert!(iter.next().is_none());
    assert!(matches!(iter.next_tuple(), Err(SableError::NoSuchElement)));

    iter.rewind();
    assert_eq!(iter.by_ref().count(), 50);
    assert!(matches!(iter.next_tuple(), Err(SableError::NoSuchElement)));
    drop(iter);
    txn.commit(&bpm).unwrap();
}

#[test]
fn test_empty_file_scan_does_not_grow() {
    let temp_file = NamedTempFile::new().unwrap();
    let (bpm, table_id, _) = open_bpm(temp_file.path(), 4);

    assert!(scan(&bpm, table_id).is_empty());
    assert_eq!(bpm.catalog().table(table_id).unwrap().num_pages().unwrap(), 0);
}

#[test]
fn test_delete_then_insert_reuses_slot() {
    let temp_file = NamedTempFile::new().unwrap();
    let (bpm, table_id, schema) = open_bpm(temp_file.path(), 10);
    insert_rows(&bpm, table_id, &schema, 0..45);

    let victim = scan(&bpm, table_id)
        .into_iter()
        .find(|t| id_of(t) == 5)
        .unwrap();
    let freed = victim.record_id().unwrap();

    let txn = Transaction::begin();
    assert_eq!(bpm.delete_tuple(txn.id(), &victim).unwrap(), vec![freed.page_id]);
    let mut replacement = row(&schema, 1000);
    bpm.insert_tuple(txn.id(), table_id, &mut replacement).unwrap();
    txn.commit(&bpm).unwrap();

    assert_eq!(replacement.record_id(), Some(freed));
    assert_eq!(bpm.catalog().table(table_id).unwrap().num_pages().unwrap(), 3);

    let ids: Vec<_> = scan(&bpm, table_id).iter().map(id_of).collect();
    assert_eq!(ids.len(), 45);
    assert!(!ids.contains(&5));
    assert_eq!(ids[5], 1000);
}

#[test]
fn test_delete_errors() {
    let temp_file = NamedTempFile::new().unwrap();
    let (bpm, table_id, schema) = open_bpm(temp_file.path(), 10);
    insert_rows(&bpm, table_id, &schema, 0..3);
    let stored = scan(&bpm, table_id);

    let txn = Transaction::begin();

    // No record id
    assert!(matches!(
        bpm.delete_tuple(txn.id(), &row(&schema, 0)),
        Err(SableError::MissingRecordId)
    ));

    // Same slot, different contents
    let impostor = row(&schema, 99).with_record_id(stored[1].record_id().unwrap());
    assert!(matches!(
        bpm.delete_tuple(txn.id(), &impostor),
        Err(SableError::TupleMismatch(_))
    ));

    // Already deleted
    bpm.delete_tuple(txn.id(), &stored[0]).unwrap();
    assert!(matches!(
        bpm.delete_tuple(txn.id(), &stored[0]),
        Err(SableError::RecordNotFound(_))
    ));

    // Page that does not exist yet
    let beyond = row(&schema, 2).with_record_id(RecordId::new(PageId::new(table_id, 9), SlotId::new(0)));
    assert!(matches!(
        bpm.delete_tuple(txn.id(), &beyond),
        Err(SableError::RecordNotFound(_))
    ));

    txn.abort(&bpm).unwrap();
    assert_eq!(scan(&bpm, table_id).len(), 3);
}

#[test]
fn test_delete_from_wrong_table() {
    let first = NamedTempFile::new().unwrap();
    let second = NamedTempFile::new().unwrap();
    let (bpm, table_id, schema) = open_bpm(first.path(), 10);
    let other_id = bpm
        .catalog()
        .add_table("other", HeapFile::open(second.path(), Arc::clone(&schema)).unwrap())
        .unwrap();

    insert_rows(&bpm, table_id, &schema, 0..1);
    let stored = scan(&bpm, table_id).remove(0);

    let txn = Transaction::begin();
    let other = bpm.catalog().table(other_id).unwrap();
    assert!(matches!(
        other.delete_tuple(&bpm, txn.id(), &stored),
        Err(SableError::WrongTable { .. })
    ));
    txn.abort(&bpm).unwrap();
}

#[test]
fn test_insert_rejects_foreign_schema() {
    let temp_file = NamedTempFile::new().unwrap();
    let (bpm, table_id, _) = open_bpm(temp_file.path(), 4);
    let narrow = Schema::builder().column("id", DataType::Integer).build_arc();

    let txn = Transaction::begin();
    let mut tuple = Tuple::new(narrow, vec![Value::Integer(1)]).unwrap();
    assert!(matches!(
        bpm.insert_tuple(txn.id(), table_id, &mut tuple),
        Err(SableError::SchemaMismatch)
    ));
    assert_eq!(tuple.record_id(), None);
    txn.abort(&bpm).unwrap();
}

#[test]
fn test_committed_inserts_survive_reopen() {
    let temp_file = NamedTempFile::new().unwrap();
    {
        let (bpm, table_id, schema) = open_bpm(temp_file.path(), 10);
        insert_rows(&bpm, table_id, &schema, 0..30);
    }

    let (bpm, table_id, _) = open_bpm(temp_file.path(), 10);
    let ids: Vec<_> = scan(&bpm, table_id).iter().map(id_of).collect();
    assert_eq!(ids, (0..30).collect::<Vec<_>>());
}

#[test]
fn test_aborted_inserts_are_invisible() {
    let temp_file = NamedTempFile::new().unwrap();
    let (bpm, table_id, schema) = open_bpm(temp_file.path(), 10);
    insert_rows(&bpm, table_id, &schema, 0..5);

    let txn = Transaction::begin();
    for id in 100..130 {
        bpm.insert_tuple(txn.id(), table_id, &mut row(&schema, id))
            .unwrap();
    }
    txn.abort(&bpm).unwrap();

    let ids: Vec<_> = scan(&bpm, table_id).iter().map(id_of).collect();
    assert_eq!(ids, (0..5).collect::<Vec<_>>());

    drop(bpm);
    let (bpm, table_id, _) = open_bpm(temp_file.path(), 10);
    assert_eq!(scan(&bpm, table_id).len(), 5);
}

#[test]
fn test_flush_before_abort_keeps_insert_invisible() {
    let temp_file = NamedTempFile::new().unwrap();
    let (bpm, table_id, schema) = open_bpm(temp_file.path(), 10);

    let txn = Transaction::begin();
    let mut tuple = row(&schema, 7);
    bpm.insert_tuple(txn.id(), table_id, &mut tuple).unwrap();
    bpm.flush_all_pages().unwrap();
    txn.abort(&bpm).unwrap();

    assert!(scan(&bpm, table_id).is_empty());

    drop(bpm);
    let (bpm, table_id, _) = open_bpm(temp_file.path(), 10);
    assert!(scan(&bpm, table_id).is_empty());
}

#[test]
fn test_concurrent_inserts_all_land() {
    let temp_file = NamedTempFile::new().unwrap();
    let (bpm, table_id, schema) = open_bpm(temp_file.path(), 32);
    let bpm = Arc::new(bpm);

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let bpm = Arc::clone(&bpm);
            let schema = Arc::clone(&schema);
            thread::spawn(move || {
                let mut deadlocks = 0;
                for i in 0..25 {
                    loop {
                        let txn = Transaction::begin();
                        let mut tuple = row(&schema, t * 100 + i);
                        match bpm.insert_tuple(txn.id(), table_id, &mut tuple) {
                            Ok(_) => {
                                txn.commit(&bpm).unwrap();
                                break;
                            }
                            Err(e) if e.is_transaction_abort() => {
                                deadlocks += 1;
                                txn.abort(&bpm).unwrap();
                            }
                            Err(e) => panic!("insert failed: {e}"),
                        }
                    }
                }
                deadlocks
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let mut ids: Vec<_> = scan(&bpm, table_id).iter().map(id_of).collect();
    ids.sort_unstable();
    let mut expected: Vec<_> = (0..4).flat_map(|t| (0..25).map(move |i| t * 100 + i)).collect();
    expected.sort_unstable();
    assert_eq!(ids, expected);
    assert_eq!(bpm.catalog().table(table_id).unwrap().num_pages().unwrap(), 5);
}
