use std::sync::Arc;

use granite::executor::{Executor, SeqScan};
use granite::Database;
use substrate::field::{Field, FieldType};
use substrate::heap_file::HeapFile;
use substrate::transaction::TransactionId;
use substrate::tuple::{Tuple, TupleDesc};
use tempfile::{tempdir, TempDir};

/// A database over a temp directory. The directory lives as long as the
/// fixture so every heap file and the log survive until the test ends.
pub struct TestDb {
    pub db: Database,
    pub dir: TempDir,
}

pub fn setup() -> TestDb {
    let dir = tempdir().unwrap();
    let db = Database::new(dir.path().join("db.log")).unwrap();
    TestDb { db, dir }
}

impl TestDb {
    /// Creates an empty table and registers it. The first column is the
    /// primary key.
    pub fn create_table(&self, name: &str, desc: TupleDesc) -> u32 {
        let desc = Arc::new(desc);
        let pkey = desc.field_name(0).unwrap_or("").to_string();
        let file = HeapFile::open(self.dir.path().join(format!("{}.dat", name)), desc).unwrap();
        self.db.catalog().add_table(Arc::new(file), name, &pkey)
    }

    /// Inserts the rows under `tx` through the buffer pool.
    pub fn insert_rows(&self, tx: TransactionId, table_id: u32, rows: Vec<Vec<Field>>) {
        let desc = self.db.catalog().desc(table_id).unwrap();
        for fields in rows {
            let tuple = Tuple::new(desc.clone(), fields).unwrap();
            self.db
                .buffer_pool()
                .insert_tuple(tx, table_id, tuple)
                .unwrap();
        }
    }

    /// Scans the whole table under `tx`.
    pub fn scan_all(&self, tx: TransactionId, table_id: u32) -> Vec<Tuple> {
        let mut scan = SeqScan::new(&self.db, tx, table_id, None).unwrap();
        scan.open().unwrap();
        let mut out = Vec::new();
        while let Some(t) = scan.next().unwrap() {
            out.push(t);
        }
        scan.close();
        out
    }
}

pub fn int_row(values: &[i32]) -> Vec<Field> {
    values.iter().map(|&v| Field::Int(v)).collect()
}

pub fn int_desc(names: &[&str]) -> TupleDesc {
    TupleDesc::named(names.iter().map(|&n| (FieldType::Int, n)).collect())
}

/// The rows of a tuple list as plain integer vectors, sorted, for
/// order-insensitive comparison.
pub fn as_sorted_ints(tuples: &[Tuple]) -> Vec<Vec<i32>> {
    let mut rows: Vec<Vec<i32>> = tuples
        .iter()
        .map(|t| {
            t.fields()
                .iter()
                .map(|f| match f {
                    Field::Int(v) => *v,
                    other => panic!("expected int field, got {:?}", other),
                })
                .collect()
        })
        .collect();
    rows.sort();
    rows
}
