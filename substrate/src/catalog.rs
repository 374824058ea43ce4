//! The table registry: maps table ids to their heap files and names.

use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::error::{DbError, Result};
use crate::field::FieldType;
use crate::heap_file::HeapFile;
use crate::tuple::TupleDesc;

/// One registered table.
#[derive(Debug, Clone)]
pub struct Table {
    pub file: Arc<HeapFile>,
    pub name: String,
    pub pkey: String,
}

#[derive(Debug, Default)]
struct CatalogState {
    tables: HashMap<u32, Table>,
    by_name: HashMap<String, u32>,
}

/// The registry of tables known to one database instance.
///
/// The catalog lives as long as the database context that owns it; tests
/// build a fresh one per case.
#[derive(Debug, Default)]
pub struct Catalog {
    state: Mutex<CatalogState>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table, replacing any existing table with the same name or
    /// id. Returns the table id.
    pub fn add_table(&self, file: Arc<HeapFile>, name: &str, pkey: &str) -> u32 {
        let id = file.id();
        let mut state = self.state.lock().unwrap();
        if let Some(old_id) = state.by_name.remove(name) {
            state.tables.remove(&old_id);
        }
        state.by_name.insert(name.to_string(), id);
        state.tables.insert(
            id,
            Table {
                file,
                name: name.to_string(),
                pkey: pkey.to_string(),
            },
        );
        id
    }

    pub fn table_id(&self, name: &str) -> Result<u32> {
        let state = self.state.lock().unwrap();
        state
            .by_name
            .get(name)
            .copied()
            .ok_or_else(|| DbError::NoSuchElement(format!("table named '{}'", name)))
    }

    pub fn file(&self, table_id: u32) -> Result<Arc<HeapFile>> {
        let state = self.state.lock().unwrap();
        state
            .tables
            .get(&table_id)
            .map(|table| table.file.clone())
            .ok_or_else(|| DbError::NoSuchElement(format!("table id {}", table_id)))
    }

    pub fn table_name(&self, table_id: u32) -> Result<String> {
        let state = self.state.lock().unwrap();
        state
            .tables
            .get(&table_id)
            .map(|table| table.name.clone())
            .ok_or_else(|| DbError::NoSuchElement(format!("table id {}", table_id)))
    }

    pub fn primary_key(&self, table_id: u32) -> Result<String> {
        let state = self.state.lock().unwrap();
        state
            .tables
            .get(&table_id)
            .map(|table| table.pkey.clone())
            .ok_or_else(|| DbError::NoSuchElement(format!("table id {}", table_id)))
    }

    pub fn desc(&self, table_id: u32) -> Result<Arc<TupleDesc>> {
        Ok(self.file(table_id)?.desc().clone())
    }

    pub fn table_ids(&self) -> Vec<u32> {
        let state = self.state.lock().unwrap();
        state.tables.keys().copied().collect()
    }

    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        state.tables.clear();
        state.by_name.clear();
    }

    /// Loads table definitions from a schema file.
    ///
    /// One table per line, `tableName (fieldName type [pk], …)`, where type
    /// is `int` or `string` and a trailing `pk` marks the primary key. Each
    /// table's heap file is `<name>.dat` next to the schema file. Returns the
    /// names of the loaded tables.
    pub fn load_schema<P: AsRef<Path>>(&self, path: P) -> Result<Vec<String>> {
        let path_ref = path.as_ref();
        let base_dir = path_ref.parent().unwrap_or_else(|| Path::new("."));
        let reader = BufReader::new(std::fs::File::open(path_ref)?);
        let mut loaded = Vec::new();

        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let open_paren = line.find('(').ok_or_else(|| {
                DbError::Generic(format!("malformed schema line: {}", line))
            })?;
            let close_paren = line.rfind(')').ok_or_else(|| {
                DbError::Generic(format!("malformed schema line: {}", line))
            })?;
            let name = line[..open_paren].trim().to_string();
            let mut fields = Vec::new();
            let mut pkey = String::new();

            for decl in line[open_paren + 1..close_paren].split(',') {
                let tokens: Vec<&str> = decl.split_whitespace().collect();
                if tokens.len() < 2 {
                    return Err(DbError::Generic(format!(
                        "malformed field declaration: {}",
                        decl
                    )));
                }
                let field_type = match tokens[1].to_lowercase().as_str() {
                    "int" => FieldType::Int,
                    "string" => FieldType::Text,
                    other => {
                        return Err(DbError::Generic(format!("unknown field type: {}", other)))
                    }
                };
                if tokens.get(2).map(|t| t.to_lowercase()) == Some("pk".to_string()) {
                    pkey = tokens[0].to_string();
                }
                fields.push((field_type, tokens[0].to_string()));
            }

            let desc = Arc::new(TupleDesc::named(fields));
            let file = HeapFile::open(base_dir.join(format!("{}.dat", name)), desc)?;
            self.add_table(Arc::new(file), &name, &pkey);
            loaded.push(name);
        }
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn sample_file(dir: &Path, name: &str) -> Arc<HeapFile> {
        let desc = Arc::new(TupleDesc::named(vec![(FieldType::Int, "a")]));
        Arc::new(HeapFile::open(dir.join(format!("{}.dat", name)), desc).unwrap())
    }

    #[test]
    fn add_and_resolve_both_directions() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::new();
        let file = sample_file(dir.path(), "users");
        let id = catalog.add_table(file.clone(), "users", "a");

        assert_eq!(catalog.table_id("users").unwrap(), id);
        assert_eq!(catalog.file(id).unwrap().id(), file.id());
        assert_eq!(catalog.table_name(id).unwrap(), "users");
        assert_eq!(catalog.primary_key(id).unwrap(), "a");
    }

    #[test]
    fn missing_lookups_error() {
        let catalog = Catalog::new();
        assert!(matches!(
            catalog.table_id("ghost"),
            Err(DbError::NoSuchElement(_))
        ));
        assert!(matches!(catalog.file(42), Err(DbError::NoSuchElement(_))));
    }

    #[test]
    fn readd_replaces_by_name() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::new();
        catalog.add_table(sample_file(dir.path(), "first"), "t", "a");
        let second = sample_file(dir.path(), "second");
        let id = catalog.add_table(second, "t", "a");

        assert_eq!(catalog.table_id("t").unwrap(), id);
        assert_eq!(catalog.table_ids().len(), 1);
    }

    #[test]
    fn load_schema_parses_types_and_pk() {
        let dir = tempdir().unwrap();
        let schema_path = dir.path().join("catalog.txt");
        let mut f = std::fs::File::create(&schema_path).unwrap();
        writeln!(f, "emp (id int pk, name string, dept int)").unwrap();
        writeln!(f, "dept (id int pk, label string)").unwrap();
        drop(f);

        let catalog = Catalog::new();
        let loaded = catalog.load_schema(&schema_path).unwrap();
        assert_eq!(loaded, vec!["emp".to_string(), "dept".to_string()]);

        let emp_id = catalog.table_id("emp").unwrap();
        let desc = catalog.desc(emp_id).unwrap();
        assert_eq!(desc.num_fields(), 3);
        assert_eq!(desc.field_type(1), FieldType::Text);
        assert_eq!(catalog.primary_key(emp_id).unwrap(), "id");
        assert!(dir.path().join("emp.dat").exists());
    }
}
