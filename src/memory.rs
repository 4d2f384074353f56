use crate::db::Store;
use crate::error::Result;
use crate::model::{Entry, Row};

/// In-process `Store` for tests and `--in-memory` runs. Applies the same
/// identity uniqueness rule as the Postgres table and hands out ids from a
/// monotonically increasing counter, never reusing one.
#[derive(Debug)]
pub struct MemoryStore {
    rows: Vec<Row>,
    next_id: i64,
}

impl Default for MemoryStore {
    fn default() -> MemoryStore {
        MemoryStore {
            rows: Vec::new(),
            next_id: 1,
        }
    }
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn identity(row: &Row) -> [&str; 6] {
    [&row.1, &row.2, &row.3, &row.4, &row.5, &row.6]
}

impl Store for MemoryStore {
    fn find_id(&mut self, entry: &Entry) -> Result<Option<i64>> {
        let wanted = entry.identity();
        Ok(self
            .rows
            .iter()
            .find(|row| identity(row) == wanted)
            .map(|row| row.0))
    }

    fn insert(&mut self, entry: &Entry) -> Result<Option<i64>> {
        if self.find_id(entry)?.is_some() {
            return Ok(None);
        }
        let id = self.next_id;
        self.next_id += 1;
        self.rows.push((
            id,
            entry.vmname().to_string(),
            entry.comment().to_string(),
            entry.source().to_string(),
            entry.service().to_string(),
            entry.action().to_string(),
            entry.input_source().to_string(),
        ));
        Ok(Some(id))
    }

    fn fetch_by_id(&mut self, id: i64) -> Result<Option<Row>> {
        Ok(self.rows.iter().find(|row| row.0 == id).cloned())
    }

    fn fetch_all(&mut self) -> Result<Vec<Row>> {
        Ok(self.rows.clone())
    }

    fn fetch_by_vmname(&mut self, vmname: &str) -> Result<Vec<Row>> {
        Ok(self
            .rows
            .iter()
            .filter(|row| row.1 == vmname)
            .cloned()
            .collect())
    }

    fn delete_by_id(&mut self, id: i64) -> Result<u64> {
        let before = self.rows.len();
        self.rows.retain(|row| row.0 != id);
        Ok((before - self.rows.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntryFields;

    fn entry(vmname: &str, comment: &str) -> Entry {
        Entry::construct(EntryFields {
            vmname: vmname.to_string(),
            comment: comment.to_string(),
            ..EntryFields::default()
        })
        .unwrap()
    }

    #[test]
    fn insert_rejects_identity_duplicates() {
        let mut store = MemoryStore::new();
        assert_eq!(store.insert(&entry("web01", "a")).unwrap(), Some(1));
        assert_eq!(store.insert(&entry("web01", "a")).unwrap(), None);
        assert_eq!(store.insert(&entry("web01", "b")).unwrap(), Some(2));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn ids_are_not_reused_after_delete() {
        let mut store = MemoryStore::new();
        let id = store.insert(&entry("web01", "a")).unwrap().unwrap();
        assert_eq!(store.delete_by_id(id).unwrap(), 1);
        assert_eq!(store.delete_by_id(id).unwrap(), 0);
        assert_eq!(store.insert(&entry("web01", "a")).unwrap(), Some(id + 1));
    }
}
