//! Entry repository: deduplicated insert, lookups and deletion on top of a
//! `Store`.
//!
//! All store access goes through one mutex around the connection handle, so
//! the read-then-write in `insert_or_get` cannot interleave with another
//! caller in this process. Across processes the store's identity uniqueness
//! constraint makes a losing insert come back empty, and the winner's id is
//! looked up instead.

use crate::db::Store;
use crate::error::{Error, Result};
use crate::model::Entry;
use log::{debug, info};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

pub struct Repository {
    store: Mutex<Box<dyn Store>>,
}

impl Repository {
    pub fn new<S: Store + 'static>(store: S) -> Repository {
        Repository {
            store: Mutex::new(Box::new(store)),
        }
    }

    fn store(&self) -> Result<MutexGuard<'_, Box<dyn Store>>> {
        self.store
            .lock()
            .map_err(|_| Error::Store("store connection lock poisoned".into()))
    }

    pub fn find_id(&self, entry: &Entry) -> Result<i64> {
        let mut store = self.store()?;
        find_id(&mut **store, entry)
    }

    /// Returns the id of the row matching `entry`'s identity fields, writing
    /// a new row only when none exists yet.
    pub fn insert_or_get(&self, entry: &Entry) -> Result<i64> {
        let mut store = self.store()?;
        match find_id(&mut **store, entry) {
            Ok(id) => return Ok(id),
            Err(Error::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        info!("inserting entry {:?}", entry);
        match store.insert(entry)? {
            Some(id) => Ok(id),
            None => {
                debug!("insert of {:?} lost a race, resolving existing id", entry);
                find_id(&mut **store, entry).map_err(|e| match e {
                    Error::NotFound(_) => Error::Store(
                        "insert conflicted but the conflicting row is gone".into(),
                    ),
                    other => other,
                })
            }
        }
    }

    pub fn get_by_id(&self, id: i64) -> Result<Entry> {
        let mut store = self.store()?;
        get_by_id(&mut **store, id)
    }

    /// Resolves `entry` to its id, then fetches that row.
    pub fn get(&self, entry: &Entry) -> Result<Entry> {
        let mut store = self.store()?;
        let id = find_id(&mut **store, entry)?;
        get_by_id(&mut **store, id)
    }

    /// Every entry, grouped by vmname in first-seen order. Within a group the
    /// store's row order is kept.
    pub fn get_all(&self) -> Result<Vec<Entry>> {
        let rows = self.store()?.fetch_all()?;
        if rows.is_empty() {
            return Err(Error::not_found("No entries found"));
        }

        let mut groups: Vec<Vec<Entry>> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for row in rows {
            let entry = Entry::decode_row(row);
            match index.get(entry.vmname()) {
                Some(&i) => groups[i].push(entry),
                None => {
                    index.insert(entry.vmname().to_string(), groups.len());
                    groups.push(vec![entry]);
                }
            }
        }
        Ok(groups.into_iter().flatten().collect())
    }

    pub fn get_for_vmname(&self, vmname: &str) -> Result<Vec<Entry>> {
        let mut store = self.store()?;
        get_for_vmname(&mut **store, vmname)
    }

    /// Deleting an id that does not exist is not an error.
    pub fn delete_by_id(&self, id: i64) -> Result<()> {
        let mut store = self.store()?;
        delete_by_id(&mut **store, id)
    }

    /// Deletes every entry of `vmname` and returns what was removed.
    pub fn delete_for_vmname(&self, vmname: &str) -> Result<Vec<Entry>> {
        let mut store = self.store()?;
        let entries = get_for_vmname(&mut **store, vmname)?;
        for id in entries.iter().filter_map(Entry::id) {
            delete_by_id(&mut **store, id)?;
        }
        Ok(entries)
    }

    /// Deletes entry `id`, but only if it belongs to `vmname`. On a mismatch
    /// the row is left alone.
    pub fn delete_checked(&self, vmname: &str, id: i64) -> Result<()> {
        let mut store = self.store()?;
        let entry = get_by_id(&mut **store, id)?;
        if entry.vmname() != vmname {
            return Err(Error::IdentityMismatch {
                id,
                expected: vmname.to_string(),
                actual: entry.vmname().to_string(),
            });
        }
        delete_by_id(&mut **store, id)
    }
}

fn find_id(store: &mut dyn Store, entry: &Entry) -> Result<i64> {
    match store.find_id(entry)? {
        Some(id) => {
            debug!("entry {:?} exists as {}", entry, id);
            Ok(id)
        }
        None => {
            debug!("entry {:?} doesn't exist", entry);
            Err(Error::not_found("Entry not found"))
        }
    }
}

fn get_by_id(store: &mut dyn Store, id: i64) -> Result<Entry> {
    match store.fetch_by_id(id)? {
        Some(row) => Ok(Entry::decode_row(row)),
        None => {
            debug!("entry id {} doesn't exist", id);
            Err(Error::not_found("Entry not found"))
        }
    }
}

fn get_for_vmname(store: &mut dyn Store, vmname: &str) -> Result<Vec<Entry>> {
    let rows = store.fetch_by_vmname(vmname)?;
    if rows.is_empty() {
        return Err(Error::not_found(format!("No entries found for {}", vmname)));
    }
    Ok(rows.into_iter().map(Entry::decode_row).collect())
}

fn delete_by_id(store: &mut dyn Store, id: i64) -> Result<()> {
    let deleted = store.delete_by_id(id)?;
    info!("deleted entry id {} ({} row(s))", id, deleted);
    Ok(())
}
