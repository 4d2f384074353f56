//! Runs against a real Postgres. Point `FWCMDB_TEST_DATABASE_URL` at a
//! throwaway database and run with `--ignored`.

use fwcmdb::db::{ensure_schema, PgStore};
use fwcmdb::{Entry, EntryFields, Repository};
use postgres::{Client, NoTls};
use std::env;

fn client() -> Client {
    let url = env::var("FWCMDB_TEST_DATABASE_URL").expect("FWCMDB_TEST_DATABASE_URL not set");
    let mut client = Client::connect(&url, NoTls).unwrap();
    client.batch_execute("DROP TABLE IF EXISTS entries").unwrap();
    ensure_schema(&mut client).unwrap();
    client
}

fn entry(vmname: &str, comment: &str) -> Entry {
    Entry::construct(EntryFields {
        vmname: vmname.to_string(),
        comment: comment.to_string(),
        source: "10.0.0.0/24".to_string(),
        service: "SSH".to_string(),
        input_source: "manual".to_string(),
        ..EntryFields::default()
    })
    .unwrap()
}

#[test]
#[ignore]
fn postgres_roundtrip() {
    let repo = Repository::new(PgStore::new(client()));

    let id = repo.insert_or_get(&entry("web01", "rule1")).unwrap();
    assert_eq!(repo.insert_or_get(&entry("web01", "rule1")).unwrap(), id);
    repo.insert_or_get(&entry("db02", "rule2")).unwrap();

    let stored = repo.get_by_id(id).unwrap();
    assert_eq!(stored.vmname(), "web01");
    assert_eq!(stored.action(), "allow");
    assert_eq!(repo.get_all().unwrap().len(), 2);

    repo.delete_by_id(id).unwrap();
    repo.delete_by_id(id).unwrap();
    assert!(repo.get_by_id(id).unwrap_err().is_not_found());
    assert_eq!(repo.get_for_vmname("db02").unwrap().len(), 1);
}

/// Deterministic, poorly compressible text so the row cannot shrink below
/// the btree entry limit through TOAST compression.
fn noise(len: usize) -> String {
    let alphabet: Vec<char> = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789"
        .chars()
        .collect();
    let mut state: u64 = 0x9e37_79b9_7f4a_7c15;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            alphabet[(state % alphabet.len() as u64) as usize]
        })
        .collect()
}

#[test]
#[ignore]
fn postgres_long_comment_dedups() {
    let repo = Repository::new(PgStore::new(client()));
    let comment = noise(4000);

    let id = repo.insert_or_get(&entry("web01", &comment)).unwrap();
    assert_eq!(repo.insert_or_get(&entry("web01", &comment)).unwrap(), id);
    assert_eq!(repo.get_by_id(id).unwrap().comment(), comment);
    assert_eq!(repo.get_all().unwrap().len(), 1);
}
