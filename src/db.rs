use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::model::{Entry, Row};
use log::info;
use postgres::{Client, NoTls};

/// Blocking query interface the repository runs against. Implementations
/// deal in raw rows; deduplication and not-found semantics live in
/// `Repository`.
pub trait Store: Send {
    /// Id of the first row whose six identity fields equal `entry`'s.
    fn find_id(&mut self, entry: &Entry) -> Result<Option<i64>>;

    /// Writes a new row and returns its id, or `None` when the row was
    /// rejected by the identity uniqueness constraint.
    fn insert(&mut self, entry: &Entry) -> Result<Option<i64>>;

    fn fetch_by_id(&mut self, id: i64) -> Result<Option<Row>>;

    fn fetch_all(&mut self) -> Result<Vec<Row>>;

    fn fetch_by_vmname(&mut self, vmname: &str) -> Result<Vec<Row>>;

    /// Returns the number of rows removed.
    fn delete_by_id(&mut self, id: i64) -> Result<u64>;
}

// The CHECKs mirror the model validators. Uniqueness over the identity
// fields is enforced on a digest, since a btree entry over the raw text is
// capped at ~2.7 KB and the free-text fields have no length limit. Hashing
// each field separately keeps field boundaries unambiguous.
const CREATE_ENTRIES: &str = "CREATE TABLE IF NOT EXISTS entries(
    id              BIGSERIAL PRIMARY KEY,
    vmname          TEXT NOT NULL CHECK (vmname ~ '^[a-zA-Z0-9_-]+$'),
    comment         TEXT NOT NULL,
    source          TEXT NOT NULL,
    service         TEXT NOT NULL,
    action          TEXT NOT NULL DEFAULT 'allow' CHECK (action IN ('allow', 'reject')),
    input_source    TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS entries_identity ON entries (
    md5(md5(vmname) || md5(comment) || md5(source) ||
        md5(service) || md5(action) || md5(input_source))
)";

const FIND_ID: &str = "SELECT id FROM entries WHERE
    vmname = $1 AND
    comment = $2 AND
    source = $3 AND
    service = $4 AND
    action = $5 AND
    input_source = $6
    ORDER BY id
    LIMIT 1";

const INSERT: &str = "INSERT INTO entries(vmname, comment, source, service, action, input_source)
    VALUES($1, $2, $3, $4, $5, $6)
    ON CONFLICT DO NOTHING
    RETURNING id";

const SELECT_BY_ID: &str = "SELECT id, vmname, comment, source, service, action, input_source
    FROM entries WHERE id = $1";

const SELECT_ALL: &str = "SELECT id, vmname, comment, source, service, action, input_source
    FROM entries";

const SELECT_BY_VMNAME: &str = "SELECT id, vmname, comment, source, service, action, input_source
    FROM entries WHERE vmname = $1";

const DELETE_BY_ID: &str = "DELETE FROM entries WHERE id = $1";

/// Connects to Postgres and makes sure the `entries` table and its identity
/// index exist.
pub fn init(config: &DatabaseConfig) -> Result<Client> {
    let mut client = connect(config)?;
    ensure_schema(&mut client)?;
    Ok(client)
}

pub fn connect(config: &DatabaseConfig) -> Result<Client> {
    info!(
        "connecting to postgres at {}:{}/{} as {}",
        config.host, config.port, config.name, config.username
    );
    let client = postgres::Config::new()
        .host(&config.host)
        .port(config.port)
        .user(&config.username)
        .password(config.password.as_str())
        .dbname(&config.name)
        .connect(NoTls)?;
    Ok(client)
}

pub fn ensure_schema(client: &mut Client) -> Result<()> {
    client.batch_execute(CREATE_ENTRIES)?;
    Ok(())
}

/// `Store` over a single long-lived Postgres connection. Every statement
/// runs outside an explicit transaction, so each one commits on its own.
pub struct PgStore {
    client: Client,
}

impl PgStore {
    pub fn new(client: Client) -> PgStore {
        PgStore { client }
    }
}

fn decode(row: &postgres::Row) -> Result<Row> {
    Ok((
        row.try_get(0)?,
        row.try_get(1)?,
        row.try_get(2)?,
        row.try_get(3)?,
        row.try_get(4)?,
        row.try_get(5)?,
        row.try_get(6)?,
    ))
}

impl Store for PgStore {
    fn find_id(&mut self, entry: &Entry) -> Result<Option<i64>> {
        let [vmname, comment, source, service, action, input_source] = entry.identity();
        let rows = self.client.query(
            FIND_ID,
            &[&vmname, &comment, &source, &service, &action, &input_source],
        )?;
        match rows.first() {
            Some(row) => Ok(Some(row.try_get(0)?)),
            None => Ok(None),
        }
    }

    fn insert(&mut self, entry: &Entry) -> Result<Option<i64>> {
        let [vmname, comment, source, service, action, input_source] = entry.identity();
        let row = self.client.query_opt(
            INSERT,
            &[&vmname, &comment, &source, &service, &action, &input_source],
        )?;
        match row {
            Some(row) => Ok(Some(row.try_get(0)?)),
            None => Ok(None),
        }
    }

    fn fetch_by_id(&mut self, id: i64) -> Result<Option<Row>> {
        match self.client.query_opt(SELECT_BY_ID, &[&id])? {
            Some(row) => Ok(Some(decode(&row)?)),
            None => Ok(None),
        }
    }

    fn fetch_all(&mut self) -> Result<Vec<Row>> {
        self.client
            .query(SELECT_ALL, &[])?
            .iter()
            .map(decode)
            .collect()
    }

    fn fetch_by_vmname(&mut self, vmname: &str) -> Result<Vec<Row>> {
        self.client
            .query(SELECT_BY_VMNAME, &[&vmname])?
            .iter()
            .map(decode)
            .collect()
    }

    fn delete_by_id(&mut self, id: i64) -> Result<u64> {
        Ok(self.client.execute(DELETE_BY_ID, &[&id])?)
    }
}
