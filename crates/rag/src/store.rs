use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, bail, Context, Result};
use bytemuck::{cast_slice, pod_collect_to_vec};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq)]
pub struct IndexedRecord {
    pub id: i64,
    pub vector: Vec<f32>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: i64,
    pub text: String,
    pub score: f32,
}

/// A named collection of `(id, vector, text)` records searchable by cosine
/// similarity.
pub trait VectorStore: Send + Sync {
    fn has_collection(&self) -> Result<bool>;
    fn drop_collection(&self) -> Result<()>;
    fn create_collection(&self, dimension: usize) -> Result<()>;
    fn insert(&self, records: &[IndexedRecord]) -> Result<usize>;
    /// Best `limit` records, highest score first; equal scores by ascending id.
    fn search(&self, query: &[f32], limit: usize) -> Result<Vec<SearchHit>>;
    fn count(&self) -> Result<usize>;
}

/// SQLite backed store holding one collection.
pub struct SqliteVectorStore {
    path: PathBuf,
    collection: String,
    conn: Mutex<Connection>,
}

impl SqliteVectorStore {
    pub fn open<P: AsRef<Path>>(path: P, collection: impl Into<String>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(&path)
            .with_context(|| format!("failed to open vector store {}", path.display()))?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                dimension INTEGER NOT NULL,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS records (
                collection TEXT NOT NULL,
                id INTEGER NOT NULL,
                text TEXT NOT NULL,
                vector BLOB NOT NULL,
                PRIMARY KEY (collection, id)
            );
            "#,
        )?;
        Ok(Self {
            path,
            collection: collection.into(),
            conn: Mutex::new(conn),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| anyhow!("vector store connection poisoned"))?;
        f(&mut conn)
    }

    fn dimension(conn: &Connection, collection: &str) -> Result<Option<usize>> {
        let dimension: Option<i64> = conn
            .query_row(
                "SELECT dimension FROM collections WHERE name = ?1",
                [collection],
                |row| row.get(0),
            )
            .optional()?;
        Ok(dimension.map(|d| d as usize))
    }
}

impl VectorStore for SqliteVectorStore {
    fn has_collection(&self) -> Result<bool> {
        self.with_conn(|conn| Ok(Self::dimension(conn, &self.collection)?.is_some()))
    }

    fn drop_collection(&self) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM records WHERE collection = ?1", [&self.collection])?;
            tx.execute("DELETE FROM collections WHERE name = ?1", [&self.collection])?;
            tx.commit()?;
            Ok(())
        })
    }

    fn create_collection(&self, dimension: usize) -> Result<()> {
        if dimension == 0 {
            bail!("collection dimension must be positive");
        }
        self.with_conn(|conn| {
            if Self::dimension(conn, &self.collection)?.is_some() {
                bail!("collection {} already exists", self.collection);
            }
            conn.execute(
                "INSERT INTO collections (name, dimension) VALUES (?1, ?2)",
                params![self.collection, dimension as i64],
            )?;
            Ok(())
        })
    }

    fn insert(&self, records: &[IndexedRecord]) -> Result<usize> {
        self.with_conn(|conn| {
            let dimension = Self::dimension(conn, &self.collection)?
                .ok_or_else(|| anyhow!("collection {} does not exist", self.collection))?;
            if let Some(bad) = records.iter().find(|r| r.vector.len() != dimension) {
                bail!(
                    "record {} has {} dimensions, collection {} expects {}",
                    bad.id,
                    bad.vector.len(),
                    self.collection,
                    dimension
                );
            }
            let tx = conn.transaction()?;
            for record in records {
                tx.execute(
                    "INSERT INTO records (collection, id, text, vector) VALUES (?1, ?2, ?3, ?4)",
                    params![
                        self.collection,
                        record.id,
                        record.text,
                        cast_slice::<f32, u8>(&record.vector)
                    ],
                )?;
            }
            tx.commit()?;
            Ok(records.len())
        })
    }

    fn search(&self, query: &[f32], limit: usize) -> Result<Vec<SearchHit>> {
        self.with_conn(|conn| {
            let dimension = Self::dimension(conn, &self.collection)?
                .ok_or_else(|| anyhow!("collection {} does not exist", self.collection))?;
            if query.len() != dimension {
                bail!(
                    "query has {} dimensions, collection {} expects {}",
                    query.len(),
                    self.collection,
                    dimension
                );
            }
            let mut stmt =
                conn.prepare("SELECT id, text, vector FROM records WHERE collection = ?1")?;
            let mut rows = stmt.query([&self.collection])?;
            let mut hits = Vec::new();
            while let Some(row) = rows.next()? {
                let blob: Vec<u8> = row.get(2)?;
                if blob.len() % std::mem::size_of::<f32>() != 0 {
                    bail!("invalid vector blob in collection {}", self.collection);
                }
                let vector: Vec<f32> = pod_collect_to_vec(&blob);
                hits.push(SearchHit {
                    id: row.get(0)?,
                    text: row.get(1)?,
                    score: cosine_similarity(query, &vector),
                });
            }
            hits.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(Ordering::Equal)
                    .then(a.id.cmp(&b.id))
            });
            hits.truncate(limit);
            Ok(hits)
        })
    }

    fn count(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM records WHERE collection = ?1",
                [&self.collection],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut a_norm = 0.0f32;
    let mut b_norm = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        a_norm += x * x;
        b_norm += y * y;
    }
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    dot / (a_norm.sqrt() * b_norm.sqrt())
}
