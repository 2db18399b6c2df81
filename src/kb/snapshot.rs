use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use tracing::info;

use crate::error::KbError;
use crate::model::Passage;
use crate::semantic::{decode_embedding_blob, encode_embedding_blob};
use crate::util::{ensure_parent_directory, now_utc_string};

use super::index::GuidelineIndex;

const SNAPSHOT_SCHEMA_VERSION: &str = "1";

/// Summary of a snapshot, read without decoding its vectors.
#[derive(Debug, Clone)]
pub struct SnapshotInfo {
    pub model_id: String,
    pub dimensions: usize,
    pub passage_count: usize,
    pub built_at: String,
}

fn snapshot_error(path: &Path) -> impl Fn(rusqlite::Error) -> KbError + '_ {
    move |err| KbError::Snapshot {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

/// Writes the whole index to a fresh SQLite file, replacing any previous snapshot.
pub fn write_snapshot(path: &Path, index: &GuidelineIndex) -> Result<(), KbError> {
    let io_error = |reason: String| KbError::Snapshot {
        path: path.to_path_buf(),
        reason,
    };
    ensure_parent_directory(path).map_err(|err| io_error(format!("{err:#}")))?;

    let staging_path = staging_path_for(path);
    if staging_path.exists() {
        fs::remove_file(&staging_path).map_err(|err| io_error(err.to_string()))?;
    }

    {
        let mut connection = Connection::open(&staging_path).map_err(snapshot_error(path))?;
        connection
            .execute_batch(
                "
                CREATE TABLE kb_meta(
                  key TEXT PRIMARY KEY,
                  value TEXT NOT NULL
                );
                CREATE TABLE passages(
                  chunk_index INTEGER PRIMARY KEY,
                  text TEXT NOT NULL,
                  embedding BLOB NOT NULL
                );
                ",
            )
            .map_err(snapshot_error(path))?;

        let tx = connection.transaction().map_err(snapshot_error(path))?;
        {
            let mut meta = tx
                .prepare("INSERT INTO kb_meta(key, value) VALUES(?1, ?2)")
                .map_err(snapshot_error(path))?;
            for (key, value) in [
                ("schema_version", SNAPSHOT_SCHEMA_VERSION.to_string()),
                ("model_id", index.model_id().to_string()),
                ("dimensions", index.dimensions().to_string()),
                ("built_at", now_utc_string()),
            ] {
                meta.execute(params![key, value])
                    .map_err(snapshot_error(path))?;
            }

            let mut insert = tx
                .prepare("INSERT INTO passages(chunk_index, text, embedding) VALUES(?1, ?2, ?3)")
                .map_err(snapshot_error(path))?;
            for (position, passage) in index.passages().iter().enumerate() {
                let vector = index.vector(position).unwrap_or_default();
                insert
                    .execute(params![
                        passage.chunk_index as i64,
                        passage.text,
                        encode_embedding_blob(vector),
                    ])
                    .map_err(snapshot_error(path))?;
            }
        }
        tx.commit().map_err(snapshot_error(path))?;
    }

    fs::rename(&staging_path, path).map_err(|err| io_error(err.to_string()))?;
    info!(
        path = %path.display(),
        passages = index.len(),
        "wrote guideline index snapshot"
    );
    Ok(())
}

/// Loads a snapshot; a missing file is `Ok(None)`.
pub fn read_snapshot(path: &Path) -> Result<Option<GuidelineIndex>, KbError> {
    let Some(connection) = open_snapshot(path)? else {
        return Ok(None);
    };
    let info = read_info(&connection, path)?;

    let mut statement = connection
        .prepare("SELECT chunk_index, text, embedding FROM passages ORDER BY chunk_index ASC")
        .map_err(snapshot_error(path))?;
    let mut rows = statement.query([]).map_err(snapshot_error(path))?;

    let mut passages = Vec::<Passage>::with_capacity(info.passage_count);
    let mut vectors = Vec::<Vec<f32>>::with_capacity(info.passage_count);
    while let Some(row) = rows.next().map_err(snapshot_error(path))? {
        let chunk_index = row.get::<_, i64>(0).map_err(snapshot_error(path))? as usize;
        let blob = row.get::<_, Vec<u8>>(2).map_err(snapshot_error(path))?;
        let vector = decode_embedding_blob(&blob, info.dimensions).ok_or_else(|| {
            KbError::Snapshot {
                path: path.to_path_buf(),
                reason: format!(
                    "embedding for chunk {chunk_index} does not have {} dimensions",
                    info.dimensions
                ),
            }
        })?;
        passages.push(Passage {
            chunk_index,
            text: row.get(1).map_err(snapshot_error(path))?,
        });
        vectors.push(vector);
    }

    GuidelineIndex::from_parts(&info.model_id, info.dimensions, passages, vectors).map(Some)
}

pub fn read_snapshot_info(path: &Path) -> Result<Option<SnapshotInfo>, KbError> {
    match open_snapshot(path)? {
        Some(connection) => read_info(&connection, path).map(Some),
        None => Ok(None),
    }
}

fn open_snapshot(path: &Path) -> Result<Option<Connection>, KbError> {
    if !path.is_file() {
        return Ok(None);
    }
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map(Some)
    .map_err(snapshot_error(path))
}

fn read_info(connection: &Connection, path: &Path) -> Result<SnapshotInfo, KbError> {
    let schema_version = read_meta(connection, path, "schema_version")?;
    if schema_version != SNAPSHOT_SCHEMA_VERSION {
        return Err(KbError::Snapshot {
            path: path.to_path_buf(),
            reason: format!("unsupported snapshot schema version '{schema_version}'"),
        });
    }

    let dimensions = read_meta(connection, path, "dimensions")?
        .parse::<usize>()
        .map_err(|err| KbError::Snapshot {
            path: path.to_path_buf(),
            reason: format!("invalid dimensions: {err}"),
        })?;
    let passage_count = connection
        .query_row("SELECT COUNT(*) FROM passages", [], |row| row.get::<_, i64>(0))
        .map_err(snapshot_error(path))?;

    Ok(SnapshotInfo {
        model_id: read_meta(connection, path, "model_id")?,
        dimensions,
        passage_count: passage_count.max(0) as usize,
        built_at: read_meta(connection, path, "built_at")?,
    })
}

fn read_meta(connection: &Connection, path: &Path, key: &str) -> Result<String, KbError> {
    connection
        .query_row(
            "SELECT value FROM kb_meta WHERE key = ?1 LIMIT 1",
            [key],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(snapshot_error(path))?
        .ok_or_else(|| KbError::Snapshot {
            path: path.to_path_buf(),
            reason: format!("missing metadata key '{key}'"),
        })
}

fn staging_path_for(path: &Path) -> PathBuf {
    let mut staging = path.as_os_str().to_os_string();
    staging.push(".partial");
    PathBuf::from(staging)
}
