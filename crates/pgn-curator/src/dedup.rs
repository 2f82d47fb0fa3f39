//! 実行をまたぐ重複排除ストア
//!
//! 採用済みレコードの [`ContentHash`] を永続化する。書き込みはトランザクション
//! にまとめて一定件数ごと・`flush()`・`close()` でコミットする。
//! コミット前にプロセスが落ちると、最後のコミット以降に追加したハッシュは
//! 次回「未出現」と見なされる（出力側は at-least-once、exactly-once ではない）。

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};

use crate::config::DEFAULT_COMMIT_INTERVAL;
use crate::error::{CurateError, Result};
use crate::hash::ContentHash;

/// 重複排除ストアの操作
pub trait DedupStore {
    fn contains(&self, hash: &ContentHash) -> Result<bool>;
    /// 既存なら何もしない。新規に追加したら `true`。
    fn insert(&mut self, hash: &ContentHash) -> Result<bool>;
    /// 保留中の追加を永続化する
    fn flush(&mut self) -> Result<()>;
    /// flush して解放する。以後の操作は想定しない。
    fn close(&mut self) -> Result<()>;
}

/// プロセス内だけのストア（埋め込み・テスト用）
#[derive(Debug, Default)]
pub struct MemoryDedupStore {
    set: HashSet<ContentHash>,
}

impl MemoryDedupStore {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn len(&self) -> usize {
        self.set.len()
    }
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }
}

impl DedupStore for MemoryDedupStore {
    fn contains(&self, hash: &ContentHash) -> Result<bool> {
        Ok(self.set.contains(hash))
    }
    fn insert(&mut self, hash: &ContentHash) -> Result<bool> {
        Ok(self.set.insert(*hash))
    }
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

const SEEN_DDL: &str = "CREATE TABLE IF NOT EXISTS seen (hash TEXT PRIMARY KEY);";

/// SQLite ファイルによる永続ストア（`seen(hash TEXT PRIMARY KEY)` の1テーブル）
pub struct SqliteDedupStore {
    conn: Connection,
    path: PathBuf,
    commit_interval: u64,
    pending: u64,
    in_tx: bool,
    read_only: bool,
}

impl SqliteDedupStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_interval(path, DEFAULT_COMMIT_INTERVAL)
    }

    /// `commit_interval` 件の追加ごとにコミットする（0 は 1 と同じ）
    pub fn open_with_interval<P: AsRef<Path>>(path: P, commit_interval: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let open_err = |source| CurateError::OpenDedup {
            path: path.clone(),
            source,
        };
        let conn = Connection::open(&path).map_err(open_err)?;
        // 耐久性よりスループット優先。WAL でコミット中の読み取りを許す。
        conn.pragma_update(None, "journal_mode", "WAL").map_err(open_err)?;
        conn.pragma_update(None, "synchronous", "OFF").map_err(open_err)?;
        conn.execute_batch(SEEN_DDL).map_err(open_err)?;
        Ok(Self {
            conn,
            path,
            commit_interval: commit_interval.max(1),
            pending: 0,
            in_tx: false,
            read_only: false,
        })
    }

    /// 参照専用で開く（dry-run 用）。ファイルには一切書き込まない。
    ///
    /// ファイルや `seen` テーブルが無ければ空のストアとして振る舞う。
    /// `insert` はエラーになる。
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let open_err = |source| CurateError::OpenDedup {
            path: path.clone(),
            source,
        };
        let mut conn = None;
        if path.exists() {
            let c = Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_ONLY)
                .map_err(open_err)?;
            if has_seen_table(&c).map_err(open_err)? {
                conn = Some(c);
            }
        }
        let conn = match conn {
            Some(c) => c,
            None => {
                log::info!("dedup: {} has no entries yet, treating as empty", path.display());
                let mem = Connection::open_in_memory().map_err(open_err)?;
                mem.execute_batch(SEEN_DDL).map_err(open_err)?;
                mem
            }
        };
        Ok(Self {
            conn,
            path,
            commit_interval: DEFAULT_COMMIT_INTERVAL,
            pending: 0,
            in_tx: false,
            read_only: true,
        })
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// コミット済み・未コミットを含む件数
    pub fn len(&self) -> Result<u64> {
        let n: i64 = self.conn.query_row("SELECT COUNT(*) FROM seen", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// 未コミットの追加件数
    pub fn pending(&self) -> u64 {
        self.pending
    }

    fn commit(&mut self) -> Result<()> {
        if self.in_tx {
            self.conn.execute_batch("COMMIT")?;
            self.in_tx = false;
            log::debug!("dedup: committed {} inserts to {}", self.pending, self.path.display());
        }
        self.pending = 0;
        Ok(())
    }
}

impl DedupStore for SqliteDedupStore {
    fn contains(&self, hash: &ContentHash) -> Result<bool> {
        let mut stmt = self.conn.prepare_cached("SELECT 1 FROM seen WHERE hash = ?1 LIMIT 1")?;
        let hit = stmt
            .query_row(params![hash.to_hex()], |_| Ok(()))
            .optional()?
            .is_some();
        Ok(hit)
    }

    fn insert(&mut self, hash: &ContentHash) -> Result<bool> {
        if self.read_only {
            return Err(CurateError::ReadOnlyDedup {
                path: self.path.clone(),
            });
        }
        if !self.in_tx {
            self.conn.execute_batch("BEGIN")?;
            self.in_tx = true;
        }
        let added = {
            let mut stmt = self.conn.prepare_cached("INSERT OR IGNORE INTO seen (hash) VALUES (?1)")?;
            stmt.execute(params![hash.to_hex()])? > 0
        };
        if added {
            self.pending += 1;
            if self.pending >= self.commit_interval {
                self.commit()?;
            }
        }
        Ok(added)
    }

    fn flush(&mut self) -> Result<()> {
        self.commit()
    }

    fn close(&mut self) -> Result<()> {
        if self.read_only {
            return Ok(());
        }
        self.commit()?;
        // WAL をメインDBへ書き戻しておく（失敗しても次回 open 時に回復する）
        if let Err(e) = self.conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);") {
            log::warn!("dedup: checkpoint failed for {}: {e}", self.path.display());
        }
        Ok(())
    }
}

fn has_seen_table(conn: &Connection) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'seen'",
        [],
        |_| Ok(()),
    )
    .optional()
    .map(|hit| hit.is_some())
}

impl Drop for SqliteDedupStore {
    fn drop(&mut self) {
        if self.in_tx {
            if let Err(e) = self.commit() {
                log::warn!("dedup: final commit failed for {}: {e}", self.path.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn h(s: &str) -> ContentHash {
        ContentHash::of_record(s)
    }

    #[test]
    fn memory_store_insert_is_idempotent() {
        let mut d = MemoryDedupStore::new();
        assert!(d.insert(&h("a")).unwrap());
        assert!(!d.insert(&h("a")).unwrap());
        assert!(d.contains(&h("a")).unwrap());
        assert!(!d.contains(&h("b")).unwrap());
        assert_eq!(d.len(), 1);
    }

    #[test]
    fn sqlite_store_sees_uncommitted_inserts() {
        let dir = tempfile::tempdir().unwrap();
        let mut d = SqliteDedupStore::open_with_interval(dir.path().join("seen.db"), 100).unwrap();
        assert!(d.insert(&h("x")).unwrap());
        assert_eq!(d.pending(), 1);
        assert!(d.contains(&h("x")).unwrap());
        assert!(!d.insert(&h("x")).unwrap());
        assert_eq!(d.pending(), 1);
        d.flush().unwrap();
        assert_eq!(d.pending(), 0);
        assert_eq!(d.len().unwrap(), 1);
    }

    #[test]
    fn sqlite_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen.db");
        {
            let mut d = SqliteDedupStore::open(&path).unwrap();
            d.insert(&h("game one")).unwrap();
            d.insert(&h("game two")).unwrap();
            d.close().unwrap();
        }
        let d = SqliteDedupStore::open(&path).unwrap();
        assert!(d.contains(&h("game one")).unwrap());
        assert!(d.contains(&h("  game   two ")).unwrap());
        assert!(!d.contains(&h("game three")).unwrap());
        assert_eq!(d.len().unwrap(), 2);
    }

    #[test]
    fn periodic_commit_resets_pending() {
        let dir = tempfile::tempdir().unwrap();
        let mut d = SqliteDedupStore::open_with_interval(dir.path().join("seen.db"), 2).unwrap();
        d.insert(&h("1")).unwrap();
        assert_eq!(d.pending(), 1);
        d.insert(&h("2")).unwrap();
        assert_eq!(d.pending(), 0);
        d.insert(&h("3")).unwrap();
        assert_eq!(d.pending(), 1);
    }

    #[test]
    fn read_only_open_of_missing_file_is_empty_and_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen.db");
        let mut d = SqliteDedupStore::open_read_only(&path).unwrap();
        assert!(d.is_read_only());
        assert!(!d.contains(&h("x")).unwrap());
        assert!(d.is_empty().unwrap());
        d.close().unwrap();
        drop(d);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn read_only_open_sees_entries_and_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen.db");
        {
            let mut d = SqliteDedupStore::open(&path).unwrap();
            d.insert(&h("game one")).unwrap();
            d.close().unwrap();
        }
        let before = fs::read(&path).unwrap();
        {
            let mut d = SqliteDedupStore::open_read_only(&path).unwrap();
            assert!(d.contains(&h("game one")).unwrap());
            assert!(matches!(d.insert(&h("game two")), Err(CurateError::ReadOnlyDedup { .. })));
            assert_eq!(d.len().unwrap(), 1);
            d.close().unwrap();
        }
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn open_fails_for_unwritable_location() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("missing-dir").join("seen.db");
        let err = SqliteDedupStore::open(&bad).err().unwrap();
        assert!(matches!(err, CurateError::OpenDedup { .. }));
    }
}
