use crate::shared::errors::{AppError, AppResult};
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

/// ロック待ちの最大時間
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// データベース接続を開き、テーブルを作成する
///
/// # 引数
/// * `database_path` - データベースファイルのパス（":memory:" でメモリDB）
///
/// # 戻り値
/// データベース接続、または失敗時はエラー
///
/// # 処理内容
/// 1. 親ディレクトリの確保
/// 2. データベース接続の開設
/// 3. 接続設定（外部キー・ロック待ち・WAL）
/// 4. テーブル作成
pub fn open_database(database_path: &str) -> AppResult<Connection> {
    if database_path == ":memory:" {
        return create_in_memory_connection();
    }

    if let Some(parent) = Path::new(database_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::configuration(format!("データディレクトリの作成に失敗: {e}"))
            })?;
            log::info!("データディレクトリを作成: {parent:?}");
        }
    }

    let conn = Connection::open(database_path)?;
    configure_connection(&conn)?;

    // 複数接続からの同時アクセスに備えてWALを使う
    let journal_mode: String =
        conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
    log::debug!("journal_mode={journal_mode}");

    create_tables(&conn)?;

    log::info!("データベースを初期化しました: {database_path}");

    Ok(conn)
}

/// テストやツール用のメモリ上のデータベース接続を作成する
pub fn create_in_memory_connection() -> AppResult<Connection> {
    let conn = Connection::open_in_memory()?;
    configure_connection(&conn)?;
    create_tables(&conn)?;
    Ok(conn)
}

/// 接続ごとの設定を適用する
pub fn configure_connection(conn: &Connection) -> AppResult<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(())
}

/// データベーステーブルを作成する
///
/// 何度実行しても同じ結果になる
pub fn create_tables(conn: &Connection) -> AppResult<()> {
    create_auth_tables(conn)?;
    create_clients_table(conn)?;
    create_project_tables(conn)?;
    create_expenses_table(conn)?;
    create_cash_receipts_table(conn)?;
    create_messages_table(conn)?;
    create_version_tables(conn)?;
    Ok(())
}

/// ユーザーとアクセストークンのテーブルを作成する
fn create_auth_tables(conn: &Connection) -> AppResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            is_staff INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS access_tokens (
            token_hash TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            expires_at TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_access_tokens_user ON access_tokens(user_id);",
    )?;
    Ok(())
}

/// 顧客テーブルを作成する
fn create_clients_table(conn: &Connection) -> AppResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS clients (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
            phone TEXT NOT NULL DEFAULT '',
            address TEXT NOT NULL DEFAULT '',
            budget TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            expenses_discussion_completed INTEGER NOT NULL DEFAULT 0,
            expenses_discussion_completed_at TEXT,
            expenses_version_count INTEGER NOT NULL DEFAULT 0 CHECK(expenses_version_count >= 0),
            payments_discussion_completed INTEGER NOT NULL DEFAULT 0,
            payments_discussion_completed_at TEXT,
            payments_version_count INTEGER NOT NULL DEFAULT 0 CHECK(payments_version_count >= 0),
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_clients_deleted ON clients(is_deleted);",
    )?;
    Ok(())
}

/// プロジェクトと進捗のテーブルを作成する
fn create_project_tables(conn: &Connection) -> AppResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS projects (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            client_id INTEGER NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            description TEXT,
            start_date TEXT,
            end_date TEXT,
            total_budget TEXT NOT NULL DEFAULT '0.00',
            status TEXT NOT NULL DEFAULT 'active' CHECK(status IN ('active', 'completed')),
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_projects_client ON projects(client_id);
        CREATE TABLE IF NOT EXISTS project_progress (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            project_id INTEGER NOT NULL UNIQUE REFERENCES projects(id) ON DELETE CASCADE,
            percentage INTEGER NOT NULL DEFAULT 0 CHECK(percentage BETWEEN 0 AND 100),
            updated_at TEXT NOT NULL
        );",
    )?;
    Ok(())
}

/// 経費テーブルを作成する
fn create_expenses_table(conn: &Connection) -> AppResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS expenses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            client_id INTEGER NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
            date TEXT NOT NULL,
            description TEXT NOT NULL,
            amount TEXT NOT NULL,
            bill_url TEXT,
            status TEXT NOT NULL DEFAULT 'pending' CHECK(status IN ('paid', 'pending', 'upcoming')),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_expenses_client ON expenses(client_id);
        CREATE INDEX IF NOT EXISTS idx_expenses_date ON expenses(date);",
    )?;
    Ok(())
}

/// 入金（キャッシュレシート）テーブルを作成する
fn create_cash_receipts_table(conn: &Connection) -> AppResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS cash_receipts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            client_id INTEGER NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
            date TEXT NOT NULL,
            amount TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_cash_receipts_client ON cash_receipts(client_id);",
    )?;
    Ok(())
}

/// メッセージテーブルを作成する
fn create_messages_table(conn: &Connection) -> AppResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            client_id INTEGER NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
            sender TEXT NOT NULL CHECK(sender IN ('admin', 'client')),
            content TEXT,
            file_url TEXT,
            timestamp TEXT NOT NULL,
            is_read INTEGER NOT NULL DEFAULT 0,
            CHECK(content IS NOT NULL OR file_url IS NOT NULL)
        );
        CREATE INDEX IF NOT EXISTS idx_messages_client ON messages(client_id, timestamp);",
    )?;
    Ok(())
}

/// バージョン（スナップショット）テーブルを作成する
///
/// 更新はトリガーで拒否する。削除は顧客の物理削除に伴うカスケードのみ。
/// スナップショットは空でないJSON配列に限る。
fn create_version_tables(conn: &Connection) -> AppResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS expense_versions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            client_id INTEGER NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
            version_number INTEGER NOT NULL CHECK(version_number >= 1),
            discussion_completed_at TEXT NOT NULL,
            expenses_data TEXT NOT NULL
                CHECK(json_valid(expenses_data) AND json_array_length(expenses_data) > 0),
            created_at TEXT NOT NULL,
            UNIQUE(client_id, version_number)
        );
        CREATE TABLE IF NOT EXISTS payment_versions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            client_id INTEGER NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
            version_number INTEGER NOT NULL CHECK(version_number >= 1),
            discussion_completed_at TEXT NOT NULL,
            payments_data TEXT NOT NULL
                CHECK(json_valid(payments_data) AND json_array_length(payments_data) > 0),
            created_at TEXT NOT NULL,
            UNIQUE(client_id, version_number)
        );
        CREATE TRIGGER IF NOT EXISTS expense_versions_immutable
            BEFORE UPDATE ON expense_versions
        BEGIN
            SELECT RAISE(ABORT, 'expense versions are immutable');
        END;
        CREATE TRIGGER IF NOT EXISTS payment_versions_immutable
            BEFORE UPDATE ON payment_versions
        BEGIN
            SELECT RAISE(ABORT, 'payment versions are immutable');
        END;",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_tables() {
        let conn = create_in_memory_connection().unwrap();

        let tables = [
            "users",
            "access_tokens",
            "clients",
            "projects",
            "project_progress",
            "expenses",
            "cash_receipts",
            "messages",
            "expense_versions",
            "payment_versions",
        ];
        for table in &tables {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "テーブル {table} が作成されていません");
        }
    }

    #[test]
    fn test_create_tables_is_idempotent() {
        let conn = create_in_memory_connection().unwrap();
        assert!(create_tables(&conn).is_ok());
        assert!(create_tables(&conn).is_ok());
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let conn = create_in_memory_connection().unwrap();
        let enabled: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[test]
    fn test_open_database_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("backoffice.db");

        let conn = open_database(path.to_str().unwrap()).unwrap();
        assert!(path.exists());

        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }
}
