use crate::features::versions::models::{ExpenseVersion, PaymentVersion, Version, VersionKind};
use crate::features::versions::snapshot;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::current_timestamp;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

/// DBから読み出した直後のバージョン行
struct VersionRow {
    id: i64,
    client_id: i64,
    version_number: i64,
    discussion_completed_at: String,
    payload: String,
    created_at: String,
}

impl VersionRow {
    fn into_version(self, kind: VersionKind) -> AppResult<Version> {
        Ok(match kind {
            VersionKind::Expenses => Version::Expense(ExpenseVersion {
                id: self.id,
                client_id: self.client_id,
                version_number: self.version_number,
                discussion_completed_at: self.discussion_completed_at,
                expenses_data: snapshot::decode(kind, &self.payload)?,
                created_at: self.created_at,
            }),
            VersionKind::Payments => Version::Payment(PaymentVersion {
                id: self.id,
                client_id: self.client_id,
                version_number: self.version_number,
                discussion_completed_at: self.discussion_completed_at,
                payments_data: snapshot::decode(kind, &self.payload)?,
                created_at: self.created_at,
            }),
        })
    }
}

/// 協議を完了し、新しいバージョンを作成する
///
/// # 引数
/// * `conn` - データベース接続
/// * `kind` - 経費または入金
/// * `client_id` - 顧客ID
///
/// # 戻り値
/// 作成されたバージョン、または失敗時はエラー
///
/// # 処理内容
/// 1. 書き込みロックを取得してトランザクションを開始（IMMEDIATE）
/// 2. 顧客の現在のカウンタを取得
/// 3. 現在の経費／入金をスナップショットにする
/// 4. カウンタ・協議完了フラグ・完了日時をCASで更新
/// 5. バージョン行を挿入してコミット
///
/// いずれかの段階で失敗した場合はロールバックされ、カウンタは変わらない
pub fn create_version(
    conn: &mut Connection,
    kind: VersionKind,
    client_id: i64,
) -> AppResult<Version> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let current = read_counter(&tx, kind, client_id)?;
    let snapshot = snapshot::capture(&tx, kind, client_id)?;
    let next = current + 1;
    let now = current_timestamp();

    let cas_sql = format!(
        "UPDATE clients SET {counter} = ?1, {flag} = 1, {at} = ?2
         WHERE id = ?3 AND is_deleted = 0 AND {counter} = ?4",
        counter = kind.counter_column(),
        flag = kind.completed_flag_column(),
        at = kind.completed_at_column(),
    );
    let swapped = tx.execute(&cas_sql, params![next, now, client_id, current])?;
    if swapped != 1 {
        log::warn!(
            "バージョンカウンタの更新が競合しました: client_id={client_id}, kind={}, expected={current}",
            kind.as_str()
        );
        return Err(version_conflict());
    }

    let insert_sql = format!(
        "INSERT INTO {table} (client_id, version_number, discussion_completed_at, {data}, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        table = kind.version_table(),
        data = kind.data_column(),
    );
    tx.execute(
        &insert_sql,
        params![client_id, next, now, snapshot.payload, now],
    )
    .map_err(|e| match AppError::from(e) {
        AppError::Conflict(detail) => {
            log::warn!(
                "バージョン番号が既に存在します: client_id={client_id}, version={next}, {detail}"
            );
            version_conflict()
        }
        other => other,
    })?;

    let id = tx.last_insert_rowid();
    let version = find_version(&tx, kind, id, None)?;
    tx.commit()?;

    log::info!(
        "バージョンを作成しました: client_id={client_id}, kind={}, version={next}, items={}",
        kind.as_str(),
        snapshot.item_count
    );

    Ok(version)
}

fn version_conflict() -> AppError {
    AppError::conflict("他の操作と競合したためバージョンを作成できませんでした。再度お試しください")
}

/// 削除されていない顧客のバージョンカウンタを取得する
fn read_counter(conn: &Connection, kind: VersionKind, client_id: i64) -> AppResult<i64> {
    let sql = format!(
        "SELECT {} FROM clients WHERE id = ?1 AND is_deleted = 0",
        kind.counter_column()
    );
    conn.query_row(&sql, params![client_id], |row| row.get(0))
        .optional()?
        .ok_or_else(|| AppError::not_found("顧客"))
}

/// バージョン一覧を取得する
///
/// # 引数
/// * `conn` - データベース接続
/// * `kind` - 経費または入金
/// * `client_id` - 顧客ID（Noneの場合は全顧客）
///
/// バージョン番号順。同じ番号は顧客ID順に並べる
pub fn list_versions(
    conn: &Connection,
    kind: VersionKind,
    client_id: Option<i64>,
) -> AppResult<Vec<Version>> {
    let sql = format!(
        "SELECT id, client_id, version_number, discussion_completed_at, {data}, created_at
         FROM {table}
         WHERE (?1 IS NULL OR client_id = ?1)
         ORDER BY version_number, client_id, id",
        table = kind.version_table(),
        data = kind.data_column(),
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![client_id], map_version_row)?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter().map(|row| row.into_version(kind)).collect()
}

/// IDでバージョンを取得する
///
/// # 引数
/// * `conn` - データベース接続
/// * `kind` - 経費または入金
/// * `id` - バージョンID
/// * `owner` - 顧客IDで制限する場合に指定（他の顧客のバージョンは見つからない扱い）
pub fn find_version(
    conn: &Connection,
    kind: VersionKind,
    id: i64,
    owner: Option<i64>,
) -> AppResult<Version> {
    let sql = format!(
        "SELECT id, client_id, version_number, discussion_completed_at, {data}, created_at
         FROM {table}
         WHERE id = ?1 AND (?2 IS NULL OR client_id = ?2)",
        table = kind.version_table(),
        data = kind.data_column(),
    );

    conn.query_row(&sql, params![id, owner], map_version_row)
        .optional()?
        .ok_or_else(|| AppError::not_found("バージョン"))?
        .into_version(kind)
}

/// 最新バージョンの協議完了日時を取得する（バージョンがなければNone）
pub fn latest_completed_at(
    conn: &Connection,
    kind: VersionKind,
    client_id: i64,
) -> AppResult<Option<String>> {
    let sql = format!(
        "SELECT discussion_completed_at FROM {}
         WHERE client_id = ?1
         ORDER BY version_number DESC
         LIMIT 1",
        kind.version_table()
    );
    conn.query_row(&sql, params![client_id], |row| row.get(0))
        .optional()
        .map_err(AppError::from)
}

fn map_version_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<VersionRow> {
    Ok(VersionRow {
        id: row.get(0)?,
        client_id: row.get(1)?,
        version_number: row.get(2)?,
        discussion_completed_at: row.get(3)?,
        payload: row.get(4)?,
        created_at: row.get(5)?,
    })
}
