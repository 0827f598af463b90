use crate::features::cash_receipts::models::{
    CashReceipt, CreateCashReceiptDto, UpdateCashReceiptDto,
};
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::{
    amount_from_row, current_timestamp, filter_created_after, format_amount, validate_amount,
    validate_date,
};
use rusqlite::{params, Connection};

/// 入金を作成する
///
/// # 引数
/// * `conn` - データベース接続
/// * `dto` - 入金作成用DTO
///
/// # 戻り値
/// 作成された入金、または失敗時はエラー
pub fn create(conn: &Connection, dto: CreateCashReceiptDto) -> AppResult<CashReceipt> {
    validate_date(&dto.date)?;
    validate_amount(&dto.amount)?;

    let now = current_timestamp();
    conn.execute(
        "INSERT INTO cash_receipts (client_id, date, amount, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![dto.client_id, dto.date, format_amount(&dto.amount), now, now],
    )?;

    let id = conn.last_insert_rowid();
    log::info!("入金を作成しました: receipt_id={id}, client_id={}", dto.client_id);
    find_by_id(conn, id)
}

/// IDで入金を取得する
pub fn find_by_id(conn: &Connection, id: i64) -> AppResult<CashReceipt> {
    conn.query_row(
        "SELECT id, client_id, date, amount, created_at, updated_at
         FROM cash_receipts WHERE id = ?1",
        params![id],
        map_cash_receipt,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => AppError::not_found("入金"),
        _ => AppError::from(e),
    })
}

/// 入金一覧を取得する（日付の新しい順）
///
/// # 引数
/// * `conn` - データベース接続
/// * `client_id` - 顧客IDフィルター（Noneの場合は削除されていない全顧客）
pub fn find_all(conn: &Connection, client_id: Option<i64>) -> AppResult<Vec<CashReceipt>> {
    let mut stmt = conn.prepare(
        "SELECT r.id, r.client_id, r.date, r.amount, r.created_at, r.updated_at
         FROM cash_receipts r
         JOIN clients c ON c.id = r.client_id
         WHERE c.is_deleted = 0 AND (?1 IS NULL OR r.client_id = ?1)
         ORDER BY r.date DESC, r.id DESC",
    )?;
    let receipts = stmt.query_map(params![client_id], map_cash_receipt)?;
    receipts.collect::<Result<Vec<_>, _>>().map_err(AppError::from)
}

/// 指定日時より後に作成された入金を取得する
pub fn find_created_after(
    conn: &Connection,
    client_id: i64,
    after: Option<&str>,
) -> AppResult<Vec<CashReceipt>> {
    let receipts = find_all(conn, Some(client_id))?;
    filter_created_after(receipts, after, |r| r.created_at.as_str())
}

/// 入金を更新する
pub fn update(conn: &Connection, id: i64, dto: UpdateCashReceiptDto) -> AppResult<CashReceipt> {
    let existing = find_by_id(conn, id)?;

    if let Some(date) = &dto.date {
        validate_date(date)?;
    }
    if let Some(amount) = &dto.amount {
        validate_amount(amount)?;
    }

    let date = dto.date.unwrap_or(existing.date);
    let amount = dto.amount.unwrap_or(existing.amount);

    conn.execute(
        "UPDATE cash_receipts SET date = ?1, amount = ?2, updated_at = ?3 WHERE id = ?4",
        params![date, format_amount(&amount), current_timestamp(), id],
    )?;

    log::info!("入金を更新しました: receipt_id={id}");
    find_by_id(conn, id)
}

/// 入金を削除する
pub fn delete(conn: &Connection, id: i64) -> AppResult<()> {
    let affected = conn.execute("DELETE FROM cash_receipts WHERE id = ?1", params![id])?;

    if affected == 0 {
        return Err(AppError::not_found("入金"));
    }

    log::info!("入金を削除しました: receipt_id={id}");
    Ok(())
}

fn map_cash_receipt(row: &rusqlite::Row<'_>) -> rusqlite::Result<CashReceipt> {
    Ok(CashReceipt {
        id: row.get(0)?,
        client_id: row.get(1)?,
        date: row.get(2)?,
        amount: amount_from_row(row, 3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}
