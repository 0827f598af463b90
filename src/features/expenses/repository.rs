use crate::features::expenses::models::{CreateExpenseDto, Expense, ExpenseStatus, UpdateExpenseDto};
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::{
    amount_from_row, current_timestamp, filter_created_after, format_amount, normalize_string,
    validate_amount, validate_date, validate_required_field, validate_text_length,
};
use rusqlite::{params, Connection};

const EXPENSE_COLUMNS: &str =
    "id, client_id, date, description, amount, bill_url, status, created_at, updated_at";

/// 請求書ファイルとして許可する拡張子
const ALLOWED_BILL_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "pdf"];

/// 経費を作成する
///
/// # 引数
/// * `conn` - データベース接続
/// * `dto` - 経費作成用DTO
///
/// # 戻り値
/// 作成された経費、または失敗時はエラー
pub fn create(conn: &Connection, dto: CreateExpenseDto) -> AppResult<Expense> {
    validate_required_field(&dto.description, "説明")?;
    validate_text_length(&dto.description, 255, "説明")?;
    validate_date(&dto.date)?;
    validate_amount(&dto.amount)?;
    let bill_url = normalize_bill_url(dto.bill_url.as_deref())?;

    let now = current_timestamp();

    conn.execute(
        "INSERT INTO expenses (client_id, date, description, amount, bill_url, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            dto.client_id,
            dto.date,
            normalize_string(&dto.description),
            format_amount(&dto.amount),
            bill_url,
            dto.status.as_str(),
            now,
            now
        ],
    )?;

    let id = conn.last_insert_rowid();
    log::info!("経費を作成しました: expense_id={id}, client_id={}", dto.client_id);
    find_by_id(conn, id)
}

/// IDで経費を取得する
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - 経費ID
///
/// # 戻り値
/// 経費、または失敗時はエラー
pub fn find_by_id(conn: &Connection, id: i64) -> AppResult<Expense> {
    let sql = format!("SELECT {EXPENSE_COLUMNS} FROM expenses WHERE id = ?1");
    conn.query_row(&sql, params![id], map_expense)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => AppError::not_found("経費"),
            _ => AppError::from(e),
        })
}

/// 経費一覧を取得する（日付の新しい順）
///
/// # 引数
/// * `conn` - データベース接続
/// * `client_id` - 顧客IDフィルター（Noneの場合は削除されていない全顧客）
///
/// # 戻り値
/// 経費のリスト、または失敗時はエラー
pub fn find_all(conn: &Connection, client_id: Option<i64>) -> AppResult<Vec<Expense>> {
    let mut query = String::from(
        "SELECT e.id, e.client_id, e.date, e.description, e.amount, e.bill_url, e.status,
                e.created_at, e.updated_at
         FROM expenses e
         JOIN clients c ON c.id = e.client_id
         WHERE c.is_deleted = 0",
    );

    let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    // 顧客フィルター
    if let Some(id) = client_id {
        query.push_str(" AND e.client_id = ?");
        params.push(Box::new(id));
    }

    query.push_str(" ORDER BY e.date DESC, e.id DESC");

    let mut stmt = conn.prepare(&query)?;
    let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

    let expenses = stmt.query_map(param_refs.as_slice(), map_expense)?;
    expenses.collect::<Result<Vec<_>, _>>().map_err(AppError::from)
}

/// 指定日時より後に作成された経費を取得する
///
/// # 引数
/// * `conn` - データベース接続
/// * `client_id` - 顧客ID
/// * `after` - 基準日時（RFC3339）。Noneの場合は全件
pub fn find_created_after(
    conn: &Connection,
    client_id: i64,
    after: Option<&str>,
) -> AppResult<Vec<Expense>> {
    let expenses = find_all(conn, Some(client_id))?;
    filter_created_after(expenses, after, |e| e.created_at.as_str())
}

/// 経費を更新する
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - 経費ID
/// * `dto` - 経費更新用DTO
///
/// # 戻り値
/// 更新された経費、または失敗時はエラー
pub fn update(conn: &Connection, id: i64, dto: UpdateExpenseDto) -> AppResult<Expense> {
    let existing = find_by_id(conn, id)?;

    if let Some(date) = &dto.date {
        validate_date(date)?;
    }
    if let Some(description) = &dto.description {
        validate_required_field(description, "説明")?;
        validate_text_length(description, 255, "説明")?;
    }
    if let Some(amount) = &dto.amount {
        validate_amount(amount)?;
    }

    let date = dto.date.unwrap_or(existing.date);
    let description = dto
        .description
        .as_deref()
        .map(normalize_string)
        .unwrap_or(existing.description);
    let amount = dto.amount.unwrap_or(existing.amount);
    let status = dto.status.unwrap_or(existing.status);
    let bill_url = match dto.bill_url.as_deref() {
        Some(url) => normalize_bill_url(Some(url))?,
        None => existing.bill_url,
    };

    let now = current_timestamp();
    conn.execute(
        "UPDATE expenses SET date = ?1, description = ?2, amount = ?3, status = ?4,
                bill_url = ?5, updated_at = ?6
         WHERE id = ?7",
        params![
            date,
            description,
            format_amount(&amount),
            status.as_str(),
            bill_url,
            now,
            id
        ],
    )?;

    log::info!("経費を更新しました: expense_id={id}");
    find_by_id(conn, id)
}

/// 経費を削除する
///
/// 既に作成されたバージョンのスナップショットには影響しない
pub fn delete(conn: &Connection, id: i64) -> AppResult<()> {
    let affected = conn.execute("DELETE FROM expenses WHERE id = ?1", params![id])?;

    if affected == 0 {
        return Err(AppError::not_found("経費"));
    }

    log::info!("経費を削除しました: expense_id={id}");
    Ok(())
}

/// 請求書URLを検証・正規化する（空文字はNone）
fn normalize_bill_url(bill_url: Option<&str>) -> AppResult<Option<String>> {
    let Some(url) = bill_url.map(str::trim).filter(|url| !url.is_empty()) else {
        return Ok(None);
    };

    validate_text_length(url, 500, "請求書URL")?;

    let path = url.split(['?', '#']).next().unwrap_or(url);
    let extension = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    if !ALLOWED_BILL_EXTENSIONS.contains(&extension.as_str()) {
        return Err(AppError::validation(format!(
            "請求書の形式が対応していません（対応形式: {}）",
            ALLOWED_BILL_EXTENSIONS.join(", ")
        )));
    }

    Ok(Some(url.to_string()))
}

fn map_expense(row: &rusqlite::Row<'_>) -> rusqlite::Result<Expense> {
    let status: String = row.get(6)?;
    let status = ExpenseStatus::parse(&status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            6,
            rusqlite::types::Type::Text,
            format!("不明な経費ステータス: {status}").into(),
        )
    })?;

    Ok(Expense {
        id: row.get(0)?,
        client_id: row.get(1)?,
        date: row.get(2)?,
        description: row.get(3)?,
        amount: amount_from_row(row, 4)?,
        bill_url: row.get(5)?,
        status,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::database::create_in_memory_connection;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn setup_client(conn: &Connection, username: &str) -> i64 {
        conn.execute(
            "INSERT INTO users (username, is_staff, created_at) VALUES (?1, 0, '2024-01-01T00:00:00+09:00')",
            params![username],
        )
        .unwrap();
        let user_id = conn.last_insert_rowid();
        conn.execute(
            "INSERT INTO clients (user_id, created_at) VALUES (?1, '2024-01-01T00:00:00+09:00')",
            params![user_id],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    fn expense_dto(client_id: i64, amount: &str) -> CreateExpenseDto {
        CreateExpenseDto {
            client_id,
            date: "2024-05-01".to_string(),
            description: "Cement".to_string(),
            amount: Decimal::from_str(amount).unwrap(),
            status: ExpenseStatus::default(),
            bill_url: None,
        }
    }

    #[test]
    fn test_create_and_find_expense() {
        let conn = create_in_memory_connection().unwrap();
        let client_id = setup_client(&conn, "c1");

        let created = create(&conn, expense_dto(client_id, "1500.5")).unwrap();
        assert_eq!(created.status, ExpenseStatus::Pending);
        assert_eq!(created.amount.to_string(), "1500.50");

        let found = find_by_id(&conn, created.id).unwrap();
        assert_eq!(found, created);
    }

    #[test]
    fn test_create_expense_validation() {
        let conn = create_in_memory_connection().unwrap();
        let client_id = setup_client(&conn, "c1");

        assert!(matches!(
            create(&conn, expense_dto(client_id, "0")),
            Err(AppError::Validation(_))
        ));

        let mut dto = expense_dto(client_id, "10");
        dto.date = "2024-02-30".to_string();
        assert!(matches!(create(&conn, dto), Err(AppError::Validation(_))));

        let mut dto = expense_dto(client_id, "10");
        dto.bill_url = Some("https://files.example/bill.exe".to_string());
        assert!(matches!(create(&conn, dto), Err(AppError::Validation(_))));

        let mut dto = expense_dto(client_id, "10");
        dto.bill_url = Some("https://files.example/bill.PDF?sig=abc".to_string());
        assert!(create(&conn, dto).is_ok());
    }

    #[test]
    fn test_create_expense_for_missing_client() {
        let conn = create_in_memory_connection().unwrap();
        assert!(matches!(
            create(&conn, expense_dto(999, "10")),
            Err(AppError::Database(_))
        ));
    }

    #[test]
    fn test_find_all_filters_by_client() {
        let conn = create_in_memory_connection().unwrap();
        let a = setup_client(&conn, "a");
        let b = setup_client(&conn, "b");

        create(&conn, expense_dto(a, "10")).unwrap();
        create(&conn, expense_dto(a, "20")).unwrap();
        create(&conn, expense_dto(b, "30")).unwrap();

        assert_eq!(find_all(&conn, Some(a)).unwrap().len(), 2);
        assert_eq!(find_all(&conn, Some(b)).unwrap().len(), 1);
        assert_eq!(find_all(&conn, None).unwrap().len(), 3);
    }

    #[test]
    fn test_update_and_delete_expense() {
        let conn = create_in_memory_connection().unwrap();
        let client_id = setup_client(&conn, "c1");
        let created = create(&conn, expense_dto(client_id, "10")).unwrap();

        let updated = update(
            &conn,
            created.id,
            UpdateExpenseDto {
                amount: Some(Decimal::from(99)),
                status: Some(ExpenseStatus::Paid),
                bill_url: Some("bill.png".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(updated.amount, Decimal::from(99));
        assert_eq!(updated.status, ExpenseStatus::Paid);
        assert_eq!(updated.description, "Cement");
        assert_eq!(updated.bill_url.as_deref(), Some("bill.png"));

        let cleared = update(
            &conn,
            created.id,
            UpdateExpenseDto {
                bill_url: Some(String::new()),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(cleared.bill_url.is_none());

        delete(&conn, created.id).unwrap();
        assert!(matches!(
            find_by_id(&conn, created.id),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(delete(&conn, created.id), Err(AppError::NotFound(_))));
    }
}
