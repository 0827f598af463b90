use crate::features::cash_receipts::repository as cash_receipt_repository;
use crate::features::expenses::repository as expense_repository;
use crate::features::versions::models::{ExpenseSnapshotItem, PaymentSnapshotItem, VersionKind};
use crate::shared::errors::{AppError, AppResult};
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// シリアライズ済みのスナップショット
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub payload: String,
    pub item_count: usize,
}

/// 顧客の現在の経費または入金をスナップショットにする
///
/// # 引数
/// * `conn` - データベース接続（バージョン作成トランザクション内で使用される）
/// * `kind` - 対象の種別
/// * `client_id` - 顧客ID
///
/// # 戻り値
/// スナップショット。対象データが0件の場合はバリデーションエラー
pub fn capture(conn: &Connection, kind: VersionKind, client_id: i64) -> AppResult<Snapshot> {
    match kind {
        VersionKind::Expenses => {
            let items: Vec<ExpenseSnapshotItem> =
                expense_repository::find_all(conn, Some(client_id))?
                    .iter()
                    .map(ExpenseSnapshotItem::from)
                    .collect();
            encode(kind, &items)
        }
        VersionKind::Payments => {
            let items: Vec<PaymentSnapshotItem> =
                cash_receipt_repository::find_all(conn, Some(client_id))?
                    .iter()
                    .map(PaymentSnapshotItem::from)
                    .collect();
            encode(kind, &items)
        }
    }
}

fn encode<T: Serialize>(kind: VersionKind, items: &[T]) -> AppResult<Snapshot> {
    if items.is_empty() {
        return Err(AppError::validation(format!(
            "{}データがないためバージョンを作成できません",
            kind.label()
        )));
    }

    Ok(Snapshot {
        payload: serde_json::to_string(items)?,
        item_count: items.len(),
    })
}

/// 保存されたスナップショットを復元する
pub fn decode<T: DeserializeOwned>(kind: VersionKind, raw: &str) -> AppResult<Vec<T>> {
    serde_json::from_str(raw).map_err(|e| {
        AppError::Database(format!(
            "保存された{}スナップショットが不正です: {e}",
            kind.label()
        ))
    })
}
