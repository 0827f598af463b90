use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 入金（キャッシュレシート）データモデル
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CashReceipt {
    pub id: i64,
    pub client_id: i64,
    pub date: String,
    pub amount: Decimal,
    pub created_at: String,
    pub updated_at: String,
}

/// 入金作成用DTO
#[derive(Debug, Deserialize, Clone)]
pub struct CreateCashReceiptDto {
    pub client_id: i64,
    pub date: String,
    pub amount: Decimal,
}

/// 入金更新用DTO
#[derive(Debug, Deserialize, Default)]
pub struct UpdateCashReceiptDto {
    pub date: Option<String>,
    pub amount: Option<Decimal>,
}
