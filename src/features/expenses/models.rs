use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 経費のステータス
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseStatus {
    Paid,
    #[default]
    Pending,
    Upcoming,
}

impl ExpenseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseStatus::Paid => "paid",
            ExpenseStatus::Pending => "pending",
            ExpenseStatus::Upcoming => "upcoming",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "paid" => Some(ExpenseStatus::Paid),
            "pending" => Some(ExpenseStatus::Pending),
            "upcoming" => Some(ExpenseStatus::Upcoming),
            _ => None,
        }
    }
}

/// 経費データモデル
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Expense {
    pub id: i64,
    pub client_id: i64,
    pub date: String,
    pub description: String,
    pub amount: Decimal,
    pub bill_url: Option<String>,
    pub status: ExpenseStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// 経費作成用DTO
#[derive(Debug, Deserialize, Clone)]
pub struct CreateExpenseDto {
    pub client_id: i64,
    pub date: String,
    pub description: String,
    pub amount: Decimal,
    #[serde(default)]
    pub status: ExpenseStatus,
    pub bill_url: Option<String>,
}

/// 経費更新用DTO
#[derive(Debug, Deserialize, Default)]
pub struct UpdateExpenseDto {
    pub date: Option<String>,
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    pub status: Option<ExpenseStatus>,
    /// 空文字を指定すると請求書URLを削除する
    pub bill_url: Option<String>,
}
