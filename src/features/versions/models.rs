use crate::features::cash_receipts::models::CashReceipt;
use crate::features::expenses::models::Expense;
use crate::shared::utils::format_amount;
use serde::{Deserialize, Serialize};

/// バージョン管理の対象
///
/// 経費と入金はそれぞれ独立したカウンタと協議状態を持つ
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum VersionKind {
    Expenses,
    Payments,
}

impl VersionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionKind::Expenses => "expenses",
            VersionKind::Payments => "payments",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "expenses" => Some(VersionKind::Expenses),
            "payments" => Some(VersionKind::Payments),
            _ => None,
        }
    }

    /// ログ・エラーメッセージ用の名称
    pub fn label(&self) -> &'static str {
        match self {
            VersionKind::Expenses => "経費",
            VersionKind::Payments => "入金",
        }
    }

    pub(crate) fn version_table(&self) -> &'static str {
        match self {
            VersionKind::Expenses => "expense_versions",
            VersionKind::Payments => "payment_versions",
        }
    }

    pub(crate) fn data_column(&self) -> &'static str {
        match self {
            VersionKind::Expenses => "expenses_data",
            VersionKind::Payments => "payments_data",
        }
    }

    pub(crate) fn counter_column(&self) -> &'static str {
        match self {
            VersionKind::Expenses => "expenses_version_count",
            VersionKind::Payments => "payments_version_count",
        }
    }

    pub(crate) fn completed_flag_column(&self) -> &'static str {
        match self {
            VersionKind::Expenses => "expenses_discussion_completed",
            VersionKind::Payments => "payments_discussion_completed",
        }
    }

    pub(crate) fn completed_at_column(&self) -> &'static str {
        match self {
            VersionKind::Expenses => "expenses_discussion_completed_at",
            VersionKind::Payments => "payments_discussion_completed_at",
        }
    }
}

/// 経費スナップショットの1件分
///
/// 日付・金額は文字列で凍結する
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ExpenseSnapshotItem {
    pub id: i64,
    pub date: String,
    pub description: String,
    pub amount: String,
    pub status: String,
    pub bill_url: Option<String>,
    pub created_at: String,
}

impl From<&Expense> for ExpenseSnapshotItem {
    fn from(expense: &Expense) -> Self {
        Self {
            id: expense.id,
            date: expense.date.clone(),
            description: expense.description.clone(),
            amount: format_amount(&expense.amount),
            status: expense.status.as_str().to_string(),
            bill_url: expense.bill_url.clone(),
            created_at: expense.created_at.clone(),
        }
    }
}

/// 入金スナップショットの1件分
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PaymentSnapshotItem {
    pub id: i64,
    pub date: String,
    pub amount: String,
    pub created_at: String,
}

impl From<&CashReceipt> for PaymentSnapshotItem {
    fn from(receipt: &CashReceipt) -> Self {
        Self {
            id: receipt.id,
            date: receipt.date.clone(),
            amount: format_amount(&receipt.amount),
            created_at: receipt.created_at.clone(),
        }
    }
}

/// 経費バージョン
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ExpenseVersion {
    pub id: i64,
    pub client_id: i64,
    pub version_number: i64,
    pub discussion_completed_at: String,
    pub expenses_data: Vec<ExpenseSnapshotItem>,
    pub created_at: String,
}

/// 入金バージョン
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PaymentVersion {
    pub id: i64,
    pub client_id: i64,
    pub version_number: i64,
    pub discussion_completed_at: String,
    pub payments_data: Vec<PaymentSnapshotItem>,
    pub created_at: String,
}

/// 種別をまたいで扱うためのバージョン
///
/// JSONでは中身の構造体がそのまま出力される
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum Version {
    Expense(ExpenseVersion),
    Payment(PaymentVersion),
}

impl Version {
    pub fn id(&self) -> i64 {
        match self {
            Version::Expense(v) => v.id,
            Version::Payment(v) => v.id,
        }
    }

    pub fn client_id(&self) -> i64 {
        match self {
            Version::Expense(v) => v.client_id,
            Version::Payment(v) => v.client_id,
        }
    }

    pub fn version_number(&self) -> i64 {
        match self {
            Version::Expense(v) => v.version_number,
            Version::Payment(v) => v.version_number,
        }
    }

    pub fn discussion_completed_at(&self) -> &str {
        match self {
            Version::Expense(v) => &v.discussion_completed_at,
            Version::Payment(v) => &v.discussion_completed_at,
        }
    }

    /// スナップショットの件数
    pub fn item_count(&self) -> usize {
        match self {
            Version::Expense(v) => v.expenses_data.len(),
            Version::Payment(v) => v.payments_data.len(),
        }
    }

    pub fn kind(&self) -> VersionKind {
        match self {
            Version::Expense(_) => VersionKind::Expenses,
            Version::Payment(_) => VersionKind::Payments,
        }
    }
}

/// バージョン作成リクエストのボディ（client_idはクエリでも指定可能）
#[derive(Debug, Deserialize, Default)]
pub struct CreateVersionDto {
    pub client_id: Option<i64>,
}

