/// 経費機能モジュール
///
/// このモジュールは経費管理に関連する機能を提供します：
/// - 経費の作成、読み取り、更新、削除（管理者）
/// - 経費データのバリデーション（金額・日付・請求書の形式）
/// - 顧客ごとの経費取得と、最新バージョン以降の経費の取得
pub mod handlers;
pub mod models;
pub mod repository;

pub use models::{CreateExpenseDto, Expense, ExpenseStatus, UpdateExpenseDto};
