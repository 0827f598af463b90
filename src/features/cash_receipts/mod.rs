/// 入金（キャッシュレシート）の機能モジュール
pub mod handlers;
pub mod models;
pub mod repository;

pub use models::{CashReceipt, CreateCashReceiptDto, UpdateCashReceiptDto};
