/// 機能別モジュール
///
/// 各機能モジュールは、その機能に関連するコード（モデル、ハンドラー、データベース操作、サービス）
/// を含む自己完結型のユニットです。
pub mod auth;
pub mod cash_receipts;
pub mod clients;
pub mod expenses;
pub mod messages;
pub mod projects;
pub mod versions;
