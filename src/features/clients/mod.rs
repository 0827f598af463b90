/// 顧客管理の機能モジュール
///
/// 顧客の作成（ユーザー・プロジェクト・進捗の同時作成）、更新、論理削除、
/// 協議状態の再開を提供します。
pub mod handlers;
pub mod models;
pub mod repository;

pub use models::{Client, CreateClientDto, CreatedClient, ReopenDiscussionDto, UpdateClientDto};
