/// 認証機能のモジュール
///
/// アクセストークンの発行・検証と、管理者／顧客の権限判定を提供します。
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repository;

pub use middleware::{auth_helpers, AuthMiddleware};
pub use models::{IssueTokenDto, IssuedToken, Principal, User};
