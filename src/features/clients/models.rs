use crate::features::auth::models::IssuedToken;
use crate::features::projects::models::Project;
use crate::features::versions::models::VersionKind;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 顧客データモデル
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Client {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub phone: String,
    pub address: String,
    pub budget: Option<Decimal>,
    pub is_active: bool,
    pub is_deleted: bool,
    pub expenses_discussion_completed: bool,
    pub expenses_discussion_completed_at: Option<String>,
    pub expenses_version_count: i64,
    pub payments_discussion_completed: bool,
    pub payments_discussion_completed_at: Option<String>,
    pub payments_version_count: i64,
    pub created_at: String,
}

/// 顧客作成用DTO
///
/// ユーザー・顧客・プロジェクト・進捗をまとめて作成する
#[derive(Debug, Deserialize)]
pub struct CreateClientDto {
    pub username: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub budget: Decimal,
    pub project_title: String,
}

/// 顧客更新用DTO
#[derive(Debug, Deserialize, Default)]
pub struct UpdateClientDto {
    pub phone: Option<String>,
    pub address: Option<String>,
    pub budget: Option<Decimal>,
    pub is_active: Option<bool>,
}

/// 顧客作成の結果
#[derive(Debug, Serialize)]
pub struct CreatedClient {
    pub client: Client,
    pub project: Project,
    /// 顧客ログイン用の初回トークン（この応答でのみ返す）
    pub access_token: IssuedToken,
}

/// 協議再開リクエストのボディ
#[derive(Debug, Deserialize)]
pub struct ReopenDiscussionDto {
    pub kind: VersionKind,
}
