use serde::{Deserialize, Serialize};

/// ユーザー情報を表す構造体
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    /// ユーザーID
    pub id: i64,
    /// ユーザー名
    pub username: String,
    /// 管理者フラグ
    pub is_staff: bool,
    /// 作成日時
    pub created_at: String,
}

/// 認証済みのリクエスト主体
#[derive(Debug, Clone, Serialize)]
pub struct Principal {
    /// ユーザー情報
    pub user: User,
    /// 紐づく顧客ID（顧客ユーザーの場合のみ）
    pub client_id: Option<i64>,
}

impl Principal {
    /// 管理者かどうか
    pub fn is_admin(&self) -> bool {
        self.user.is_staff
    }
}

/// 発行されたアクセストークン
///
/// 平文のトークンはこの応答でのみ返し、DBにはハッシュのみ保存する
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub user_id: i64,
    pub token: String,
    pub expires_at: String,
}

/// トークン発行用DTO
#[derive(Debug, Deserialize)]
pub struct IssueTokenDto {
    pub user_id: i64,
    pub ttl_days: Option<i64>,
}
