use hyper::StatusCode;
use thiserror::Error;

/// バックオフィスAPIのエラー
///
/// ハンドラーはこの型を返し、サーバー層がHTTPステータスと
/// `{"error": ...}` 形式の応答に変換する
#[derive(Debug, Error)]
pub enum AppError {
    #[error("DB操作に失敗しました: {0}")]
    Database(String),

    /// 入力値の不備（400）
    #[error("入力エラー: {0}")]
    Validation(String),

    /// 対象が存在しない、または参照権限がない（404）
    #[error("未検出: {0}")]
    NotFound(String),

    /// トークンがない・無効（401）
    #[error("認証エラー: {0}")]
    Unauthorized(String),

    /// 権限不足（403）
    #[error("権限エラー: {0}")]
    Forbidden(String),

    /// 一意制約違反・バージョン採番の競合（409）
    #[error("競合: {0}")]
    Conflict(String),

    #[error("設定が不正です: {0}")]
    Configuration(String),

    #[error("I/O失敗: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON変換失敗: {0}")]
    Json(#[from] serde_json::Error),

    /// ロック取得失敗・SQLiteのビジー
    #[error("同時実行エラー: {0}")]
    Concurrency(String),

    #[error("内部エラー: {0}")]
    Internal(String),
}

/// ログ出力の重さ
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// 利用者の入力ミス・存在しないID
    Low,
    /// 認証失敗・競合・I/O
    Medium,
    /// サーバー側の障害
    High,
    /// 権限の越境
    Critical,
}

impl AppError {
    /// 応答本文に載せるメッセージ
    ///
    /// 入力エラー・未検出・競合はそのまま返し、内部の詳細は隠す
    pub fn user_message(&self) -> &str {
        match self {
            AppError::Validation(msg) | AppError::NotFound(msg) | AppError::Conflict(msg) => msg,
            AppError::Unauthorized(_) => "認証が必要です",
            AppError::Forbidden(_) => "この操作を行う権限がありません",
            AppError::Database(_) | AppError::Concurrency(_) => {
                "データの処理中にエラーが発生しました。時間をおいて再度お試しください"
            }
            AppError::Configuration(_) | AppError::Io(_) | AppError::Json(_) | AppError::Internal(_) => {
                "内部エラーが発生しました"
            }
        }
    }

    /// ログ用の詳細（内部情報を含む）
    pub fn details(&self) -> String {
        self.to_string()
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            AppError::Validation(_) | AppError::NotFound(_) => ErrorSeverity::Low,
            AppError::Unauthorized(_) | AppError::Conflict(_) | AppError::Io(_) | AppError::Json(_) => {
                ErrorSeverity::Medium
            }
            AppError::Database(_)
            | AppError::Configuration(_)
            | AppError::Concurrency(_)
            | AppError::Internal(_) => ErrorSeverity::High,
            AppError::Forbidden(_) => ErrorSeverity::Critical,
        }
    }

    /// HTTPステータスコード
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_)
            | AppError::Configuration(_)
            | AppError::Io(_)
            | AppError::Json(_)
            | AppError::Concurrency(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    /// `"{resource}が見つかりません"` を作る
    pub fn not_found(resource: impl Into<String>) -> Self {
        AppError::NotFound(format!("{}が見つかりません", resource.into()))
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        AppError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        AppError::Forbidden(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        AppError::Conflict(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        AppError::Configuration(message.into())
    }

    pub fn concurrency(message: impl Into<String>) -> Self {
        AppError::Concurrency(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        AppError::Internal(message.into())
    }
}

/// SQLiteのエラーを分類する
///
/// 一意制約・主キー違反は競合、ビジー・ロックは同時実行エラー、それ以外はDBエラー
impl From<rusqlite::Error> for AppError {
    fn from(error: rusqlite::Error) -> Self {
        use rusqlite::ffi::{SQLITE_CONSTRAINT_PRIMARYKEY, SQLITE_CONSTRAINT_UNIQUE};
        use rusqlite::ErrorCode;

        match &error {
            rusqlite::Error::SqliteFailure(code, _)
                if matches!(
                    code.extended_code,
                    SQLITE_CONSTRAINT_UNIQUE | SQLITE_CONSTRAINT_PRIMARYKEY
                ) =>
            {
                AppError::Conflict(format!("一意制約違反: {error}"))
            }
            rusqlite::Error::SqliteFailure(code, _)
                if matches!(code.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) =>
            {
                AppError::Concurrency(format!("データベースがロックされています: {error}"))
            }
            _ => AppError::Database(error.to_string()),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_levels() {
        assert_eq!(AppError::validation("金額").severity(), ErrorSeverity::Low);
        assert_eq!(AppError::not_found("顧客").severity(), ErrorSeverity::Low);
        assert_eq!(
            AppError::conflict("バージョン競合").severity(),
            ErrorSeverity::Medium
        );
        assert_eq!(
            AppError::forbidden("管理者専用").severity(),
            ErrorSeverity::Critical
        );
        assert!(AppError::internal("x").severity() > ErrorSeverity::Medium);
    }

    #[test]
    fn test_user_message_hides_internal_details() {
        assert_eq!(
            AppError::validation("金額は正の数値で入力してください").user_message(),
            "金額は正の数値で入力してください"
        );
        assert_eq!(AppError::not_found("顧客").user_message(), "顧客が見つかりません");

        let internal = AppError::internal("SQL: no such column");
        assert_eq!(internal.user_message(), "内部エラーが発生しました");
        assert!(internal.details().contains("no such column"));

        let db = AppError::Database("disk I/O error".to_string());
        assert!(!db.user_message().contains("disk"));
    }

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(
            AppError::validation("x").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::unauthorized("x").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::forbidden("x").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::conflict("x").status_code(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::concurrency("x").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_sqlite_errors_are_classified() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE t (k INTEGER UNIQUE)", []).unwrap();
        conn.execute("INSERT INTO t (k) VALUES (1)", []).unwrap();

        let duplicate: AppError = conn
            .execute("INSERT INTO t (k) VALUES (1)", [])
            .unwrap_err()
            .into();
        assert!(matches!(duplicate, AppError::Conflict(_)));

        let missing_table: AppError = conn
            .execute("INSERT INTO nowhere (k) VALUES (1)", [])
            .unwrap_err()
            .into();
        assert!(matches!(missing_table, AppError::Database(_)));
    }
}
