pub mod features;
pub mod server;
pub mod shared;

use features::auth::{repository as auth_repository, AuthMiddleware};
use features::versions::VersioningService;
use log::{error, info, warn};
use rusqlite::Connection;
use server::HttpServer;
use shared::config::{
    initialize_logging_system, load_environment_variables, EnvironmentConfig, ServerConfig,
};
use shared::database::open_database;
use shared::errors::{AppError, AppResult};
use shared::utils::set_app_timezone;
use std::sync::{Arc, Mutex, MutexGuard};

/// 起動時に用意する管理者ユーザー名
pub const BOOTSTRAP_ADMIN_USERNAME: &str = "admin";

/// アプリケーション状態（データベース接続とサービスを保持）
pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub auth: AuthMiddleware,
    pub versioning: VersioningService,
    pub config: ServerConfig,
}

impl AppState {
    /// 接続を共有する各サービスを組み立てる
    pub fn new(conn: Connection, config: ServerConfig) -> Self {
        let db = Arc::new(Mutex::new(conn));
        Self {
            auth: AuthMiddleware::new(Arc::clone(&db)),
            versioning: VersioningService::new(Arc::clone(&db)),
            db,
            config,
        }
    }

    /// データベース接続のロックを取得する
    pub fn lock_db(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|e| AppError::concurrency(format!("データベースロック取得失敗: {e}")))
    }
}

/// アプリケーションを起動する
///
/// # 処理内容
/// 1. 環境変数の読み込みとログ初期化
/// 2. 設定の検証（本番環境ではエラー時に起動を中止）
/// 3. データベースの初期化と管理者トークンの登録
/// 4. HTTPサーバーの開始
pub async fn run() -> AppResult<()> {
    load_environment_variables();
    initialize_logging_system();

    info!("アプリケーション初期化を開始します...");

    let env_config = EnvironmentConfig::from_env();
    let config = ServerConfig::from_env()?;

    if let Err(e) = config.validate() {
        error!("設定の検証に失敗しました: {e}");
        if env_config.is_production() {
            return Err(e);
        }
        warn!("開発環境のため、設定エラーを無視して続行します");
    }

    set_app_timezone(config.timezone);

    info!("データベースを初期化しています: {}", config.database_path);
    let conn = open_database(&config.database_path).map_err(|e| {
        error!("データベースの初期化に失敗しました: {e}");
        e
    })?;

    let state = Arc::new(AppState::new(conn, config));
    bootstrap_admin(&state)?;

    info!("アプリケーション初期化が完了しました");

    HttpServer::new(Arc::clone(&state)).serve().await
}

/// 環境変数の管理者トークンを登録する
fn bootstrap_admin(state: &AppState) -> AppResult<()> {
    let Some(token) = state.config.admin_bootstrap_token.as_deref() else {
        warn!("ADMIN_BOOTSTRAP_TOKENが未設定です。管理者APIは既存のトークンでのみ利用できます");
        return Ok(());
    };

    let db = state.lock_db()?;
    let admin = auth_repository::ensure_admin(
        &db,
        BOOTSTRAP_ADMIN_USERNAME,
        token,
        state.config.token_ttl_days,
    )?;
    info!("管理者トークンを登録しました: user_id={}", admin.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::database::create_in_memory_connection;

    #[test]
    fn test_bootstrap_admin_registers_token() {
        let mut config = ServerConfig::for_tests();
        config.admin_bootstrap_token = Some("bootstrap-admin-token-0001".to_string());
        let state = AppState::new(create_in_memory_connection().unwrap(), config);

        bootstrap_admin(&state).unwrap();

        let principal = state
            .auth
            .require_admin(Some("bootstrap-admin-token-0001"), "/api/admin/clients")
            .unwrap();
        assert_eq!(principal.user.username, BOOTSTRAP_ADMIN_USERNAME);
    }

    #[test]
    fn test_bootstrap_admin_without_token_is_noop() {
        let state = AppState::new(create_in_memory_connection().unwrap(), ServerConfig::for_tests());
        bootstrap_admin(&state).unwrap();

        let users: i64 = state
            .lock_db()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(users, 0);
    }
}
