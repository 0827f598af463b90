use crate::features::auth::repository::MAX_TOKEN_TTL_DAYS;
use crate::shared::errors::{AppError, AppResult};
use chrono_tz::Tz;
use std::net::SocketAddr;
use std::str::FromStr;

/// 実行環境
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// ENVIRONMENT の値から判定する（"production" 以外は開発環境）
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }

    /// 環境ごとの .env ファイル名
    pub fn env_file(&self) -> &'static str {
        match self {
            Environment::Development => ".env",
            Environment::Production => ".env.production",
        }
    }

    /// DATABASE_PATH 未指定時のデータベースファイル
    pub fn default_database_path(&self) -> &'static str {
        match self {
            Environment::Development => "dev_backoffice.db",
            Environment::Production => "backoffice.db",
        }
    }

    /// LOG_LEVEL 未指定時のログレベル
    pub fn default_log_level(&self) -> log::LevelFilter {
        match self {
            Environment::Development => log::LevelFilter::Debug,
            Environment::Production => log::LevelFilter::Info,
        }
    }
}

/// 実行環境とログの設定
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub environment: Environment,
    pub log_level: log::LevelFilter,
}

impl EnvironmentConfig {
    /// ENVIRONMENT と LOG_LEVEL から読み込む
    ///
    /// LOG_LEVEL が解釈できない場合は環境ごとの既定値を使う
    pub fn from_env() -> Self {
        let environment = get_environment();
        let log_level = std::env::var("LOG_LEVEL")
            .ok()
            .and_then(|raw| log::LevelFilter::from_str(raw.trim()).ok())
            .unwrap_or_else(|| environment.default_log_level());

        Self {
            environment,
            log_level,
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// デバッグ出力を有効にするか
    pub fn debug_mode(&self) -> bool {
        self.environment == Environment::Development
    }
}

/// サーバー設定
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// 待ち受けアドレス
    pub bind_address: String,
    pub database_path: String,
    /// タイムスタンプに使用するタイムゾーン
    pub timezone: Tz,
    /// 起動時に管理者へ登録するトークン（任意）
    pub admin_bootstrap_token: Option<String>,
    /// アクセストークンの有効日数
    pub token_ttl_days: i64,
}

impl ServerConfig {
    /// 環境変数からサーバー設定を読み込む
    ///
    /// # 戻り値
    /// サーバー設定。APP_TIMEZONE・TOKEN_TTL_DAYS が解釈できない場合はエラー
    pub fn from_env() -> AppResult<Self> {
        let environment = get_environment();

        let bind_address = env_or("BIND_ADDRESS", "127.0.0.1:8000");
        let database_path = env_or("DATABASE_PATH", environment.default_database_path());

        let timezone_name = env_or("APP_TIMEZONE", "Asia/Tokyo");
        let timezone = Tz::from_str(&timezone_name).map_err(|e| {
            AppError::configuration(format!("APP_TIMEZONE が不正です: {timezone_name} ({e})"))
        })?;

        let admin_bootstrap_token = std::env::var("ADMIN_BOOTSTRAP_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());

        let token_ttl_days = match std::env::var("TOKEN_TTL_DAYS") {
            Ok(raw) => raw.trim().parse::<i64>().map_err(|_| {
                AppError::configuration(format!("TOKEN_TTL_DAYS は整数で指定してください: {raw}"))
            })?,
            Err(_) => 30,
        };

        log::debug!(
            "サーバー設定: bind_address={bind_address}, database_path={database_path}, timezone={timezone}, token_ttl_days={token_ttl_days}"
        );

        Ok(Self {
            bind_address,
            database_path,
            timezone,
            admin_bootstrap_token,
            token_ttl_days,
        })
    }

    /// 設定値の整合性を検証する
    pub fn validate(&self) -> AppResult<()> {
        self.bind_address.parse::<SocketAddr>().map_err(|_| {
            AppError::configuration(format!(
                "BIND_ADDRESS の形式が不正です: {}",
                self.bind_address
            ))
        })?;

        if self.database_path.trim().is_empty() {
            return Err(AppError::configuration("DATABASE_PATH が空です"));
        }

        if !(1..=MAX_TOKEN_TTL_DAYS).contains(&self.token_ttl_days) {
            return Err(AppError::configuration(format!(
                "TOKEN_TTL_DAYS は1〜{MAX_TOKEN_TTL_DAYS}の範囲で指定してください"
            )));
        }

        if let Some(token) = &self.admin_bootstrap_token {
            if token.len() < 16 {
                return Err(AppError::configuration(
                    "ADMIN_BOOTSTRAP_TOKEN は16文字以上である必要があります",
                ));
            }
        }

        Ok(())
    }

    /// テスト用の設定（メモリDB・ランダムポート）
    pub fn for_tests() -> Self {
        Self {
            bind_address: "127.0.0.1:0".to_string(),
            database_path: ":memory:".to_string(),
            timezone: chrono_tz::Asia::Tokyo,
            admin_bootstrap_token: None,
            token_ttl_days: 30,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// 現在の実行環境を判定する
///
/// ENVIRONMENT があればそれに従い、なければビルド設定（debug_assertions）で決める
pub fn get_environment() -> Environment {
    match std::env::var("ENVIRONMENT") {
        Ok(name) => Environment::from_name(&name),
        Err(_) if cfg!(debug_assertions) => Environment::Development,
        Err(_) => Environment::Production,
    }
}

/// 環境に応じた .env ファイルを読み込む
///
/// # 戻り値
/// 読み込んだファイル名（見つからなければNone）
pub fn load_environment_variables() -> Option<&'static str> {
    let env_file = get_environment().env_file();

    if dotenv::from_filename(env_file).is_ok() {
        log::info!("{env_file} を読み込みました");
        return Some(env_file);
    }

    if env_file != ".env" && dotenv::dotenv().is_ok() {
        log::warn!("{env_file} がないため .env を読み込みました");
        return Some(".env");
    }

    log::warn!("環境変数ファイルが見つかりません。プロセスの環境変数のみを使用します");
    None
}

/// ログを初期化する
///
/// RUST_LOG の指定があればそちらを優先する。二度目以降の呼び出しは何もしない
pub fn initialize_logging_system() {
    let env_config = EnvironmentConfig::from_env();

    let initialized = env_logger::Builder::new()
        .filter_level(env_config.log_level)
        .parse_default_env()
        .format_timestamp_secs()
        .format_module_path(false)
        .format_target(false)
        .try_init()
        .is_ok();

    if initialized {
        log::info!(
            "ログを初期化しました: level={}, environment={}",
            env_config.log_level,
            env_config.environment.as_str()
        );
    }
}
