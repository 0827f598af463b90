use crate::features::auth::models::{IssuedToken, Principal, User};
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::{app_timezone, current_timestamp, validate_username};
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};

/// トークンのランダム部分のバイト数
const TOKEN_BYTES: usize = 32;

/// トークン有効日数の上限
pub const MAX_TOKEN_TTL_DAYS: i64 = 3650;

/// ユーザーを作成する
///
/// # 引数
/// * `conn` - データベース接続
/// * `username` - ユーザー名（一意）
/// * `is_staff` - 管理者フラグ
///
/// # 戻り値
/// 作成されたユーザー、重複時は競合エラー
pub fn create_user(conn: &Connection, username: &str, is_staff: bool) -> AppResult<User> {
    validate_username(username)?;

    let now = current_timestamp();
    conn.execute(
        "INSERT INTO users (username, is_staff, created_at) VALUES (?1, ?2, ?3)",
        params![username, is_staff, now],
    )
    .map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => {
            AppError::conflict(format!("ユーザー名 {username} は既に使用されています"))
        }
        other => other,
    })?;

    let id = conn.last_insert_rowid();
    find_user_by_id(conn, id)
}

/// IDでユーザーを取得する
pub fn find_user_by_id(conn: &Connection, id: i64) -> AppResult<User> {
    conn.query_row(
        "SELECT id, username, is_staff, created_at FROM users WHERE id = ?1",
        params![id],
        map_user,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => AppError::not_found("ユーザー"),
        _ => AppError::from(e),
    })
}

/// ユーザー名でユーザーを取得する
pub fn find_user_by_username(conn: &Connection, username: &str) -> AppResult<Option<User>> {
    conn.query_row(
        "SELECT id, username, is_staff, created_at FROM users WHERE username = ?1",
        params![username],
        map_user,
    )
    .optional()
    .map_err(AppError::from)
}

fn map_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        is_staff: row.get::<_, i64>(2)? != 0,
        created_at: row.get(3)?,
    })
}

/// ランダムなアクセストークンを生成する
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// トークンのSHA-256ハッシュ（16進）を計算する
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// 新しいアクセストークンを発行する
///
/// # 引数
/// * `conn` - データベース接続
/// * `user_id` - 発行対象のユーザーID
/// * `ttl_days` - 有効日数
pub fn issue_token(conn: &Connection, user_id: i64, ttl_days: i64) -> AppResult<IssuedToken> {
    let token = generate_token();
    store_token(conn, user_id, &token, ttl_days)
}

/// 指定された平文トークンをハッシュ化して保存する
///
/// 起動時の管理者トークン登録にも使用する
pub fn store_token(
    conn: &Connection,
    user_id: i64,
    token: &str,
    ttl_days: i64,
) -> AppResult<IssuedToken> {
    if !(1..=MAX_TOKEN_TTL_DAYS).contains(&ttl_days) {
        return Err(AppError::validation(format!(
            "有効日数は1〜{MAX_TOKEN_TTL_DAYS}の範囲で指定してください"
        )));
    }

    // ユーザーの存在確認
    find_user_by_id(conn, user_id)?;

    let expires_at = Duration::try_days(ttl_days)
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .ok_or_else(|| AppError::validation("有効期限を計算できません"))?
        .with_timezone(&app_timezone())
        .to_rfc3339();

    conn.execute(
        "INSERT OR REPLACE INTO access_tokens (token_hash, user_id, expires_at, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![hash_token(token), user_id, expires_at, current_timestamp()],
    )?;

    log::info!("アクセストークンを発行しました: user_id={user_id}, expires_at={expires_at}");

    Ok(IssuedToken {
        user_id,
        token: token.to_string(),
        expires_at,
    })
}

/// トークンからリクエスト主体を解決する
///
/// # 戻り値
/// 有効なトークンの場合はSome、未登録・期限切れの場合はNone
pub fn find_principal_by_token(conn: &Connection, token: &str) -> AppResult<Option<Principal>> {
    let token_hash = hash_token(token);

    let row = conn
        .query_row(
            "SELECT u.id, u.username, u.is_staff, u.created_at, t.expires_at, c.id
             FROM access_tokens t
             JOIN users u ON u.id = t.user_id
             LEFT JOIN clients c ON c.user_id = u.id AND c.is_deleted = 0
             WHERE t.token_hash = ?1",
            params![token_hash],
            |row| {
                Ok((
                    map_user(row)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<i64>>(5)?,
                ))
            },
        )
        .optional()?;

    let Some((user, expires_at, client_id)) = row else {
        return Ok(None);
    };

    let expired = DateTime::parse_from_rfc3339(&expires_at)
        .map(|exp| exp.with_timezone(&Utc) < Utc::now())
        .unwrap_or(true);

    if expired {
        conn.execute(
            "DELETE FROM access_tokens WHERE token_hash = ?1",
            params![token_hash],
        )?;
        log::info!("期限切れトークンを削除しました: user_id={}", user.id);
        return Ok(None);
    }

    Ok(Some(Principal { user, client_id }))
}

/// ユーザーの全トークンを失効させる
pub fn revoke_tokens_for_user(conn: &Connection, user_id: i64) -> AppResult<usize> {
    let removed = conn.execute(
        "DELETE FROM access_tokens WHERE user_id = ?1",
        params![user_id],
    )?;
    log::info!("トークンを失効させました: user_id={user_id}, count={removed}");
    Ok(removed)
}

/// 管理者ユーザーと起動用トークンを用意する
///
/// # 引数
/// * `conn` - データベース接続
/// * `username` - 管理者ユーザー名
/// * `token` - 環境変数から与えられた平文トークン
/// * `ttl_days` - 有効日数
pub fn ensure_admin(
    conn: &Connection,
    username: &str,
    token: &str,
    ttl_days: i64,
) -> AppResult<User> {
    let user = match find_user_by_username(conn, username)? {
        Some(user) if user.is_staff => user,
        Some(_) => {
            return Err(AppError::configuration(format!(
                "ユーザー {username} は管理者ではありません"
            )))
        }
        None => {
            log::info!("管理者ユーザーを作成します: username={username}");
            create_user(conn, username, true)?
        }
    };

    store_token(conn, user.id, token, ttl_days)?;
    Ok(user)
}
