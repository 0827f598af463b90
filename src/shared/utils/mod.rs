use crate::shared::errors::{AppError, AppResult};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

/// アプリケーション全体で使用するタイムゾーン（起動時に一度だけ設定）
static APP_TIMEZONE: OnceCell<Tz> = OnceCell::new();

/// 電話番号として許可する形式
static PHONE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9][0-9 \-]{3,18}$").expect("電話番号の正規表現が不正です"));

/// ユーザー名として許可する形式
static USERNAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.@+\-]{1,150}$").expect("ユーザー名の正規表現が不正です"));

/// 金額の上限（12桁・小数点以下2桁）
const MAX_AMOUNT_INTEGER_DIGITS: u32 = 10;

/// タイムゾーンを設定する
///
/// 2回目以降の呼び出しは無視される
pub fn set_app_timezone(tz: Tz) {
    if APP_TIMEZONE.set(tz).is_err() {
        log::debug!("タイムゾーンは既に設定済みです: {}", app_timezone());
    }
}

/// 現在のタイムゾーンを取得する（未設定の場合はAsia/Tokyo）
pub fn app_timezone() -> Tz {
    *APP_TIMEZONE.get().unwrap_or(&chrono_tz::Asia::Tokyo)
}

/// 現在の日時をアプリケーションのタイムゾーンで取得
///
/// # 戻り値
/// RFC3339文字列
pub fn current_timestamp() -> String {
    Utc::now().with_timezone(&app_timezone()).to_rfc3339()
}

/// 経費・入金の日付（YYYY-MM-DD）を検証して解析する
///
/// 実在しない日付と1900〜2100年の範囲外は受け付けない
pub fn validate_date(date_str: &str) -> AppResult<NaiveDate> {
    if date_str.len() != 10 {
        return Err(AppError::validation(
            "日付はYYYY-MM-DD形式で入力してください",
        ));
    }

    let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .map_err(|_| AppError::validation("無効な日付です"))?;

    let year = date.year();
    if !(1900..=2100).contains(&year) {
        return Err(AppError::validation(
            "日付は1900年から2100年の間で入力してください",
        ));
    }

    Ok(date)
}

/// 金額を検証する（0より大きく、整数部10桁・小数部2桁まで）
pub fn validate_amount(amount: &Decimal) -> AppResult<()> {
    if amount.is_sign_negative() || amount.is_zero() {
        return Err(AppError::validation("金額は正の数値で入力してください"));
    }

    let limit = Decimal::from(10_i64.pow(MAX_AMOUNT_INTEGER_DIGITS));
    if *amount >= limit {
        return Err(AppError::validation("金額は10桁以内で入力してください"));
    }

    if amount.normalize().scale() > 2 {
        return Err(AppError::validation(
            "金額は小数点以下2桁まで入力してください",
        ));
    }

    Ok(())
}

/// 予算のバリデーション（0を許可する）
pub fn validate_budget(budget: &Decimal) -> AppResult<()> {
    if budget.is_zero() {
        return Ok(());
    }
    validate_amount(budget).map_err(|_| {
        AppError::validation("予算は0以上・10桁以内・小数点以下2桁までで入力してください")
    })
}

/// 金額を保存・表示用の文字列に変換する（常に小数点以下2桁）
pub fn format_amount(amount: &Decimal) -> String {
    format!("{:.2}", amount.round_dp(2))
}

/// 保存された金額文字列を解析する
pub fn parse_stored_amount(raw: &str) -> AppResult<Decimal> {
    Decimal::from_str(raw)
        .map_err(|e| AppError::Database(format!("保存された金額が不正です: {raw} ({e})")))
}

/// rusqliteの行から金額カラムを読み取る
pub fn amount_from_row(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// 作成日時で絞り込む（タイムゾーンが異なっても正しく比較する）
pub fn filter_created_after<T>(
    records: Vec<T>,
    after: Option<&str>,
    created_at: impl Fn(&T) -> &str,
) -> AppResult<Vec<T>> {
    let Some(after) = after else {
        return Ok(records);
    };
    let threshold = DateTime::parse_from_rfc3339(after)
        .map_err(|e| AppError::Database(format!("基準日時が不正です: {after} ({e})")))?;

    Ok(records
        .into_iter()
        .filter(|record| {
            DateTime::parse_from_rfc3339(created_at(record))
                .map(|ts| ts > threshold)
                .unwrap_or(true)
        })
        .collect())
}

/// 文字数（バイト数ではない）の上限を検証する
pub fn validate_text_length(text: &str, max_length: usize, field_name: &str) -> AppResult<()> {
    let char_count = text.chars().count();
    if char_count > max_length {
        return Err(AppError::validation(format!(
            "{field_name}は{max_length}文字以内にしてください（{char_count}文字入力されています）"
        )));
    }
    Ok(())
}

/// 空白のみの入力を拒否する
pub fn validate_required_field(text: &str, field_name: &str) -> AppResult<()> {
    if text.trim().is_empty() {
        return Err(AppError::validation(format!("{field_name}は必須項目です")));
    }
    Ok(())
}

/// 電話番号のバリデーション（空文字は許可）
pub fn validate_phone(phone: &str) -> AppResult<()> {
    if phone.is_empty() {
        return Ok(());
    }
    if !PHONE_PATTERN.is_match(phone) {
        return Err(AppError::validation("電話番号の形式が正しくありません"));
    }
    Ok(())
}

/// ユーザー名のバリデーション
pub fn validate_username(username: &str) -> AppResult<()> {
    validate_required_field(username, "ユーザー名")?;
    if !USERNAME_PATTERN.is_match(username) {
        return Err(AppError::validation(
            "ユーザー名は150文字以内の英数字と @.+-_ のみ使用できます",
        ));
    }
    Ok(())
}

/// 前後の空白を除いた文字列
pub fn normalize_string(text: &str) -> String {
    text.trim().to_string()
}

/// 真偽値のクエリパラメータを解釈する
pub fn parse_bool_flag(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.to_ascii_lowercase()).as_deref(),
        Some("1") | Some("true") | Some("yes")
    )
}
