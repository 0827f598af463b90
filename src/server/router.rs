use crate::features::auth::auth_helpers;
use crate::features::auth::handlers as auth_handlers;
use crate::features::cash_receipts::handlers as cash_receipt_handlers;
use crate::features::clients::handlers as client_handlers;
use crate::features::expenses::handlers as expense_handlers;
use crate::features::messages::handlers as message_handlers;
use crate::features::projects::handlers as project_handlers;
use crate::features::versions::handlers as version_handlers;
use crate::features::versions::VersionKind;
use crate::server::request::ApiRequest;
use crate::server::response::{error_reply, ApiReply};
use crate::shared::errors::{AppError, AppResult};
use crate::AppState;
use hyper::Method;
use serde_json::json;

/// リクエストをハンドラーに振り分け、エラーを応答に変換する
pub fn dispatch(state: &AppState, req: &ApiRequest) -> ApiReply {
    match route(state, req) {
        Ok(reply) => reply,
        Err(e) => error_reply(&e, &req.request_id),
    }
}

/// パスとメソッドからハンドラーを選ぶ
///
/// 末尾のスラッシュは無視する（"/api/client/expense-versions/" と
/// "/api/client/expense-versions" は同じ）
fn route(state: &AppState, req: &ApiRequest) -> AppResult<ApiReply> {
    if !auth_helpers::is_public_endpoint(&req.path) && req.token().is_none() {
        return Err(AppError::unauthorized("認証トークンがありません"));
    }

    let segments: Vec<&str> = req.path.split('/').filter(|s| !s.is_empty()).collect();

    match (&req.method, segments.as_slice()) {
        (&Method::GET, ["health"]) => ApiReply::ok(&json!({ "status": "ok" })),

        // 認証
        (&Method::GET, ["api", "auth", "me"]) => auth_handlers::me(state, req),
        (&Method::POST, ["api", "admin", "tokens"]) => auth_handlers::issue_token(state, req),

        // 顧客管理
        (&Method::GET, ["api", "admin", "clients"]) => client_handlers::list_clients(state, req),
        (&Method::POST, ["api", "admin", "clients"]) => client_handlers::create_client(state, req),
        (&Method::GET, ["api", "admin", "clients", id]) => {
            client_handlers::get_client(state, req, parse_id(id)?)
        }
        (&Method::PATCH, ["api", "admin", "clients", id]) => {
            client_handlers::update_client(state, req, parse_id(id)?)
        }
        (&Method::DELETE, ["api", "admin", "clients", id]) => {
            client_handlers::delete_client(state, req, parse_id(id)?)
        }
        (&Method::POST, ["api", "admin", "clients", id, "complete"]) => {
            client_handlers::complete_client(state, req, parse_id(id)?)
        }
        (&Method::POST, ["api", "admin", "clients", id, "reopen-discussion"]) => {
            client_handlers::reopen_discussion(state, req, parse_id(id)?)
        }

        // 経費
        (&Method::GET, ["api", "admin", "expenses"]) => expense_handlers::admin_list(state, req),
        (&Method::POST, ["api", "admin", "expenses"]) => expense_handlers::admin_create(state, req),
        (&Method::PATCH, ["api", "admin", "expenses", id]) => {
            expense_handlers::admin_update(state, req, parse_id(id)?)
        }
        (&Method::DELETE, ["api", "admin", "expenses", id]) => {
            expense_handlers::admin_delete(state, req, parse_id(id)?)
        }

        // 入金
        (&Method::GET, ["api", "admin", "payments"]) => {
            cash_receipt_handlers::admin_list(state, req)
        }
        (&Method::POST, ["api", "admin", "cash-receipts"]) => {
            cash_receipt_handlers::admin_create(state, req)
        }
        (&Method::PATCH, ["api", "admin", "cash-receipts", id]) => {
            cash_receipt_handlers::admin_update(state, req, parse_id(id)?)
        }
        (&Method::DELETE, ["api", "admin", "cash-receipts", id]) => {
            cash_receipt_handlers::admin_delete(state, req, parse_id(id)?)
        }

        // 進捗
        (&Method::GET, ["api", "admin", "progress"]) => {
            project_handlers::admin_list_progress(state, req)
        }
        (&Method::PATCH, ["api", "admin", "progress", id]) => {
            project_handlers::admin_update_progress(state, req, parse_id(id)?)
        }

        // メッセージ
        (&Method::GET, ["api", "admin", "messages"]) => message_handlers::admin_list(state, req),
        (&Method::POST, ["api", "admin", "messages"]) => message_handlers::admin_send(state, req),
        (&Method::POST, ["api", "admin", "messages", "read"]) => {
            message_handlers::admin_mark_read(state, req)
        }
        (&Method::GET, ["api", "admin", "messages", "unread-count"]) => {
            message_handlers::admin_unread_count(state, req)
        }

        // バージョン（管理者）
        (&Method::POST, ["api", "admin", resource, "create-version"]) => {
            version_handlers::admin_create(state, req, version_kind(resource)?)
        }
        (&Method::GET, ["api", "admin", resource @ ("expense-versions" | "payment-versions")]) => {
            version_handlers::admin_list(state, req, version_kind(resource)?)
        }
        (&Method::GET, ["api", "admin", resource @ ("expense-versions" | "payment-versions"), id]) => {
            version_handlers::admin_get(state, req, version_kind(resource)?, parse_id(id)?)
        }

        // バージョン（顧客）
        (&Method::GET, ["api", "client", resource @ ("expense-versions" | "payment-versions")]) => {
            version_handlers::client_list(state, req, version_kind(resource)?)
        }
        (&Method::GET, ["api", "client", resource @ ("expense-versions" | "payment-versions"), id]) => {
            version_handlers::client_get(state, req, version_kind(resource)?, parse_id(id)?)
        }

        // 顧客向け
        (&Method::GET, ["api", "projects"]) => project_handlers::client_projects(state, req),
        (&Method::GET, ["api", "progress"]) => project_handlers::client_progress(state, req),
        (&Method::GET, ["api", "expenses"]) => expense_handlers::client_list(state, req),
        (&Method::GET, ["api", "client", "payments"]) => {
            cash_receipt_handlers::client_list(state, req)
        }
        (&Method::GET, ["api", "messages"]) => message_handlers::client_list(state, req),
        (&Method::POST, ["api", "messages"]) => message_handlers::client_send(state, req),
        (&Method::POST, ["api", "messages", "read"]) => {
            message_handlers::client_mark_read(state, req)
        }
        (&Method::GET, ["api", "messages", "unread-count"]) => {
            message_handlers::client_unread_count(state, req)
        }

        _ => {
            log::debug!("未定義のルート: {} {}", req.method, req.path);
            Err(AppError::not_found("エンドポイント"))
        }
    }
}

/// パス中のIDを解析する（整数でなければ該当なし）
fn parse_id(raw: &str) -> AppResult<i64> {
    raw.parse::<i64>()
        .map_err(|_| AppError::not_found("エンドポイント"))
}

/// "expense-versions" / "payment-versions" を種別に変換する
fn version_kind(resource: &str) -> AppResult<VersionKind> {
    match resource {
        "expense-versions" => Ok(VersionKind::Expenses),
        "payment-versions" => Ok(VersionKind::Payments),
        _ => Err(AppError::not_found("エンドポイント")),
    }
}
