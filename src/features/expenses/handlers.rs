use crate::features::clients::repository as client_repository;
use crate::features::expenses::models::{CreateExpenseDto, Expense, UpdateExpenseDto};
use crate::features::expenses::repository;
use crate::features::versions::models::VersionKind;
use crate::features::versions::repository as version_repository;
use crate::server::{ApiReply, ApiRequest};
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::parse_bool_flag;
use crate::AppState;
use rusqlite::Connection;

/// 経費一覧を取得する（管理者用）
///
/// # クエリ
/// * `client_id` - 顧客IDで絞り込み（任意）
/// * `since_last_version` - trueの場合、最新バージョン以降に作成された経費のみ（client_id必須）
pub fn admin_list(state: &AppState, req: &ApiRequest) -> AppResult<ApiReply> {
    state.auth.require_admin(req.token(), &req.path)?;
    let client_id = req.query_i64("client_id")?;
    let since_last_version = parse_bool_flag(req.query_param("since_last_version"));

    let db = state.lock_db()?;
    let expenses = match (client_id, since_last_version) {
        (Some(client_id), true) => {
            client_repository::ensure_exists(&db, client_id)?;
            list_since_last_version(&db, client_id)?
        }
        (None, true) => {
            return Err(AppError::validation(
                "since_last_version を指定する場合は client_id が必須です",
            ))
        }
        (client_id, false) => repository::find_all(&db, client_id)?,
    };
    ApiReply::ok(&expenses)
}

/// 経費を作成する（管理者用）
pub fn admin_create(state: &AppState, req: &ApiRequest) -> AppResult<ApiReply> {
    state.auth.require_admin(req.token(), &req.path)?;
    let dto: CreateExpenseDto = req.json()?;

    let db = state.lock_db()?;
    client_repository::ensure_exists(&db, dto.client_id)?;
    ApiReply::created(&repository::create(&db, dto)?)
}

/// 経費を更新する（管理者用）
pub fn admin_update(state: &AppState, req: &ApiRequest, id: i64) -> AppResult<ApiReply> {
    state.auth.require_admin(req.token(), &req.path)?;
    let dto: UpdateExpenseDto = req.json()?;

    let db = state.lock_db()?;
    ApiReply::ok(&repository::update(&db, id, dto)?)
}

/// 経費を削除する（管理者用）
pub fn admin_delete(state: &AppState, req: &ApiRequest, id: i64) -> AppResult<ApiReply> {
    state.auth.require_admin(req.token(), &req.path)?;
    let db = state.lock_db()?;
    repository::delete(&db, id)?;
    Ok(ApiReply::no_content())
}

/// 自分の経費一覧を取得する（顧客用、?since_last_version=true に対応）
pub fn client_list(state: &AppState, req: &ApiRequest) -> AppResult<ApiReply> {
    let (_, client_id) = state.auth.require_client(req.token(), &req.path)?;
    let since_last_version = parse_bool_flag(req.query_param("since_last_version"));

    let db = state.lock_db()?;
    let expenses = if since_last_version {
        list_since_last_version(&db, client_id)?
    } else {
        repository::find_all(&db, Some(client_id))?
    };
    ApiReply::ok(&expenses)
}

/// 最新バージョンの協議完了以降に作成された経費
fn list_since_last_version(conn: &Connection, client_id: i64) -> AppResult<Vec<Expense>> {
    let after = version_repository::latest_completed_at(conn, VersionKind::Expenses, client_id)?;
    repository::find_created_after(conn, client_id, after.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::auth::repository::{create_user, issue_token};
    use crate::features::clients::models::CreateClientDto;
    use crate::shared::config::ServerConfig;
    use crate::shared::database::create_in_memory_connection;
    use hyper::{Method, StatusCode};
    use rust_decimal::Decimal;

    struct Fixture {
        state: AppState,
        admin_token: String,
        client_token: String,
        client_id: i64,
    }

    fn setup() -> Fixture {
        let state = AppState::new(create_in_memory_connection().unwrap(), ServerConfig::for_tests());
        let (admin_token, client_token, client_id) = {
            let mut db = state.lock_db().unwrap();
            let admin = create_user(&db, "admin", true).unwrap();
            let admin_token = issue_token(&db, admin.id, 1).unwrap().token;
            let created = client_repository::create(
                &mut db,
                CreateClientDto {
                    username: "client".to_string(),
                    phone: None,
                    address: None,
                    budget: Decimal::from(1000),
                    project_title: "House".to_string(),
                },
                1,
            )
            .unwrap();
            (admin_token, created.access_token.token, created.client.id)
        };
        Fixture {
            state,
            admin_token,
            client_token,
            client_id,
        }
    }

    fn create_expense(fx: &Fixture, amount: &str) {
        let body = format!(
            r#"{{"client_id":{},"date":"2024-05-01","description":"Tiles","amount":"{amount}"}}"#,
            fx.client_id
        );
        let req = ApiRequest::new(
            Method::POST,
            "/api/admin/expenses",
            Some(&fx.admin_token),
            body.into_bytes(),
        );
        assert_eq!(admin_create(&fx.state, &req).unwrap().status, StatusCode::CREATED);
    }

    #[test]
    fn test_client_sees_only_new_expenses_after_version() {
        let fx = setup();
        create_expense(&fx, "100");
        create_expense(&fx, "200");

        fx.state
            .versioning
            .complete_discussion(VersionKind::Expenses, fx.client_id)
            .unwrap();
        create_expense(&fx, "300");

        let all = ApiRequest::new(Method::GET, "/api/expenses", Some(&fx.client_token), Vec::new());
        let body = client_list(&fx.state, &all).unwrap().body.unwrap();
        assert_eq!(body.as_array().unwrap().len(), 3);

        let since = ApiRequest::new(
            Method::GET,
            "/api/expenses?since_last_version=true",
            Some(&fx.client_token),
            Vec::new(),
        );
        let body = client_list(&fx.state, &since).unwrap().body.unwrap();
        let items = body.as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["amount"], "300.00");
    }

    #[test]
    fn test_admin_create_for_unknown_client() {
        let fx = setup();
        let req = ApiRequest::new(
            Method::POST,
            "/api/admin/expenses",
            Some(&fx.admin_token),
            br#"{"client_id":999,"date":"2024-05-01","description":"x","amount":"1"}"#.to_vec(),
        );
        assert!(matches!(
            admin_create(&fx.state, &req),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_client_cannot_use_admin_routes() {
        let fx = setup();
        let req = ApiRequest::new(
            Method::GET,
            "/api/admin/expenses",
            Some(&fx.client_token),
            Vec::new(),
        );
        assert!(matches!(
            admin_list(&fx.state, &req),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn test_since_last_version_requires_client_id_for_admin() {
        let fx = setup();
        let req = ApiRequest::new(
            Method::GET,
            "/api/admin/expenses?since_last_version=1",
            Some(&fx.admin_token),
            Vec::new(),
        );
        assert!(matches!(
            admin_list(&fx.state, &req),
            Err(AppError::Validation(_))
        ));
    }
}
