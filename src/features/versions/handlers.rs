use crate::features::versions::models::{CreateVersionDto, VersionKind};
use crate::server::{ApiReply, ApiRequest};
use crate::shared::errors::{AppError, AppResult};
use crate::AppState;

/// 作成対象の顧客IDを解決する（クエリ優先、なければボディ）
fn resolve_client_id(req: &ApiRequest) -> AppResult<i64> {
    if let Some(client_id) = req.query_i64("client_id")? {
        return Ok(client_id);
    }

    req.json_opt::<CreateVersionDto>()?
        .and_then(|dto| dto.client_id)
        .ok_or_else(|| AppError::validation("client_idは必須です"))
}

/// 協議を完了してバージョンを作成する（管理者用）
///
/// # 戻り値
/// 201 と作成されたバージョン
pub fn admin_create(state: &AppState, req: &ApiRequest, kind: VersionKind) -> AppResult<ApiReply> {
    let admin = state.auth.require_admin(req.token(), &req.path)?;
    let client_id = resolve_client_id(req)?;

    let version = state.versioning.complete_discussion(kind, client_id)?;

    log::info!(
        "協議を完了しました: admin_id={}, client_id={client_id}, kind={}, version={}, request_id={}",
        admin.user.id,
        kind.as_str(),
        version.version_number(),
        req.request_id
    );
    ApiReply::created(&version)
}

/// バージョン一覧を取得する（管理者用、?client_id で絞り込み）
pub fn admin_list(state: &AppState, req: &ApiRequest, kind: VersionKind) -> AppResult<ApiReply> {
    state.auth.require_admin(req.token(), &req.path)?;
    let client_id = req.query_i64("client_id")?;
    ApiReply::ok(&state.versioning.list(kind, client_id)?)
}

/// バージョンを取得する（管理者用）
pub fn admin_get(
    state: &AppState,
    req: &ApiRequest,
    kind: VersionKind,
    id: i64,
) -> AppResult<ApiReply> {
    state.auth.require_admin(req.token(), &req.path)?;
    ApiReply::ok(&state.versioning.get(kind, id)?)
}

/// 自分のバージョン一覧を取得する（顧客用）
pub fn client_list(state: &AppState, req: &ApiRequest, kind: VersionKind) -> AppResult<ApiReply> {
    let (_, client_id) = state.auth.require_client(req.token(), &req.path)?;
    ApiReply::ok(&state.versioning.list(kind, Some(client_id))?)
}

/// 自分のバージョンを取得する（顧客用、他の顧客のものは404）
pub fn client_get(
    state: &AppState,
    req: &ApiRequest,
    kind: VersionKind,
    id: i64,
) -> AppResult<ApiReply> {
    let (_, client_id) = state.auth.require_client(req.token(), &req.path)?;
    ApiReply::ok(&state.versioning.get_for_client(kind, id, client_id)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::auth::repository::{create_user, issue_token};
    use crate::features::clients::models::CreateClientDto;
    use crate::features::clients::repository as client_repository;
    use crate::features::expenses::models::{CreateExpenseDto, ExpenseStatus};
    use crate::features::expenses::repository as expense_repository;
    use crate::shared::config::ServerConfig;
    use crate::shared::database::create_in_memory_connection;
    use hyper::{Method, StatusCode};
    use rust_decimal::Decimal;

    struct Fixture {
        state: AppState,
        admin_token: String,
        clients: Vec<(i64, String)>,
    }

    fn setup() -> Fixture {
        let state = AppState::new(create_in_memory_connection().unwrap(), ServerConfig::for_tests());
        let (admin_token, clients) = {
            let mut db = state.lock_db().unwrap();
            let admin = create_user(&db, "admin", true).unwrap();
            let admin_token = issue_token(&db, admin.id, 1).unwrap().token;

            let clients: Vec<(i64, String)> = ["first", "second"]
                .iter()
                .map(|name| {
                    let created = client_repository::create(
                        &mut db,
                        CreateClientDto {
                            username: name.to_string(),
                            phone: None,
                            address: None,
                            budget: Decimal::ZERO,
                            project_title: format!("{name} project"),
                        },
                        1,
                    )
                    .unwrap();
                    expense_repository::create(
                        &db,
                        CreateExpenseDto {
                            client_id: created.client.id,
                            date: "2024-08-01".to_string(),
                            description: "Paint".to_string(),
                            amount: Decimal::from(80),
                            status: ExpenseStatus::Upcoming,
                            bill_url: None,
                        },
                    )
                    .unwrap();
                    (created.client.id, created.access_token.token)
                })
                .collect();
            (admin_token, clients)
        };
        Fixture {
            state,
            admin_token,
            clients,
        }
    }

    fn request(method: Method, path: &str, token: &str, body: &str) -> ApiRequest {
        ApiRequest::new(method, path, Some(token), body.as_bytes().to_vec())
    }

    #[test]
    fn test_create_version_from_query_or_body() {
        let fx = setup();
        let (client_id, _) = fx.clients[0];

        let by_query = request(
            Method::POST,
            &format!("/api/admin/expense-versions/create-version?client_id={client_id}"),
            &fx.admin_token,
            "",
        );
        let reply = admin_create(&fx.state, &by_query, VersionKind::Expenses).unwrap();
        assert_eq!(reply.status, StatusCode::CREATED);
        let body = reply.body.unwrap();
        assert_eq!(body["version_number"], 1);
        assert_eq!(body["expenses_data"][0]["amount"], "80.00");
        assert_eq!(body["expenses_data"][0]["status"], "upcoming");

        let by_body = request(
            Method::POST,
            "/api/admin/expense-versions/create-version",
            &fx.admin_token,
            &format!(r#"{{"client_id":{client_id}}}"#),
        );
        let reply = admin_create(&fx.state, &by_body, VersionKind::Expenses).unwrap();
        assert_eq!(reply.body.unwrap()["version_number"], 2);
    }

    #[test]
    fn test_create_version_error_cases() {
        let fx = setup();

        let missing = request(
            Method::POST,
            "/api/admin/expense-versions/create-version",
            &fx.admin_token,
            "",
        );
        assert!(matches!(
            admin_create(&fx.state, &missing, VersionKind::Expenses),
            Err(AppError::Validation(_))
        ));

        let unknown = request(
            Method::POST,
            "/api/admin/expense-versions/create-version?client_id=9999",
            &fx.admin_token,
            "",
        );
        assert!(matches!(
            admin_create(&fx.state, &unknown, VersionKind::Expenses),
            Err(AppError::NotFound(_))
        ));

        // 入金がない顧客
        let (client_id, _) = fx.clients[0];
        let empty = request(
            Method::POST,
            &format!("/api/admin/payment-versions/create-version?client_id={client_id}"),
            &fx.admin_token,
            "",
        );
        assert!(matches!(
            admin_create(&fx.state, &empty, VersionKind::Payments),
            Err(AppError::Validation(_))
        ));

        // 顧客は作成できない
        let (_, client_token) = &fx.clients[0];
        let as_client = request(
            Method::POST,
            &format!("/api/admin/expense-versions/create-version?client_id={client_id}"),
            client_token,
            "",
        );
        assert!(matches!(
            admin_create(&fx.state, &as_client, VersionKind::Expenses),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn test_client_reads_only_own_versions() {
        let fx = setup();
        let (first_id, first_token) = fx.clients[0].clone();
        let (second_id, second_token) = fx.clients[1].clone();

        let first_version = fx
            .state
            .versioning
            .complete_discussion(VersionKind::Expenses, first_id)
            .unwrap();
        fx.state
            .versioning
            .complete_discussion(VersionKind::Expenses, second_id)
            .unwrap();

        let own = request(
            Method::GET,
            &format!("/api/client/expense-versions/{}", first_version.id()),
            &first_token,
            "",
        );
        assert!(client_get(&fx.state, &own, VersionKind::Expenses, first_version.id()).is_ok());

        let other = request(
            Method::GET,
            &format!("/api/client/expense-versions/{}", first_version.id()),
            &second_token,
            "",
        );
        assert!(matches!(
            client_get(&fx.state, &other, VersionKind::Expenses, first_version.id()),
            Err(AppError::NotFound(_))
        ));

        let list = request(Method::GET, "/api/client/expense-versions/", &second_token, "");
        let body = client_list(&fx.state, &list, VersionKind::Expenses)
            .unwrap()
            .body
            .unwrap();
        let versions = body.as_array().unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0]["client_id"], second_id);

        let admin_all = request(
            Method::GET,
            "/api/admin/expense-versions/",
            &fx.admin_token,
            "",
        );
        let body = admin_list(&fx.state, &admin_all, VersionKind::Expenses)
            .unwrap()
            .body
            .unwrap();
        assert_eq!(body.as_array().unwrap().len(), 2);
    }
}
