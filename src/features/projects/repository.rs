use crate::features::projects::models::{Project, ProjectProgress, ProjectStatus};
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::{amount_from_row, current_timestamp, format_amount};
use rusqlite::{params, Connection};
use rust_decimal::Decimal;

const PROJECT_COLUMNS: &str = "p.id, p.client_id, p.title, p.description, p.start_date, p.end_date,
    p.total_budget, p.status, COALESCE(pp.percentage, 0), p.created_at";

/// 進捗率の上限
const MAX_PERCENTAGE: i64 = 100;

/// プロジェクトを作成する（進捗0%のレコードも同時に作成）
///
/// # 引数
/// * `conn` - データベース接続（呼び出し側のトランザクション内で使用される）
/// * `client_id` - 顧客ID
/// * `title` - プロジェクト名
/// * `total_budget` - 総予算
///
/// # 戻り値
/// 作成されたプロジェクト、または失敗時はエラー
pub fn create(
    conn: &Connection,
    client_id: i64,
    title: &str,
    total_budget: &Decimal,
) -> AppResult<Project> {
    let now = current_timestamp();

    conn.execute(
        "INSERT INTO projects (client_id, title, total_budget, status, created_at)
         VALUES (?1, ?2, ?3, 'active', ?4)",
        params![client_id, title, format_amount(total_budget), now],
    )?;
    let project_id = conn.last_insert_rowid();

    conn.execute(
        "INSERT INTO project_progress (project_id, percentage, updated_at) VALUES (?1, 0, ?2)",
        params![project_id, now],
    )?;

    find_by_id(conn, project_id)
}

/// IDでプロジェクトを取得する
pub fn find_by_id(conn: &Connection, id: i64) -> AppResult<Project> {
    let sql = format!(
        "SELECT {PROJECT_COLUMNS} FROM projects p
         LEFT JOIN project_progress pp ON pp.project_id = p.id
         WHERE p.id = ?1"
    );
    conn.query_row(&sql, params![id], map_project)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => AppError::not_found("プロジェクト"),
            _ => AppError::from(e),
        })
}

/// 顧客のプロジェクト一覧を取得する（新しい順）
pub fn find_by_client(conn: &Connection, client_id: i64) -> AppResult<Vec<Project>> {
    let sql = format!(
        "SELECT {PROJECT_COLUMNS} FROM projects p
         LEFT JOIN project_progress pp ON pp.project_id = p.id
         WHERE p.client_id = ?1
         ORDER BY p.created_at DESC, p.id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let projects = stmt.query_map(params![client_id], map_project)?;
    projects.collect::<Result<Vec<_>, _>>().map_err(AppError::from)
}

/// 進捗一覧を取得する
///
/// # 引数
/// * `conn` - データベース接続
/// * `client_id` - 顧客IDフィルター（Noneの場合は全顧客）
pub fn list_progress(conn: &Connection, client_id: Option<i64>) -> AppResult<Vec<ProjectProgress>> {
    let mut stmt = conn.prepare(
        "SELECT pp.id, pp.project_id, p.title, p.client_id, pp.percentage, pp.updated_at
         FROM project_progress pp
         JOIN projects p ON p.id = pp.project_id
         JOIN clients c ON c.id = p.client_id
         WHERE c.is_deleted = 0 AND (?1 IS NULL OR p.client_id = ?1)
         ORDER BY p.client_id, p.id",
    )?;
    let progress = stmt.query_map(params![client_id], map_progress)?;
    progress.collect::<Result<Vec<_>, _>>().map_err(AppError::from)
}

/// プロジェクトの進捗率を更新する
///
/// # 引数
/// * `conn` - データベース接続
/// * `project_id` - プロジェクトID
/// * `percentage` - 進捗率（0〜100）
///
/// # 戻り値
/// 更新後の進捗
pub fn update_progress(
    conn: &Connection,
    project_id: i64,
    percentage: i64,
) -> AppResult<ProjectProgress> {
    if !(0..=MAX_PERCENTAGE).contains(&percentage) {
        return Err(AppError::validation("進捗率は0から100の間で入力してください"));
    }

    let now = current_timestamp();
    let affected = conn.execute(
        "UPDATE project_progress SET percentage = ?1, updated_at = ?2 WHERE project_id = ?3",
        params![percentage, now, project_id],
    )?;

    if affected == 0 {
        return Err(AppError::not_found("プロジェクト進捗"));
    }

    log::info!("進捗を更新しました: project_id={project_id}, percentage={percentage}");
    find_progress(conn, project_id)
}

fn find_progress(conn: &Connection, project_id: i64) -> AppResult<ProjectProgress> {
    conn.query_row(
        "SELECT pp.id, pp.project_id, p.title, p.client_id, pp.percentage, pp.updated_at
         FROM project_progress pp
         JOIN projects p ON p.id = pp.project_id
         WHERE pp.project_id = ?1",
        params![project_id],
        map_progress,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => AppError::not_found("プロジェクト進捗"),
        _ => AppError::from(e),
    })
}

/// 顧客の最新プロジェクトを完了にする
///
/// ステータスをcompletedにし、進捗を100%にする。
/// プロジェクトがない場合はバリデーションエラー。
pub fn complete_for_client(conn: &Connection, client_id: i64) -> AppResult<Project> {
    let project = find_by_client(conn, client_id)?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::validation("顧客にプロジェクトがありません"))?;

    let now = current_timestamp();
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "UPDATE projects SET status = ?1 WHERE id = ?2",
        params![ProjectStatus::Completed.as_str(), project.id],
    )?;
    tx.execute(
        "INSERT INTO project_progress (project_id, percentage, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(project_id) DO UPDATE SET percentage = excluded.percentage,
                                               updated_at = excluded.updated_at",
        params![project.id, MAX_PERCENTAGE, now],
    )?;
    tx.commit()?;

    log::info!(
        "プロジェクトを完了にしました: client_id={client_id}, project_id={}",
        project.id
    );
    find_by_id(conn, project.id)
}

fn map_project(row: &rusqlite::Row<'_>) -> rusqlite::Result<Project> {
    let status: String = row.get(7)?;
    let status = ProjectStatus::parse(&status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            7,
            rusqlite::types::Type::Text,
            format!("不明なプロジェクトステータス: {status}").into(),
        )
    })?;

    Ok(Project {
        id: row.get(0)?,
        client_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        start_date: row.get(4)?,
        end_date: row.get(5)?,
        total_budget: amount_from_row(row, 6)?,
        status,
        progress_percentage: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn map_progress(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProjectProgress> {
    Ok(ProjectProgress {
        id: row.get(0)?,
        project_id: row.get(1)?,
        project_title: row.get(2)?,
        client_id: row.get(3)?,
        percentage: row.get(4)?,
        updated_at: row.get(5)?,
    })
}
