use crate::features::versions::models::{Version, VersionKind};
use crate::features::versions::repository;
use crate::shared::errors::{AppError, AppResult};
use rusqlite::Connection;
use std::sync::{Arc, Mutex, MutexGuard};

/// バージョン管理サービス
///
/// 顧客ごとのバージョン番号の採番を一手に引き受ける。
/// 採番はDB側の書き込みロック・CAS・一意制約で守られているため、
/// 同じDBファイルを別プロセスが開いていても番号は重複しない。
#[derive(Clone)]
pub struct VersioningService {
    db: Arc<Mutex<Connection>>,
}

impl VersioningService {
    /// 新しいVersioningServiceを作成する
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|e| AppError::concurrency(format!("データベースロック取得失敗: {e}")))
    }

    /// 協議を完了して次のバージョンを作成する
    ///
    /// # 引数
    /// * `kind` - 経費または入金
    /// * `client_id` - 顧客ID
    ///
    /// # 戻り値
    /// 作成されたバージョン
    pub fn complete_discussion(&self, kind: VersionKind, client_id: i64) -> AppResult<Version> {
        log::debug!(
            "協議完了処理を開始: client_id={client_id}, kind={}",
            kind.as_str()
        );
        let mut conn = self.lock()?;
        repository::create_version(&mut conn, kind, client_id)
    }

    /// バージョン一覧（client_idがNoneなら全顧客）
    pub fn list(&self, kind: VersionKind, client_id: Option<i64>) -> AppResult<Vec<Version>> {
        let conn = self.lock()?;
        repository::list_versions(&conn, kind, client_id)
    }

    /// バージョンを取得する（管理者用、顧客を問わない）
    pub fn get(&self, kind: VersionKind, id: i64) -> AppResult<Version> {
        let conn = self.lock()?;
        repository::find_version(&conn, kind, id, None)
    }

    /// 顧客本人のバージョンを取得する
    pub fn get_for_client(&self, kind: VersionKind, id: i64, client_id: i64) -> AppResult<Version> {
        let conn = self.lock()?;
        repository::find_version(&conn, kind, id, Some(client_id))
    }

    /// 最新バージョンの協議完了日時
    pub fn latest_completed_at(
        &self,
        kind: VersionKind,
        client_id: i64,
    ) -> AppResult<Option<String>> {
        let conn = self.lock()?;
        repository::latest_completed_at(&conn, kind, client_id)
    }
}
