/// バージョン（スナップショット）機能モジュール
///
/// 協議完了時に顧客の経費・入金を凍結し、顧客ごとに1から連番のバージョンとして保存します：
/// - スナップショットの作成（書き込みロック付きトランザクションとCASによる採番）
/// - バージョンの一覧・取得（管理者は全顧客、顧客は自分のもののみ）
/// - 最新バージョンの協議完了日時の取得
pub mod handlers;
pub mod models;
pub mod repository;
pub mod service;
pub mod snapshot;

pub use models::{
    ExpenseSnapshotItem, ExpenseVersion, PaymentSnapshotItem, PaymentVersion, Version, VersionKind,
};
pub use service::VersioningService;
