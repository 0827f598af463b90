/// プロジェクトと進捗の機能モジュール
pub mod handlers;
pub mod models;
pub mod repository;

pub use models::{Project, ProjectProgress, ProjectStatus, UpdateProgressDto};
