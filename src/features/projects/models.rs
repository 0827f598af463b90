use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// プロジェクトのステータス
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Active,
    Completed,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Active => "active",
            ProjectStatus::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(ProjectStatus::Active),
            "completed" => Some(ProjectStatus::Completed),
            _ => None,
        }
    }
}

/// プロジェクトデータモデル（進捗率を含む）
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Project {
    pub id: i64,
    pub client_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub total_budget: Decimal,
    pub status: ProjectStatus,
    pub progress_percentage: i64,
    pub created_at: String,
}

/// プロジェクト進捗データモデル
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ProjectProgress {
    pub id: i64,
    pub project_id: i64,
    pub project_title: String,
    pub client_id: i64,
    pub percentage: i64,
    pub updated_at: String,
}

/// 進捗更新用DTO
#[derive(Debug, Deserialize)]
pub struct UpdateProgressDto {
    pub percentage: i64,
}
