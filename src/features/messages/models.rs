use serde::{Deserialize, Serialize};

/// メッセージの送信者
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Admin,
    Client,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::Admin => "admin",
            Sender::Client => "client",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(Sender::Admin),
            "client" => Some(Sender::Client),
            _ => None,
        }
    }

    /// 相手側の送信者
    pub fn counterpart(&self) -> Self {
        match self {
            Sender::Admin => Sender::Client,
            Sender::Client => Sender::Admin,
        }
    }
}

/// メッセージデータモデル
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Message {
    pub id: i64,
    pub client_id: i64,
    pub sender: Sender,
    pub content: Option<String>,
    pub file_url: Option<String>,
    pub timestamp: String,
    pub is_read: bool,
}

/// メッセージ作成用DTO
///
/// 本文と添付ファイルURLのどちらかは必須
#[derive(Debug, Deserialize, Default)]
pub struct CreateMessageDto {
    pub content: Option<String>,
    pub file_url: Option<String>,
}

/// 既読化の結果
#[derive(Debug, Serialize)]
pub struct MarkReadResult {
    pub updated: usize,
}

/// 未読件数
#[derive(Debug, Serialize)]
pub struct UnreadCount {
    pub unread: i64,
}
