/// 管理者と顧客のメッセージ機能モジュール
pub mod handlers;
pub mod models;
pub mod repository;

pub use models::{CreateMessageDto, MarkReadResult, Message, Sender, UnreadCount};
