/// データベース接続とスキーマ管理
pub mod connection;

pub use connection::{configure_connection, create_in_memory_connection, create_tables, open_database};
