use crate::features::messages::models::{CreateMessageDto, Message, Sender};
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::{current_timestamp, validate_text_length};
use rusqlite::{params, Connection};

/// メッセージ本文の最大文字数
const MAX_CONTENT_LENGTH: usize = 5000;

/// メッセージを作成する
///
/// # 引数
/// * `conn` - データベース接続
/// * `client_id` - スレッドの顧客ID
/// * `sender` - 送信者
/// * `dto` - メッセージ作成用DTO
pub fn create(
    conn: &Connection,
    client_id: i64,
    sender: Sender,
    dto: CreateMessageDto,
) -> AppResult<Message> {
    let content = dto
        .content
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());
    let file_url = dto
        .file_url
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty());

    if content.is_none() && file_url.is_none() {
        return Err(AppError::validation(
            "メッセージ本文か添付ファイルのどちらかを指定してください",
        ));
    }
    if let Some(content) = &content {
        validate_text_length(content, MAX_CONTENT_LENGTH, "メッセージ")?;
    }
    if let Some(file_url) = &file_url {
        validate_text_length(file_url, 500, "添付ファイルURL")?;
    }

    conn.execute(
        "INSERT INTO messages (client_id, sender, content, file_url, timestamp, is_read)
         VALUES (?1, ?2, ?3, ?4, ?5, 0)",
        params![client_id, sender.as_str(), content, file_url, current_timestamp()],
    )?;

    let id = conn.last_insert_rowid();
    log::debug!(
        "メッセージを作成しました: message_id={id}, client_id={client_id}, sender={}",
        sender.as_str()
    );
    find_by_id(conn, id)
}

/// IDでメッセージを取得する
pub fn find_by_id(conn: &Connection, id: i64) -> AppResult<Message> {
    conn.query_row(
        "SELECT id, client_id, sender, content, file_url, timestamp, is_read
         FROM messages WHERE id = ?1",
        params![id],
        map_message,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => AppError::not_found("メッセージ"),
        _ => AppError::from(e),
    })
}

/// 顧客のメッセージスレッドを送信順に取得する
pub fn list_for_client(conn: &Connection, client_id: i64) -> AppResult<Vec<Message>> {
    let mut stmt = conn.prepare(
        "SELECT id, client_id, sender, content, file_url, timestamp, is_read
         FROM messages WHERE client_id = ?1
         ORDER BY id",
    )?;
    let messages = stmt.query_map(params![client_id], map_message)?;
    messages.collect::<Result<Vec<_>, _>>().map_err(AppError::from)
}

/// 相手から届いた未読メッセージを既読にする
///
/// # 引数
/// * `conn` - データベース接続
/// * `client_id` - スレッドの顧客ID
/// * `reader` - 既読にする側（相手の送信分のみ更新される）
///
/// # 戻り値
/// 更新件数
pub fn mark_read(conn: &Connection, client_id: i64, reader: Sender) -> AppResult<usize> {
    let updated = conn.execute(
        "UPDATE messages SET is_read = 1
         WHERE client_id = ?1 AND sender = ?2 AND is_read = 0",
        params![client_id, reader.counterpart().as_str()],
    )?;
    Ok(updated)
}

/// 相手から届いた未読メッセージ数
pub fn unread_count(conn: &Connection, client_id: i64, reader: Sender) -> AppResult<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM messages WHERE client_id = ?1 AND sender = ?2 AND is_read = 0",
        params![client_id, reader.counterpart().as_str()],
        |row| row.get(0),
    )
    .map_err(AppError::from)
}

fn map_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let sender: String = row.get(2)?;
    let sender = Sender::parse(&sender).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("不明な送信者: {sender}").into(),
        )
    })?;

    Ok(Message {
        id: row.get(0)?,
        client_id: row.get(1)?,
        sender,
        content: row.get(3)?,
        file_url: row.get(4)?,
        timestamp: row.get(5)?,
        is_read: row.get::<_, i64>(6)? != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::database::create_in_memory_connection;

    fn setup_client(conn: &Connection) -> i64 {
        conn.execute(
            "INSERT INTO users (username, is_staff, created_at) VALUES ('c1', 0, '2024-01-01T00:00:00+09:00')",
            [],
        )
        .unwrap();
        let user_id = conn.last_insert_rowid();
        conn.execute(
            "INSERT INTO clients (user_id, created_at) VALUES (?1, '2024-01-01T00:00:00+09:00')",
            params![user_id],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    fn text(content: &str) -> CreateMessageDto {
        CreateMessageDto {
            content: Some(content.to_string()),
            file_url: None,
        }
    }

    #[test]
    fn test_thread_and_read_flags() {
        let conn = create_in_memory_connection().unwrap();
        let client_id = setup_client(&conn);

        create(&conn, client_id, Sender::Client, text("質問があります")).unwrap();
        create(&conn, client_id, Sender::Admin, text("回答です")).unwrap();
        create(&conn, client_id, Sender::Client, text("ありがとう")).unwrap();

        let thread = list_for_client(&conn, client_id).unwrap();
        assert_eq!(thread.len(), 3);
        assert_eq!(thread[0].sender, Sender::Client);

        assert_eq!(unread_count(&conn, client_id, Sender::Admin).unwrap(), 2);
        assert_eq!(unread_count(&conn, client_id, Sender::Client).unwrap(), 1);

        assert_eq!(mark_read(&conn, client_id, Sender::Admin).unwrap(), 2);
        assert_eq!(unread_count(&conn, client_id, Sender::Admin).unwrap(), 0);
        // 顧客側の未読は変わらない
        assert_eq!(unread_count(&conn, client_id, Sender::Client).unwrap(), 1);
    }

    #[test]
    fn test_thread_keeps_send_order_across_timezones() {
        let conn = create_in_memory_connection().unwrap();
        let client_id = setup_client(&conn);

        let first = create(&conn, client_id, Sender::Client, text("先")).unwrap();
        let second = create(&conn, client_id, Sender::Admin, text("後")).unwrap();

        // タイムゾーン設定が変わった前後の記録（文字列順では逆転する）
        conn.execute(
            "UPDATE messages SET timestamp = '2024-01-01T10:00:00+09:00' WHERE id = ?1",
            params![first.id],
        )
        .unwrap();
        conn.execute(
            "UPDATE messages SET timestamp = '2024-01-01T02:00:00+00:00' WHERE id = ?1",
            params![second.id],
        )
        .unwrap();

        let thread = list_for_client(&conn, client_id).unwrap();
        let ids: Vec<i64> = thread.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[test]
    fn test_message_requires_content_or_file() {
        let conn = create_in_memory_connection().unwrap();
        let client_id = setup_client(&conn);

        let result = create(&conn, client_id, Sender::Admin, CreateMessageDto::default());
        assert!(matches!(result, Err(AppError::Validation(_))));

        let result = create(&conn, client_id, Sender::Admin, text("   "));
        assert!(matches!(result, Err(AppError::Validation(_))));

        let with_file = create(
            &conn,
            client_id,
            Sender::Admin,
            CreateMessageDto {
                content: None,
                file_url: Some("https://files.example/plan.pdf".to_string()),
            },
        )
        .unwrap();
        assert!(with_file.content.is_none());
        assert!(!with_file.is_read);
    }
}
