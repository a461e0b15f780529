/// Chat message persistence
use crate::{
    chat::{
        room_id, MessagePage, MessageQuery, OnlineUser, OnlineUsers, SendMessageRequest,
        DEFAULT_MESSAGE_LIMIT, MAX_MESSAGE_LENGTH, MAX_MESSAGE_LIMIT, ONLINE_WINDOW_MINUTES,
    },
    db::{
        account::Account,
        chat::{ChatMessage, CHAT_MESSAGE_COLUMNS, DELETED_MESSAGE_TEXT},
    },
    error::{AppError, AppResult},
};
use chrono::{DateTime, Duration, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;
use validator::Validate;

pub struct ChatService {
    db: SqlitePool,
}

impl ChatService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Newest `limit` live messages of a room, returned oldest first
    pub async fn list_messages(
        &self,
        department: &str,
        semester: &str,
        query: &MessageQuery,
    ) -> AppResult<MessagePage> {
        let limit = query
            .limit
            .unwrap_or(DEFAULT_MESSAGE_LIMIT)
            .clamp(1, MAX_MESSAGE_LIMIT);
        let room = room_id(department, semester);

        let rows = match query.before {
            Some(before) => {
                sqlx::query(&format!(
                    "SELECT {} FROM chat_message
                     WHERE room_id = ?1 AND is_deleted = 0 AND created_at < ?2
                     ORDER BY created_at DESC LIMIT ?3",
                    CHAT_MESSAGE_COLUMNS
                ))
                .bind(&room)
                .bind(before)
                .bind(limit)
                .fetch_all(&self.db)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {} FROM chat_message
                     WHERE room_id = ?1 AND is_deleted = 0
                     ORDER BY created_at DESC LIMIT ?2",
                    CHAT_MESSAGE_COLUMNS
                ))
                .bind(&room)
                .bind(limit)
                .fetch_all(&self.db)
                .await?
            }
        };

        let mut messages = rows
            .iter()
            .map(ChatMessage::from_row)
            .collect::<AppResult<Vec<_>>>()?;
        messages.reverse();

        Ok(MessagePage {
            count: messages.len(),
            has_more: messages.len() as i64 == limit,
            messages,
        })
    }

    pub async fn get(&self, id: &str) -> AppResult<ChatMessage> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM chat_message WHERE id = ?1",
            CHAT_MESSAGE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Message not found".to_string()))?;

        ChatMessage::from_row(&row)
    }

    /// Persist a message from `sender`. Sender details come from the account,
    /// never from the request.
    pub async fn send(&self, sender: &Account, request: SendMessageRequest) -> AppResult<ChatMessage> {
        request.validate()?;

        let text = request.message.trim();
        if text.is_empty() || text.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(AppError::Validation(
                "Message must be 1 to 2000 characters".to_string(),
            ));
        }

        let reply_to = request.reply_to.as_deref().filter(|id| !id.is_empty());
        if let Some(parent) = reply_to {
            self.get(parent).await?;
        }

        let now = Utc::now();
        let row = sqlx::query(&format!(
            "INSERT INTO chat_message (id, room_id, department, semester, message, user_id,
                                       user_name, user_email, message_type, file_url, file_name,
                                       reply_to, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)
             RETURNING {}",
            CHAT_MESSAGE_COLUMNS
        ))
        .bind(Uuid::new_v4().to_string())
        .bind(room_id(&request.department, &request.semester))
        .bind(&request.department)
        .bind(&request.semester)
        .bind(text)
        .bind(&sender.id)
        .bind(&sender.full_name)
        .bind(&sender.email)
        .bind(request.message_type.as_str())
        .bind(&request.file_url)
        .bind(&request.file_name)
        .bind(reply_to)
        .bind(now)
        .fetch_one(&self.db)
        .await?;

        let message = ChatMessage::from_row(&row)?;
        tracing::debug!(room = %message.room_id, message_id = %message.id, "Chat message stored");
        Ok(message)
    }

    /// Soft delete. Only the author may delete a message.
    pub async fn delete(&self, message_id: &str, actor_id: &str) -> AppResult<ChatMessage> {
        let message = self.get(message_id).await?;
        if message.user_id != actor_id {
            return Err(AppError::Unauthorized(
                "Not authorized to delete this message".to_string(),
            ));
        }

        let now = Utc::now();
        let row = sqlx::query(&format!(
            "UPDATE chat_message
             SET is_deleted = 1, deleted_at = COALESCE(deleted_at, ?1), message = ?2, updated_at = ?1
             WHERE id = ?3
             RETURNING {}",
            CHAT_MESSAGE_COLUMNS
        ))
        .bind(now)
        .bind(DELETED_MESSAGE_TEXT)
        .bind(message_id)
        .fetch_one(&self.db)
        .await?;

        ChatMessage::from_row(&row)
    }

    /// Live messages from others since the account last opened the chat
    pub async fn unread_count(
        &self,
        account: &Account,
        department: &str,
        semester: &str,
    ) -> AppResult<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS unread FROM chat_message
             WHERE room_id = ?1 AND is_deleted = 0 AND user_id != ?2
               AND (?3 IS NULL OR created_at > ?3)",
        )
        .bind(room_id(department, semester))
        .bind(&account.id)
        .bind(account.last_chat_visit)
        .fetch_one(&self.db)
        .await?;

        Ok(row.get("unread"))
    }

    pub async fn mark_read(&self, account_id: &str, now: DateTime<Utc>) -> AppResult<()> {
        sqlx::query("UPDATE account SET last_chat_visit = ?1 WHERE id = ?2")
            .bind(now)
            .bind(account_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    /// Stamp `last_active`, called when a socket joins a room
    pub async fn touch_active(&self, account_id: &str, now: DateTime<Utc>) -> AppResult<()> {
        sqlx::query("UPDATE account SET last_active = ?1 WHERE id = ?2")
            .bind(now)
            .bind(account_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    /// Accounts active within the online window
    pub async fn online_users(&self, now: DateTime<Utc>) -> AppResult<OnlineUsers> {
        let cutoff = now - Duration::minutes(ONLINE_WINDOW_MINUTES);
        let rows = sqlx::query(
            "SELECT id, full_name, email, last_active FROM account
             WHERE last_active > ?1
             ORDER BY last_active DESC",
        )
        .bind(cutoff)
        .fetch_all(&self.db)
        .await?;

        let users = rows
            .iter()
            .map(|row| -> AppResult<OnlineUser> {
                Ok(OnlineUser {
                    id: row.try_get("id")?,
                    full_name: row.try_get("full_name")?,
                    email: row.try_get("email")?,
                    last_active: row.try_get("last_active")?,
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(OnlineUsers {
            count: users.len(),
            users,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::{self, account::ACCOUNT_COLUMNS};

    pub(crate) async fn insert_account(pool: &SqlitePool, id: &str) -> Account {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO account (id, full_name, email, password_hash, is_verified, created_at, updated_at)
             VALUES (?1, ?2, ?3, 'hash', 1, ?4, ?4)",
        )
        .bind(id)
        .bind(format!("{} name", id))
        .bind(format!("{}@example.edu", id))
        .bind(now)
        .execute(pool)
        .await
        .unwrap();

        reload(pool, id).await
    }

    pub(crate) async fn reload(pool: &SqlitePool, id: &str) -> Account {
        let row = sqlx::query(&format!("SELECT {} FROM account WHERE id = ?1", ACCOUNT_COLUMNS))
            .bind(id)
            .fetch_one(pool)
            .await
            .unwrap();
        Account::from_row(&row).unwrap()
    }

    pub(crate) fn message(text: &str) -> SendMessageRequest {
        SendMessageRequest {
            department: "Physics".to_string(),
            semester: "2".to_string(),
            message: text.to_string(),
            message_type: Default::default(),
            file_url: None,
            file_name: None,
            reply_to: None,
        }
    }

    #[tokio::test]
    async fn test_send_and_list_oldest_first() {
        let pool = db::test_pool().await;
        let chat = ChatService::new(pool.clone());
        let alice = insert_account(&pool, "alice").await;

        for i in 0..5 {
            chat.send(&alice, message(&format!("msg {}", i))).await.unwrap();
        }

        let page = chat
            .list_messages(
                "Physics",
                "2",
                &MessageQuery {
                    limit: Some(3),
                    before: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(page.count, 3);
        assert!(page.has_more);
        assert_eq!(page.messages[0].message, "msg 2");
        assert_eq!(page.messages[2].message, "msg 4");
        assert_eq!(page.messages[0].user_name, "alice name");

        let older = chat
            .list_messages(
                "Physics",
                "2",
                &MessageQuery {
                    limit: Some(3),
                    before: Some(page.messages[0].created_at),
                },
            )
            .await
            .unwrap();
        assert_eq!(older.count, 2);
        assert!(!older.has_more);
        assert_eq!(older.messages[1].message, "msg 1");
    }

    #[tokio::test]
    async fn test_message_length_limits() {
        let pool = db::test_pool().await;
        let chat = ChatService::new(pool.clone());
        let alice = insert_account(&pool, "alice").await;

        assert!(matches!(
            chat.send(&alice, message("   ")).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            chat.send(&alice, message(&"a".repeat(2001))).await,
            Err(AppError::Validation(_))
        ));

        let stored = chat.send(&alice, message("  hello  ")).await.unwrap();
        assert_eq!(stored.message, "hello");
        assert!(chat.send(&alice, message(&"a".repeat(2000))).await.is_ok());
    }

    #[tokio::test]
    async fn test_only_author_can_delete() {
        let pool = db::test_pool().await;
        let chat = ChatService::new(pool.clone());
        let alice = insert_account(&pool, "alice").await;
        let bob = insert_account(&pool, "bob").await;

        let sent = chat.send(&alice, message("secret")).await.unwrap();
        assert!(matches!(
            chat.delete(&sent.id, &bob.id).await,
            Err(AppError::Unauthorized(_))
        ));

        let deleted = chat.delete(&sent.id, &alice.id).await.unwrap();
        assert!(deleted.is_deleted);
        assert!(deleted.deleted_at.is_some());
        assert_eq!(deleted.message, DELETED_MESSAGE_TEXT);

        let page = chat
            .list_messages("Physics", "2", &MessageQuery::default())
            .await
            .unwrap();
        assert_eq!(page.count, 0);

        assert!(matches!(
            chat.delete("missing", &alice.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unread_count_and_mark_read() {
        let pool = db::test_pool().await;
        let chat = ChatService::new(pool.clone());
        let alice = insert_account(&pool, "alice").await;
        let bob = insert_account(&pool, "bob").await;

        chat.send(&alice, message("one")).await.unwrap();
        chat.send(&alice, message("two")).await.unwrap();
        chat.send(&bob, message("mine")).await.unwrap();

        assert_eq!(chat.unread_count(&bob, "Physics", "2").await.unwrap(), 2);

        chat.mark_read(&bob.id, Utc::now()).await.unwrap();
        let bob = reload(&pool, "bob").await;
        assert_eq!(chat.unread_count(&bob, "Physics", "2").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_online_users_window() {
        let pool = db::test_pool().await;
        let chat = ChatService::new(pool.clone());
        insert_account(&pool, "alice").await;
        insert_account(&pool, "bob").await;

        let now = Utc::now();
        chat.touch_active("alice", now - Duration::minutes(1)).await.unwrap();
        chat.touch_active("bob", now - Duration::minutes(10)).await.unwrap();

        let online = chat.online_users(now).await.unwrap();
        assert_eq!(online.count, 1);
        assert_eq!(online.users[0].id, "alice");
    }

    #[tokio::test]
    async fn test_reply_must_exist() {
        let pool = db::test_pool().await;
        let chat = ChatService::new(pool.clone());
        let alice = insert_account(&pool, "alice").await;

        let mut reply = message("re");
        reply.reply_to = Some("missing".to_string());
        assert!(matches!(
            chat.send(&alice, reply).await,
            Err(AppError::NotFound(_))
        ));
    }
}
