/// Per-connection chat state machine
///
/// Transport agnostic: the websocket handler feeds decoded [`ClientEvent`]s
/// in and forwards whatever the room broadcasts back out.
use crate::{
    chat::{
        room_id, ChatService, ClientEvent, RoomBroadcast, RoomRegistry, SendMessageRequest,
        ServerEvent,
    },
    db::account::Account,
    error::{AppError, AppResult},
};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

struct JoinedRoom {
    id: String,
    department: String,
    semester: String,
}

pub struct ChatConnection {
    id: Uuid,
    account: Account,
    chat: Arc<ChatService>,
    rooms: Arc<RoomRegistry>,
    joined: Option<JoinedRoom>,
}

impl ChatConnection {
    pub fn new(account: Account, chat: Arc<ChatService>, rooms: Arc<RoomRegistry>) -> Self {
        Self {
            id: Uuid::new_v4(),
            account,
            chat,
            rooms,
            joined: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn room(&self) -> Option<&str> {
        self.joined.as_ref().map(|room| room.id.as_str())
    }

    /// Whether a broadcast should be forwarded to this connection
    pub fn accepts(&self, broadcast: &RoomBroadcast) -> bool {
        broadcast.skip != Some(self.id)
    }

    /// Apply a client event. Returns a new room subscription after a join
    /// and any event meant for this connection alone.
    pub async fn handle(
        &mut self,
        event: ClientEvent,
    ) -> (Option<broadcast::Receiver<RoomBroadcast>>, Option<ServerEvent>) {
        match self.dispatch(event).await {
            Ok(rx) => (rx, None),
            Err(e) => {
                tracing::debug!(connection = %self.id, error = %e, "Chat event failed");
                (
                    None,
                    Some(ServerEvent::Error {
                        message: e.public_message(),
                    }),
                )
            }
        }
    }

    async fn dispatch(
        &mut self,
        event: ClientEvent,
    ) -> AppResult<Option<broadcast::Receiver<RoomBroadcast>>> {
        match event {
            ClientEvent::JoinRoom {
                department,
                semester,
            } => return self.join(department, semester).await.map(Some),
            ClientEvent::LeaveRoom => self.leave("left the chat"),
            ClientEvent::SendMessage { message, reply_to } => {
                let Some(room) = &self.joined else {
                    return Err(not_joined());
                };
                let request = SendMessageRequest {
                    department: room.department.clone(),
                    semester: room.semester.clone(),
                    message,
                    message_type: Default::default(),
                    file_url: None,
                    file_name: None,
                    reply_to,
                };
                let stored = self.chat.send(&self.account, request).await?;
                self.rooms
                    .publish(&room.id, ServerEvent::ReceiveMessage(stored), None);
            }
            ClientEvent::DeleteMessage { message_id } => {
                if self.joined.is_none() {
                    return Err(not_joined());
                }
                let deleted = self.chat.delete(&message_id, &self.account.id).await?;
                // The message's own room, which need not be the joined one
                let target = deleted.room_id.clone();
                self.rooms.publish(
                    &target,
                    ServerEvent::MessageDeleted {
                        message_id,
                        deleted_message: deleted,
                    },
                    None,
                );
            }
            ClientEvent::Typing => {
                if let Some(room) = &self.joined {
                    self.rooms.publish(
                        &room.id,
                        ServerEvent::UserTyping {
                            user_id: self.account.id.clone(),
                            user_name: self.account.full_name.clone(),
                        },
                        Some(self.id),
                    );
                }
            }
            ClientEvent::StopTyping => {
                if let Some(room) = &self.joined {
                    self.rooms.publish(
                        &room.id,
                        ServerEvent::UserStopTyping {
                            user_id: self.account.id.clone(),
                        },
                        Some(self.id),
                    );
                }
            }
        }
        Ok(None)
    }

    async fn join(
        &mut self,
        department: String,
        semester: String,
    ) -> AppResult<broadcast::Receiver<RoomBroadcast>> {
        if department.trim().is_empty() || semester.trim().is_empty() {
            return Err(AppError::Validation(
                "Department and semester are required".to_string(),
            ));
        }

        // One room per connection
        self.leave("left the chat");

        let id = room_id(&department, &semester);
        self.chat.touch_active(&self.account.id, Utc::now()).await?;
        let (presence, rx) = self.rooms.join(&id, self.id, &self.account.id);

        tracing::info!(room = %id, account = %self.account.id, "Joined chat room");

        self.rooms.publish(
            &id,
            ServerEvent::UserJoined {
                user_id: self.account.id.clone(),
                user_name: self.account.full_name.clone(),
                active_count: presence.count,
                message: format!("{} joined the chat", self.account.full_name),
            },
            None,
        );
        self.rooms.publish(
            &id,
            ServerEvent::ActiveUsers {
                count: presence.count,
                users: presence.users,
            },
            None,
        );

        self.joined = Some(JoinedRoom {
            id,
            department,
            semester,
        });
        Ok(rx)
    }

    fn leave(&mut self, verb: &str) {
        let Some(room) = self.joined.take() else {
            return;
        };
        let Some(presence) = self.rooms.leave(&room.id, self.id) else {
            return;
        };

        tracing::info!(room = %room.id, account = %self.account.id, "Left chat room");

        self.rooms.publish(
            &room.id,
            ServerEvent::UserLeft {
                user_id: self.account.id.clone(),
                user_name: self.account.full_name.clone(),
                active_count: presence.count,
                message: format!("{} {}", self.account.full_name, verb),
            },
            None,
        );
        self.rooms.publish(
            &room.id,
            ServerEvent::ActiveUsers {
                count: presence.count,
                users: presence.users,
            },
            None,
        );
    }

    /// Release presence when the socket goes away
    pub fn disconnect(&mut self) {
        self.leave("disconnected");
    }
}

fn not_joined() -> AppError {
    AppError::InvalidState("Join a room first".to_string())
}
