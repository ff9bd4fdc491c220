//! WebSocket 连接处理
//!
//! 每个连接持有唯一 ID 和一条推送通道。客户端通过
//! `{"type":"join-poll","pollId":"..."}` / `{"type":"leave-poll"}` 帧管理订阅，
//! 服务器在选票提交后把最新投票快照推给当前订阅该投票的全部连接。

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use domain::PollId;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::state::AppState;

/// 客户端控制帧。
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum ClientCommand {
    #[serde(rename_all = "camelCase")]
    JoinPoll { poll_id: Uuid },
    LeavePoll,
}

pub async fn websocket_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| WsConnection::new(socket, state).run())
}

/// 单个 WebSocket 连接的状态与生命周期。
struct WsConnection {
    socket: WebSocket,
    state: AppState,
    connection_id: Uuid,
}

impl WsConnection {
    fn new(socket: WebSocket, state: AppState) -> Self {
        Self {
            socket,
            state,
            connection_id: Uuid::new_v4(),
        }
    }

    async fn run(self) {
        let Self {
            socket,
            state,
            connection_id,
        } = self;
        tracing::info!(connection_id = %connection_id, "WebSocket 连接已建立");

        // 注册表到客户端的推送通道。通道由发送任务独占消费，
        // 单个连接收到的快照顺序与选票提交顺序一致。
        let (push_tx, mut push_rx) = mpsc::unbounded_channel::<String>();
        let (mut sender, mut incoming) = socket.split();

        let send_task = tokio::spawn(async move {
            while let Some(payload) = push_rx.recv().await {
                if sender.send(WsMessage::Text(payload.into())).await.is_err() {
                    break;
                }
            }
        });

        while let Some(Ok(message)) = incoming.next().await {
            match message {
                WsMessage::Text(text) => {
                    Self::handle_frame(&state, connection_id, &push_tx, text.as_str()).await;
                }
                WsMessage::Close(_) => break,
                // Ping/Pong 由协议栈回应，二进制帧忽略
                _ => {}
            }
        }

        // 断开即退订，推送立即停止
        state.registry.unsubscribe(connection_id).await;
        send_task.abort();
        tracing::info!(connection_id = %connection_id, "WebSocket 连接已断开");
    }

    async fn handle_frame(
        state: &AppState,
        connection_id: Uuid,
        push_tx: &mpsc::UnboundedSender<String>,
        raw: &str,
    ) {
        let command = match serde_json::from_str::<ClientCommand>(raw) {
            Ok(command) => command,
            Err(err) => {
                // 无法识别的帧直接忽略，连接保持
                tracing::debug!(connection_id = %connection_id, error = %err, "忽略无法解析的客户端帧");
                return;
            }
        };

        match command {
            ClientCommand::JoinPoll { poll_id } => {
                state
                    .registry
                    .subscribe(connection_id, PollId::new(poll_id), push_tx.clone())
                    .await;
            }
            ClientCommand::LeavePoll => {
                state.registry.unsubscribe(connection_id).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_command_parsing() {
        let poll_id = Uuid::new_v4();
        let raw = format!(r#"{{"type":"join-poll","pollId":"{}"}}"#, poll_id);
        let command: ClientCommand = serde_json::from_str(&raw).unwrap();
        assert!(matches!(command, ClientCommand::JoinPoll { poll_id: id } if id == poll_id));

        let command: ClientCommand = serde_json::from_str(r#"{"type":"leave-poll"}"#).unwrap();
        assert!(matches!(command, ClientCommand::LeavePoll));
    }

    #[test]
    fn test_malformed_frames_fail_to_parse() {
        assert!(serde_json::from_str::<ClientCommand>("not json").is_err());
        assert!(serde_json::from_str::<ClientCommand>(r#"{"type":"dance"}"#).is_err());
        assert!(serde_json::from_str::<ClientCommand>(r#"{"type":"join-poll"}"#).is_err());
        assert!(
            serde_json::from_str::<ClientCommand>(r#"{"type":"join-poll","pollId":"nope"}"#)
                .is_err()
        );
    }
}
