// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::services::campaign_service::CampaignService;
use crate::bus::{EventBus, SubscriptionHandle};
use crate::config::settings::Settings;
use crate::domain::events::DomainEvent;
use crate::presentation::ws::messages::{
    self, event_to_wire, is_snapshot, protocol_error, ClientMessage,
};
use crate::presentation::ws::{command_handler, event_stream, query_handler};

/// 非快照消息入队的阻塞上限
const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// 会话出站队列
///
/// 有界缓冲。缓冲满时快照最先被丢弃（按机器人合并为最新一张），
/// 其他消息短暂阻塞，超时则以协议错误关闭会话。
pub struct OutboundQueue {
    tx: mpsc::Sender<Value>,
    snapshots: Mutex<HashMap<String, Value>>,
    notify: Notify,
    closed: CancellationToken,
}

impl OutboundQueue {
    /// 创建队列及其消费端
    pub fn new(capacity: usize) -> (Arc<Self>, mpsc::Receiver<Value>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Arc::new(Self {
                tx,
                snapshots: Mutex::new(HashMap::new()),
                notify: Notify::new(),
                closed: CancellationToken::new(),
            }),
            rx,
        )
    }

    /// 入队一条领域事件
    pub async fn push_event(&self, event: &DomainEvent) -> anyhow::Result<()> {
        let wire = event_to_wire(event);
        if is_snapshot(event) {
            if let DomainEvent::BotSnapshotCaptured { bot_id, .. } = event {
                self.snapshots
                    .lock()
                    .expect("snapshot buffer poisoned")
                    .insert(bot_id.to_string(), wire);
                self.notify.notify_one();
            }
            return Ok(());
        }
        self.push(wire).await
    }

    /// 入队一条普通消息
    pub async fn push(&self, wire: Value) -> anyhow::Result<()> {
        if self.closed.is_cancelled() {
            anyhow::bail!("session outbound closed");
        }
        if self.tx.send_timeout(wire, SEND_TIMEOUT).await.is_err() {
            warn!("outbound buffer saturated, closing session");
            self.closed.cancel();
            anyhow::bail!("outbound buffer saturated");
        }
        Ok(())
    }

    /// 会话是否已被判定关闭
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// 标记会话关闭
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// 待冲刷的快照数量（每个机器人至多一张）
    pub fn pending_snapshots(&self) -> usize {
        self.snapshots.lock().expect("snapshot buffer poisoned").len()
    }

    /// 取出任意一张待冲刷快照；写泵专用
    pub fn pop_snapshot(&self) -> Option<Value> {
        let mut snapshots = self.snapshots.lock().expect("snapshot buffer poisoned");
        let key = snapshots.keys().next().cloned()?;
        snapshots.remove(&key)
    }
}

/// 处理一条WebSocket连接
///
/// 读循环逐条解析信封并分发；命令按会话串行执行。
/// 断开只解除事件转发，不影响底层提取。
pub async fn handle_socket(
    socket: WebSocket,
    service: Arc<CampaignService>,
    bus: Arc<EventBus>,
    settings: Arc<Settings>,
) {
    info!("websocket session opened");
    let (sender, receiver) = socket.split();
    let (queue, rx) = OutboundQueue::new(settings.extraction.outbound_buffer);

    let writer = tokio::spawn(write_pump(sender, rx, queue.clone()));
    let subscriptions = read_loop(receiver, &service, &bus, &queue).await;

    for handle in subscriptions {
        bus.unsubscribe(handle);
    }
    queue.close();
    writer.abort();
    info!("websocket session ended");
}

async fn read_loop(
    mut receiver: SplitStream<WebSocket>,
    service: &Arc<CampaignService>,
    bus: &Arc<EventBus>,
    queue: &Arc<OutboundQueue>,
) -> Vec<SubscriptionHandle> {
    let mut subscriptions: Vec<SubscriptionHandle> = Vec::new();

    while let Some(Ok(message)) = receiver.next().await {
        if queue.is_closed() {
            break;
        }

        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let parsed: Result<ClientMessage, _> = serde_json::from_str(text.as_str());
        match parsed {
            Ok(ClientMessage::Command { command, data }) => {
                let reply = command_handler::handle(service, &command, &data).await;
                let _ = queue.push(reply).await;
            }
            Ok(ClientMessage::Query { query, data }) => {
                let reply = query_handler::handle(service, &query, &data).await;
                let _ = queue.push(reply).await;
            }
            Ok(ClientMessage::Subscribe { data }) => {
                match data.get("campaign_id").and_then(Value::as_str) {
                    Some(raw) => match raw.parse() {
                        Ok(campaign_id) => {
                            subscriptions.extend(event_stream::bind(
                                bus,
                                &campaign_id,
                                queue.clone(),
                            ));
                            let _ = queue.push(messages::stream_started(raw)).await;
                        }
                        Err(_) => {
                            let _ = queue
                                .push(protocol_error("subscribe requires a valid campaign_id"))
                                .await;
                        }
                    },
                    None => {
                        let _ = queue
                            .push(protocol_error("subscribe requires data.campaign_id"))
                            .await;
                    }
                }
            }
            Ok(ClientMessage::AutoStart { data }) => {
                // 兼容路径：一条消息完成订阅加启动
                match command_handler::resolve_campaign_id(service, &data).await {
                    Ok(campaign_id) => {
                        subscriptions.extend(event_stream::bind(bus, &campaign_id, queue.clone()));
                        let _ = queue
                            .push(messages::stream_started(campaign_id.as_str()))
                            .await;
                        let reply = match service.start(&campaign_id).await {
                            Ok(()) => messages::command_result(
                                true,
                                serde_json::json!({ "campaign_id": campaign_id.to_string() }),
                            ),
                            Err(e) => messages::command_result(
                                false,
                                Value::String(e.to_string()),
                            ),
                        };
                        let _ = queue.push(reply).await;
                    }
                    Err(e) => {
                        let _ = queue
                            .push(messages::command_result(false, Value::String(e.to_string())))
                            .await;
                    }
                }
            }
            Err(e) => {
                debug!(error = %e, "malformed websocket envelope");
                let _ = queue
                    .push(protocol_error(&format!("malformed envelope: {}", e)))
                    .await;
            }
        }
    }

    subscriptions
}

/// 出站写泵
///
/// 普通消息按FIFO优先发送；空闲时冲刷合并后的快照
async fn write_pump(
    mut sender: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Value>,
    queue: Arc<OutboundQueue>,
) {
    loop {
        tokio::select! {
            biased;
            maybe = rx.recv() => {
                match maybe {
                    Some(wire) => {
                        if send_json(&mut sender, &wire).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = queue.notify.notified() => {
                while let Some(wire) = queue.pop_snapshot() {
                    if send_json(&mut sender, &wire).await.is_err() {
                        return;
                    }
                }
            }
            _ = queue.closed.cancelled() => {
                let farewell = protocol_error("session closed by server");
                let _ = send_json(&mut sender, &farewell).await;
                break;
            }
        }
    }
}

async fn send_json(
    sender: &mut SplitSink<WebSocket, Message>,
    wire: &Value,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(wire).unwrap_or_default();
    sender.send(Message::Text(text.into())).await
}
