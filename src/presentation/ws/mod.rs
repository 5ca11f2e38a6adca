// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod command_handler;
pub mod event_stream;
pub mod messages;
pub mod query_handler;
pub mod session;

use axum::{
    extract::{Extension, WebSocketUpgrade},
    response::IntoResponse,
};
use std::sync::Arc;

use crate::application::services::campaign_service::CampaignService;
use crate::bus::EventBus;
use crate::config::settings::Settings;

/// WebSocket升级入口
///
/// 每个客户端连接对应一个会话，会话在单条连接上复用
/// 命令、查询与事件流三种角色
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Extension(service): Extension<Arc<CampaignService>>,
    Extension(bus): Extension<Arc<EventBus>>,
    Extension(settings): Extension<Arc<Settings>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| session::handle_socket(socket, service, bus, settings))
}
