// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 事件流处理器
//!
//! 把会话绑定到事件总线上：订阅全部事件种类，
//! 按活动过滤后经出站队列推送给客户端

use std::sync::Arc;

use crate::bus::{EventBus, SubscriptionHandle};
use crate::domain::models::ids::CampaignId;
use crate::presentation::ws::session::OutboundQueue;

/// 为会话绑定指定活动的事件订阅
///
/// 返回的句柄由会话在断开时退订；断开只解除转发，
/// 不影响底层提取
pub fn bind(
    bus: &Arc<EventBus>,
    campaign_id: &CampaignId,
    queue: Arc<OutboundQueue>,
) -> Vec<SubscriptionHandle> {
    let campaign_id = campaign_id.clone();
    bus.subscribe_all(Arc::new(move |event| {
        let queue = queue.clone();
        let campaign_id = campaign_id.clone();
        Box::pin(async move {
            if event.campaign_id() != &campaign_id {
                return Ok(());
            }
            queue.push_event(&event).await
        })
    }))
}
