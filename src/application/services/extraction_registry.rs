// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use dashmap::DashMap;
use std::sync::Arc;

use crate::domain::models::ids::CampaignId;
use crate::workers::orchestrator::ExtractionOrchestrator;

/// 运行中提取的进程内注册表
///
/// 每个活动至多一次在途执行；注册表是命令处理器
/// 取消/查询运行状态的唯一入口
pub struct ExtractionRegistry {
    inner: DashMap<CampaignId, Arc<ExtractionOrchestrator>>,
}

impl Default for ExtractionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractionRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    /// 注册一次执行
    ///
    /// # 返回值
    ///
    /// * `true` - 注册成功
    /// * `false` - 该活动已有在途执行
    pub fn insert(&self, orchestrator: Arc<ExtractionOrchestrator>) -> bool {
        let campaign_id = orchestrator.campaign_id().clone();
        match self.inner.entry(campaign_id) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(orchestrator);
                true
            }
        }
    }

    /// 查找在途执行
    pub fn get(&self, campaign_id: &CampaignId) -> Option<Arc<ExtractionOrchestrator>> {
        self.inner.get(campaign_id).map(|entry| entry.value().clone())
    }

    /// 活动是否正在执行
    pub fn is_running(&self, campaign_id: &CampaignId) -> bool {
        self.inner.contains_key(campaign_id)
    }

    /// 移除执行记录
    pub fn remove(&self, campaign_id: &CampaignId) {
        self.inner.remove(campaign_id);
    }

    /// 发出取消信号
    ///
    /// # 返回值
    ///
    /// * `true` - 信号已发送
    /// * `false` - 活动没有在途执行
    pub fn cancel(&self, campaign_id: &CampaignId) -> bool {
        match self.get(campaign_id) {
            Some(orchestrator) => {
                orchestrator.cancel_token().cancel();
                true
            }
            None => false,
        }
    }

    /// 全部在途执行
    pub fn running(&self) -> Vec<Arc<ExtractionOrchestrator>> {
        self.inner.iter().map(|entry| entry.value().clone()).collect()
    }
}
