// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use thiserror::Error;

/// 许可校验错误
#[derive(Error, Debug)]
pub enum LicenseError {
    /// 许可无效或已过期
    #[error("License rejected: {0}")]
    Rejected(String),
}

/// 许可校验端口
///
/// 启动提取前调用的边界能力；在启动阶段注入，绝不隐式查找
#[async_trait]
pub trait LicenseValidator: Send + Sync {
    /// 校验当前部署是否允许执行提取
    async fn validate(&self) -> Result<(), LicenseError>;
}

/// 放行一切的许可校验实现
///
/// 自托管部署的默认实现
pub struct PermissiveLicenseValidator;

#[async_trait]
impl LicenseValidator for PermissiveLicenseValidator {
    async fn validate(&self) -> Result<(), LicenseError> {
        Ok(())
    }
}
