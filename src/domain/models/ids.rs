// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use ulid::Ulid;

/// 标识符解析错误
#[derive(Error, Debug)]
#[error("Invalid identifier: {0}")]
pub struct IdParseError(String);

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// 生成新的标识符
            pub fn new() -> Self {
                Self(Ulid::new().to_string())
            }

            /// 标识符字符串表示
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ulid::from_string(s)
                    .map(|u| Self(u.to_string()))
                    .map_err(|_| IdParseError(s.to_string()))
            }
        }
    };
}

define_id! {
    /// 活动标识符
    ///
    /// 基于ULID的26字符可排序标识符
    CampaignId
}

define_id! {
    /// 提取任务标识符
    TaskId
}

define_id! {
    /// 地点标识符
    PlaceId
}

define_id! {
    /// 评论标识符
    ReviewId
}

define_id! {
    /// 机器人标识符
    BotId
}
