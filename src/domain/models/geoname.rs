// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

/// 地名值对象
///
/// 表示地名服务返回的一个地理实体（行政区或城市）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geoname {
    /// 地名唯一ID
    pub geoname_id: i64,
    /// 名称
    pub name: String,
    /// 纬度
    pub latitude: f64,
    /// 经度
    pub longitude: f64,
    /// 国家代码 (ISO 3166-1 alpha-2)
    pub country_code: String,
    /// 人口
    pub population: i64,
    /// 特征代码 (ADM1, ADM2, PPL, ...)
    pub feature_code: Option<String>,
    /// 一级行政区代码
    pub admin1_code: Option<String>,
    /// 二级行政区代码
    pub admin2_code: Option<String>,
}

/// 国家值对象
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Country {
    /// 地名唯一ID
    pub geoname_id: i64,
    /// ISO 3166-1 alpha-2 代码
    pub code: String,
    /// 国家名称
    pub name: String,
    /// 人口
    pub population: i64,
    /// 语言列表（逗号分隔）
    pub languages: String,
}
