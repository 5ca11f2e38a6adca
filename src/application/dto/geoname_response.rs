// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

use crate::domain::models::geoname::{Country, Geoname};

/// 国家响应
#[derive(Debug, Serialize, Deserialize)]
pub struct CountryResponse {
    /// ISO 3166-1 alpha-2 代码
    pub code: String,
    /// 名称
    pub name: String,
    /// 人口
    pub population: i64,
    /// 语言列表
    pub languages: String,
}

impl From<&Country> for CountryResponse {
    fn from(country: &Country) -> Self {
        Self {
            code: country.code.clone(),
            name: country.name.clone(),
            population: country.population,
            languages: country.languages.clone(),
        }
    }
}

/// 行政区/城市响应
#[derive(Debug, Serialize, Deserialize)]
pub struct GeonameResponse {
    /// 地名ID
    pub geoname_id: i64,
    /// 行政区代码
    pub code: Option<String>,
    /// 名称
    pub name: String,
    /// 人口
    pub population: i64,
}

impl GeonameResponse {
    /// 行政区视图（code取相应级别的行政区代码）
    pub fn admin(geoname: &Geoname, level: u8) -> Self {
        let code = match level {
            1 => geoname.admin1_code.clone(),
            _ => geoname.admin2_code.clone(),
        };
        Self {
            geoname_id: geoname.geoname_id,
            code,
            name: geoname.name.clone(),
            population: geoname.population,
        }
    }

    /// 城市视图
    pub fn city(geoname: &Geoname) -> Self {
        Self {
            geoname_id: geoname.geoname_id,
            code: None,
            name: geoname.name.clone(),
            population: geoname.population,
        }
    }
}
