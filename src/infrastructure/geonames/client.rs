// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

use crate::application::services::geoname_selection::GeonameQuery;
use crate::config::settings::GeonamesSettings;
use crate::domain::models::geoname::{Country, Geoname};

/// 地名服务错误类型
#[derive(Error, Debug)]
pub enum GeonamesError {
    /// 上游请求失败
    #[error("Geonames request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// 上游返回非预期状态
    #[error("Geonames upstream returned {0}")]
    UpstreamStatus(u16),
}

#[derive(Debug, Deserialize)]
struct CountryPayload {
    #[serde(default)]
    geoname_id: i64,
    #[serde(alias = "iso_alpha2", alias = "code")]
    code: String,
    #[serde(alias = "country_name", alias = "name")]
    name: String,
    #[serde(default)]
    population: i64,
    #[serde(default)]
    languages: String,
}

#[derive(Debug, Deserialize)]
struct GeonamePayload {
    #[serde(default)]
    geoname_id: i64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    asciiname: String,
    #[serde(default)]
    latitude: f64,
    #[serde(default)]
    longitude: f64,
    #[serde(default)]
    population: i64,
    feature_code: Option<String>,
    admin1_code: Option<String>,
    admin2_code: Option<String>,
}

enum CacheEntry {
    Countries(Vec<Country>),
    Geonames(Vec<Geoname>),
}

/// 地名服务HTTP适配器
///
/// 查询外部地名微服务并按URL缓存响应
pub struct GeonamesClient {
    base_url: String,
    http: reqwest::Client,
    cache: DashMap<String, (Instant, CacheEntry)>,
    cache_ttl: Duration,
}

impl GeonamesClient {
    /// 创建新的地名服务客户端
    pub fn new(settings: &GeonamesSettings) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            http,
            cache: DashMap::new(),
            cache_ttl: Duration::from_secs(settings.cache_ttl_secs),
        }
    }

    /// 获取全部国家
    pub async fn countries(&self) -> Result<Vec<Country>, GeonamesError> {
        let url = format!("{}/countries", self.base_url);
        if let Some(cached) = self.cached_countries(&url) {
            return Ok(cached);
        }

        let payloads: Vec<CountryPayload> = self.fetch(&url).await?;
        let countries: Vec<Country> = payloads
            .into_iter()
            .map(|p| Country {
                geoname_id: p.geoname_id,
                code: p.code,
                name: p.name,
                population: p.population,
                languages: p.languages,
            })
            .collect();

        self.cache
            .insert(url, (Instant::now(), CacheEntry::Countries(countries.clone())));
        Ok(countries)
    }

    /// 获取国家的一级行政区
    pub async fn regions(&self, country_code: &str) -> Result<Vec<Geoname>, GeonamesError> {
        let url = format!(
            "{}/countries/{}/admin-divisions?feature_code=ADM1&limit=1000",
            self.base_url, country_code
        );
        self.geonames_cached(&url, country_code).await
    }

    /// 获取一级行政区下的二级行政区
    pub async fn provinces(
        &self,
        country_code: &str,
        admin1_code: &str,
    ) -> Result<Vec<Geoname>, GeonamesError> {
        let url = format!(
            "{}/countries/{}/admin-divisions?feature_code=ADM2&admin1_code={}&limit=1000",
            self.base_url, country_code, admin1_code
        );
        self.geonames_cached(&url, country_code).await
    }

    /// 获取城市列表
    pub async fn cities(
        &self,
        country_code: &str,
        admin1_code: Option<&str>,
        admin2_code: Option<&str>,
        min_population: i64,
    ) -> Result<Vec<Geoname>, GeonamesError> {
        let mut url = format!(
            "{}/countries/{}/cities?limit=1000&min_population={}",
            self.base_url, country_code, min_population
        );
        if let Some(admin1) = admin1_code {
            url.push_str(&format!("&admin1_code={}", admin1));
        }
        if let Some(admin2) = admin2_code {
            url.push_str(&format!("&admin2_code={}", admin2));
        }
        self.geonames_cached(&url, country_code).await
    }

    async fn geonames_cached(
        &self,
        url: &str,
        country_code: &str,
    ) -> Result<Vec<Geoname>, GeonamesError> {
        if let Some(cached) = self.cached_geonames(url) {
            return Ok(cached);
        }

        let payloads: Vec<GeonamePayload> = self.fetch(url).await?;
        let geonames: Vec<Geoname> = payloads
            .into_iter()
            .map(|p| Geoname {
                geoname_id: p.geoname_id,
                name: if p.name.is_empty() { p.asciiname } else { p.name },
                latitude: p.latitude,
                longitude: p.longitude,
                country_code: country_code.to_string(),
                population: p.population,
                feature_code: p.feature_code,
                admin1_code: p.admin1_code,
                admin2_code: p.admin2_code,
            })
            .collect();

        self.cache.insert(
            url.to_string(),
            (Instant::now(), CacheEntry::Geonames(geonames.clone())),
        );
        Ok(geonames)
    }

    async fn fetch<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, GeonamesError> {
        debug!(url, "fetching geonames");
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GeonamesError::UpstreamStatus(status.as_u16()));
        }
        Ok(response.json().await?)
    }

    fn cached_countries(&self, url: &str) -> Option<Vec<Country>> {
        let entry = self.cache.get(url)?;
        let (at, value) = entry.value();
        if at.elapsed() > self.cache_ttl {
            return None;
        }
        match value {
            CacheEntry::Countries(countries) => Some(countries.clone()),
            _ => None,
        }
    }

    fn cached_geonames(&self, url: &str) -> Option<Vec<Geoname>> {
        let entry = self.cache.get(url)?;
        let (at, value) = entry.value();
        if at.elapsed() > self.cache_ttl {
            return None;
        }
        match value {
            CacheEntry::Geonames(geonames) => Some(geonames.clone()),
            _ => None,
        }
    }
}

#[async_trait]
impl GeonameQuery for GeonamesClient {
    async fn cities(
        &self,
        country_code: &str,
        admin1_code: Option<&str>,
        admin2_code: Option<&str>,
        min_population: i64,
    ) -> Result<Vec<Geoname>, GeonamesError> {
        GeonamesClient::cities(self, country_code, admin1_code, admin2_code, min_population).await
    }
}
