// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::engines::traits::{
    BrowserDriver, DriverConfig, DriverError, DriverFactory, PlaceRecord,
};

/// 结果列表容器选择器
const RESULT_FEED_SELECTOR: &str = "div[role='feed']";
/// 搜索输入框选择器
const SEARCH_BOX_SELECTOR: &str = "input#searchboxinput";

/// 从结果列表提取地点记录的脚本
///
/// 在页面上下文中执行，返回JSON数组
const PARSE_RESULTS_SCRIPT: &str = r#"
(max) => {
    const feed = document.querySelector("div[role='feed']");
    if (!feed) { return []; }
    const items = Array.from(feed.querySelectorAll("div[role='article']")).slice(0, max);
    return items.map((item) => {
        const name = item.getAttribute('aria-label') || '';
        const text = (sel) => {
            const el = item.querySelector(sel);
            return el ? el.textContent.trim() : null;
        };
        const ratingText = text("span[role='img']");
        let rating = null;
        let review_count = null;
        if (ratingText) {
            const m = ratingText.match(/([0-9.,]+)/g);
            if (m && m.length > 0) { rating = parseFloat(m[0].replace(',', '.')); }
            if (m && m.length > 1) { review_count = parseInt(m[1].replace(/[.,]/g, ''), 10); }
        }
        const lines = Array.from(item.querySelectorAll('.W4Efsd span'))
            .map((s) => s.textContent.trim())
            .filter((s) => s.length > 0);
        const link = item.querySelector('a[data-value="Website"]');
        return {
            name: name,
            address: lines.find((l) => /\d/.test(l)) || '',
            city: null,
            category: lines.length > 0 ? lines[0] : null,
            rating: rating,
            review_count: review_count,
            phone: lines.find((l) => /^[+0-9][0-9 ()-]{6,}$/.test(l)) || null,
            website: link ? link.href : null,
            latitude: null,
            longitude: null,
            reviews: []
        };
    }).filter((p) => p.name.length > 0);
}
"#;

/// Chromium驱动工厂
///
/// 每次调用 `open` 启动一个独立的浏览器上下文
pub struct ChromiumDriverFactory {
    config: DriverConfig,
}

impl ChromiumDriverFactory {
    /// 创建新的驱动工厂
    pub fn new(config: DriverConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DriverFactory for ChromiumDriverFactory {
    async fn open(&self) -> Result<Box<dyn BrowserDriver>, DriverError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .request_timeout(self.config.navigate_timeout)
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg(format!("--lang={}", self.config.locale));

        if !self.config.headless {
            builder = builder.with_head();
        }

        let browser_config = builder
            .build()
            .map_err(DriverError::Permanent)?;

        let launch = Browser::launch(browser_config);
        let (browser, mut handler) = tokio::time::timeout(self.config.open_timeout, launch)
            .await
            .map_err(|_| DriverError::Transient("browser launch timed out".to_string()))?
            .map_err(|e| DriverError::Transient(format!("browser launch failed: {}", e)))?;

        // 浏览器事件处理循环
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| DriverError::Transient(format!("failed to open page: {}", e)))?;

        Ok(Box::new(ChromiumDriver {
            browser: Mutex::new(browser),
            page,
            config: self.config.clone(),
            handler_task,
        }))
    }
}

/// Chromium浏览器驱动
///
/// 基于chromiumoxide的单会话驱动实现
pub struct ChromiumDriver {
    browser: Mutex<Browser>,
    page: Page,
    config: DriverConfig,
    handler_task: JoinHandle<()>,
}

impl ChromiumDriver {
    fn classify(e: chromiumoxide::error::CdpError) -> DriverError {
        let message = e.to_string();
        let lowered = message.to_lowercase();
        if lowered.contains("timeout")
            || lowered.contains("connection")
            || lowered.contains("channel")
            || lowered.contains("ws")
        {
            DriverError::Transient(message)
        } else {
            DriverError::Permanent(message)
        }
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        tokio::time::timeout(self.config.navigate_timeout, self.page.goto(url))
            .await
            .map_err(|_| DriverError::Transient(format!("navigation to {} timed out", url)))?
            .map_err(Self::classify)?;
        debug!(url, "navigated");
        Ok(())
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), DriverError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match self.page.find_element(selector).await {
                Ok(_) => return Ok(()),
                Err(_) if tokio::time::Instant::now() < deadline => {
                    tokio::time::sleep(Duration::from_millis(250)).await;
                }
                Err(_) => {
                    return Err(DriverError::Transient(format!(
                        "selector {} did not appear within {:?}",
                        selector, timeout
                    )))
                }
            }
        }
    }

    async fn fill_query(&self, text: &str) -> Result<(), DriverError> {
        let element = self
            .page
            .find_element(SEARCH_BOX_SELECTOR)
            .await
            .map_err(|_| {
                DriverError::Permanent(format!(
                    "search box {} not present on page",
                    SEARCH_BOX_SELECTOR
                ))
            })?;
        element.click().await.map_err(Self::classify)?;
        element.type_str(text).await.map_err(Self::classify)?;
        Ok(())
    }

    async fn scroll_result_list(&self, max_scrolls: u32) -> Result<u32, DriverError> {
        let script = format!(
            r#"(() => {{
                const feed = document.querySelector("{}");
                if (!feed) {{ return -1; }}
                feed.scrollBy(0, feed.clientHeight);
                return feed.scrollTop;
            }})()"#,
            RESULT_FEED_SELECTOR
        );

        let work = async {
            let mut performed = 0u32;
            for _ in 0..max_scrolls {
                let result = self
                    .page
                    .evaluate(script.as_str())
                    .await
                    .map_err(Self::classify)?;
                if matches!(result.value().and_then(|v| v.as_i64()), Some(-1)) {
                    return Err(DriverError::Permanent(format!(
                        "result feed {} not recognized",
                        RESULT_FEED_SELECTOR
                    )));
                }
                performed += 1;
                // 给懒加载留出时间
                tokio::time::sleep(Duration::from_millis(400)).await;
            }
            Ok(performed)
        };

        tokio::time::timeout(self.config.scroll_timeout, work)
            .await
            .map_err(|_| DriverError::Transient("result list scrolling timed out".to_string()))?
    }

    async fn parse_results(&self, max_results: u32) -> Result<Vec<PlaceRecord>, DriverError> {
        let script = format!("({})({})", PARSE_RESULTS_SCRIPT.trim(), max_results);
        let work = async {
            let result = self
                .page
                .evaluate(script.as_str())
                .await
                .map_err(Self::classify)?;

            let value: serde_json::Value = result
                .into_value()
                .map_err(|e| DriverError::Permanent(format!("unparseable result list: {}", e)))?;
            let records: Vec<PlaceRecord> = serde_json::from_value(value)
                .map_err(|e| DriverError::Permanent(format!("unexpected record shape: {}", e)))?;
            Ok(records)
        };

        tokio::time::timeout(self.config.parse_timeout, work)
            .await
            .map_err(|_| DriverError::Transient("result parsing timed out".to_string()))?
    }

    async fn capture_image(&self) -> Result<Vec<u8>, DriverError> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(false)
            .build();

        tokio::time::timeout(self.config.capture_timeout, self.page.screenshot(params))
            .await
            .map_err(|_| DriverError::Transient("screenshot timed out".to_string()))?
            .map_err(Self::classify)
    }

    async fn current_url(&self) -> Option<String> {
        self.page.url().await.ok().flatten()
    }

    async fn is_alive(&self) -> bool {
        self.page.url().await.is_ok()
    }

    async fn close(&self) -> Result<(), DriverError> {
        let close = async {
            let mut browser = self.browser.lock().await;
            browser
                .close()
                .await
                .map(|_| ())
                .map_err(|e| DriverError::Transient(format!("browser close failed: {}", e)))
        };

        let result = tokio::time::timeout(self.config.close_timeout, close)
            .await
            .unwrap_or_else(|_| {
                warn!("browser close timed out, aborting handler");
                Ok(())
            });
        self.handler_task.abort();
        result
    }
}
