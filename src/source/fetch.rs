//! # 网络下载
//!
//! ## 设计思路
//!
//! 网络面收敛为 `Fetcher` trait（URL → 字节），来源解析只依赖该 trait，
//! 测试可用固定响应替身代替真实网络。
//!
//! ## 实现思路
//!
//! `HttpFetcher`：
//! - 浏览器 UA + Referer，避免图床拒绝
//! - 408/429/5xx 与连接类错误按指数退避 + 抖动重试，尊重 `Retry-After`
//! - `Content-Length` 预检 + 流式累计双重体积限制
//! - 首包/分块读取超时
//! - 短时 LRU 下载缓存，同一次粘贴中重复地址只下载一次
//! - 日志中的 URL 去除查询串与片段

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;

use super::SourceConfig;
use crate::asset::AssetError;

const NETWORK_RETRY_BASE_DELAY_MS: u64 = 180;
const BUFFER_INITIAL_CAPACITY: usize = 16 * 1024;

/// 网络面：获取远程资源字节。
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes, AssetError>;
}

struct CachedDownload {
    bytes: Bytes,
    created_at: Instant,
}

/// 基于 reqwest 的下载器。
pub struct HttpFetcher {
    config: SourceConfig,
    client: reqwest::Client,
    cache: Option<Mutex<LruCache<String, CachedDownload>>>,
}

impl HttpFetcher {
    pub fn new(config: SourceConfig) -> Result<Self, AssetError> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.download_timeout))
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| AssetError::Network(format!("无法创建 HTTP 客户端：{}", e)))?;

        let cache = NonZeroUsize::new(config.download_cache_entries)
            .map(|capacity| Mutex::new(LruCache::new(capacity)));

        Ok(Self {
            config,
            client,
            cache,
        })
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    async fn download(&self, url: &reqwest::Url) -> Result<Bytes, AssetError> {
        let config = &self.config;
        let referer = format!("{}://{}/", url.scheme(), url.host_str().unwrap_or(""));

        let mut attempt: u8 = 1;
        let response = loop {
            let send_result = self
                .client
                .get(url.clone())
                .header(
                    reqwest::header::ACCEPT,
                    "image/avif,image/webp,image/apng,image/svg+xml,image/*,*/*;q=0.8",
                )
                .header(reqwest::header::REFERER, referer.as_str())
                .send()
                .await;

            match send_result {
                Ok(resp) => {
                    if attempt < config.retry_attempts && is_retryable_http_status(resp.status()) {
                        let delay_ms = compute_retry_delay_with_jitter(
                            attempt,
                            retry_after_hint_ms(resp.headers()),
                            self.max_retry_delay_ms(),
                        );
                        log::warn!(
                            "⚠️ HTTP {}（第 {}/{} 次，可重试）；{}ms 后重试",
                            resp.status().as_u16(),
                            attempt,
                            config.retry_attempts,
                            delay_ms
                        );
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                        attempt = attempt.saturating_add(1);
                        continue;
                    }
                    break resp;
                }
                Err(err) => {
                    if attempt >= config.retry_attempts || !is_retryable_network_error(&err) {
                        return Err(self.map_reqwest_error(err, url.as_str()));
                    }

                    let delay_ms = compute_retry_delay_with_jitter(attempt, None, self.max_retry_delay_ms());
                    log::warn!(
                        "⚠️ 网络请求失败（第 {}/{} 次，可重试）：{}；{}ms 后重试",
                        attempt,
                        config.retry_attempts,
                        sanitize_error_message(&err.to_string(), url.as_str()),
                        delay_ms
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    attempt = attempt.saturating_add(1);
                }
            }
        };

        if !response.status().is_success() {
            return Err(AssetError::Network(format!(
                "HTTP {}: {}",
                response.status().as_u16(),
                status_message(response.status().as_u16())
            )));
        }

        if let Some(ct) = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|ct| ct.to_str().ok())
        {
            if !is_image_content_type(ct) {
                log::debug!("🔎 响应类型不是图片（{}），交由签名嗅探判定", ct);
            }
        }

        let total_len = response.content_length();
        if let Some(size) = total_len {
            if size > config.max_file_size {
                return Err(AssetError::ResourceLimit(format!(
                    "文件过大：{:.2} MB（限制：{:.2} MB）",
                    size as f64 / 1024.0 / 1024.0,
                    config.max_file_size as f64 / 1024.0 / 1024.0
                )));
            }
        }

        let initial_capacity = total_len
            .map(|len| len.min(config.max_file_size).min(usize::MAX as u64) as usize)
            .filter(|len| *len > 0)
            .unwrap_or(BUFFER_INITIAL_CAPACITY);
        let mut buffer = Vec::with_capacity(initial_capacity);
        let mut total: u64 = 0;
        let mut received_first_chunk = false;
        let mut response = response;

        loop {
            let read_timeout = if received_first_chunk {
                Duration::from_millis(config.stream_chunk_timeout_ms)
            } else {
                Duration::from_millis(config.stream_first_byte_timeout_ms)
            };

            let next_chunk = tokio::time::timeout(read_timeout, response.chunk())
                .await
                .map_err(|_| {
                    if received_first_chunk {
                        AssetError::Timeout("下载数据流读取超时".to_string())
                    } else {
                        AssetError::Timeout("下载首包超时".to_string())
                    }
                })?
                .map_err(|e| AssetError::Network(format!("下载失败：{}", e)))?;

            let Some(chunk) = next_chunk else {
                break;
            };
            received_first_chunk = true;

            total = total.saturating_add(chunk.len() as u64);
            if total > config.max_file_size {
                return Err(AssetError::ResourceLimit("下载后文件超过大小限制".to_string()));
            }
            buffer.extend_from_slice(&chunk);
        }

        if buffer.is_empty() {
            return Err(AssetError::InvalidFormat("下载内容为空".to_string()));
        }

        log::debug!("✅ 下载完成 - {} bytes", total);
        Ok(Bytes::from(buffer))
    }

    /// 单次重试等待不超过整体下载超时。
    fn max_retry_delay_ms(&self) -> u64 {
        self.config.download_timeout.saturating_mul(1000)
    }

    fn map_reqwest_error(&self, e: reqwest::Error, url: &str) -> AssetError {
        let err_msg = sanitize_error_message(&e.to_string(), url);

        if e.is_timeout() {
            AssetError::Timeout(format!("下载超时（{}秒）", self.config.download_timeout))
        } else if e.is_connect() {
            AssetError::Network(format!("无法连接：{}", err_msg))
        } else if e.is_redirect() {
            AssetError::Network(format!(
                "重定向次数超过限制（{}）：{}",
                self.config.max_redirects, err_msg
            ))
        } else {
            AssetError::Network(format!("请求失败：{}", err_msg))
        }
    }

    fn cached(&self, url: &str) -> Option<Bytes> {
        let cache = self.cache.as_ref()?;
        let mut cache = cache.lock().ok()?;
        let ttl = Duration::from_secs(self.config.download_cache_ttl_secs);

        let expired = cache.peek(url).is_some_and(|item| item.created_at.elapsed() > ttl);
        if expired {
            cache.pop(url);
            return None;
        }
        cache.get(url).map(|item| item.bytes.clone())
    }

    fn store_cache(&self, url: &str, bytes: &Bytes) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        if let Ok(mut cache) = cache.lock() {
            cache.put(
                url.to_string(),
                CachedDownload {
                    bytes: bytes.clone(),
                    created_at: Instant::now(),
                },
            );
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, AssetError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| AssetError::InvalidFormat(format!("URL 格式错误：{}", e)))?;
        let key = parsed.to_string();

        if let Some(bytes) = self.cached(&key) {
            log::debug!("♻️ 命中下载缓存 - URL: {}", redact_url_for_log(&key));
            return Ok(bytes);
        }

        log::info!("🌐 开始下载图片 - URL: {}", redact_url_for_log(&key));
        let bytes = self.download(&parsed).await?;
        self.store_cache(&key, &bytes);
        Ok(bytes)
    }
}

fn retry_after_hint_ms(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    let value = headers.get(reqwest::header::RETRY_AFTER)?;
    let secs = value.to_str().ok()?.trim().parse::<u64>().ok()?;
    Some(secs.saturating_mul(1000))
}

fn compute_retry_delay_with_jitter(attempt: u8, server_hint_ms: Option<u64>, max_delay_ms: u64) -> u64 {
    let exp = NETWORK_RETRY_BASE_DELAY_MS.saturating_mul(1_u64 << (attempt.saturating_sub(1) as u32));
    let base = server_hint_ms.unwrap_or(exp);
    let jitter_bound = (base / 2).max(1);
    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    base.saturating_add(seed % (jitter_bound + 1)).min(max_delay_ms)
}

fn is_retryable_http_status(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::REQUEST_TIMEOUT
        || status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

fn is_retryable_network_error(error: &reqwest::Error) -> bool {
    if error.is_timeout() || error.is_connect() {
        return true;
    }

    let msg = error.to_string().to_lowercase();
    msg.contains("connection reset")
        || msg.contains("connection closed before message completed")
        || msg.contains("tls handshake")
}

fn is_image_content_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|base| base.trim().to_ascii_lowercase().starts_with("image/"))
        .unwrap_or(false)
}

fn status_message(code: u16) -> &'static str {
    match code {
        404 => "未找到",
        403 => "访问被拒绝",
        500..=599 => "服务器错误",
        _ => "请求失败",
    }
}

/// 去除查询串与片段，避免 token 进入日志。
pub(crate) fn redact_url_for_log(url: &str) -> String {
    let Ok(parsed) = reqwest::Url::parse(url) else {
        return "<invalid-url>".to_string();
    };

    let host = parsed.host_str().unwrap_or("<unknown-host>");
    let port = parsed.port().map(|p| format!(":{}", p)).unwrap_or_default();
    format!("{}://{}{}{}", parsed.scheme(), host, port, parsed.path())
}

fn sanitize_error_message(error_msg: &str, url: &str) -> String {
    error_msg.replace(url, &redact_url_for_log(url))
}
