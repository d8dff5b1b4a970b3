//! # 请求客户端模块
//!
//! ## 设计思路
//!
//! 负责把 `IdentificationRequest` 发往识别服务并取回原始响应。
//! 密钥与端点在构造时注入，不写进源码。
//!
//! ## 实现思路
//!
//! - 单次 POST：`Content-Type: application/json` + `Api-Key` 头 + `details` 查询参数。
//! - 每次调用只尝试一次，不重试，超时沿用 reqwest 默认值。
//! - 非 2xx 直接短路为 `Network` 错误，不再解析响应体。
//! - 响应体按块读取并限制总字节数。

use std::fmt;

use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};

use super::source::{IdentificationRequest, RawResponse};
use super::{IdentifierConfig, IdentifyError};

const API_KEY_HEADER: &str = "Api-Key";

/// 识别服务凭据。
///
/// `Debug` 输出会打码，避免进日志。
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Result<Self, IdentifyError> {
        let key = key.into();
        let trimmed = key.trim();
        if trimmed.is_empty() {
            return Err(IdentifyError::InvalidConfig("API 密钥不能为空".to_string()));
        }
        if trimmed.chars().any(|c| c.is_control()) {
            return Err(IdentifyError::InvalidConfig("API 密钥包含非法字符".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let visible: String = self.0.chars().take(4).collect();
        write!(f, "ApiKey({}***)", visible)
    }
}

/// 识别服务 HTTP 客户端。
#[derive(Debug)]
pub struct IdentificationClient {
    http: reqwest::Client,
    url: reqwest::Url,
    api_key: ApiKey,
    max_response_bytes: u64,
}

impl IdentificationClient {
    /// 根据配置构建客户端。
    ///
    /// 这里同时构建复用型 HTTP 客户端，减少每次请求的初始化开销。
    pub fn new(config: &IdentifierConfig, api_key: ApiKey) -> Result<Self, IdentifyError> {
        let url = Self::build_url(config)?;
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| IdentifyError::InvalidConfig(format!("HTTP 客户端初始化失败：{}", e)))?;

        Ok(Self {
            http,
            url,
            api_key,
            max_response_bytes: config.max_response_bytes,
        })
    }

    /// 端点 + `details=common_names,description`。
    pub(crate) fn build_url(config: &IdentifierConfig) -> Result<reqwest::Url, IdentifyError> {
        let mut url = reqwest::Url::parse(&config.endpoint)
            .map_err(|e| IdentifyError::InvalidConfig(format!("endpoint 格式错误：{}", e)))?;

        let details = config.detail_fields.join(",");
        if !details.is_empty() {
            url.query_pairs_mut().append_pair("details", &details);
        }

        Ok(url)
    }

    pub fn url(&self) -> &reqwest::Url {
        &self.url
    }

    /// 发送一次识别请求。
    pub async fn send(&self, request: &IdentificationRequest) -> Result<RawResponse, IdentifyError> {
        let body = serde_json::to_vec(request)
            .map_err(|e| IdentifyError::Encoding(format!("请求体序列化失败：{}", e)))?;

        log::info!(
            "🌐 发送识别请求 - {}{} body={}KB",
            self.url.origin().ascii_serialization(),
            self.url.path(),
            body.len() / 1024
        );

        let mut response = self
            .http
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(API_KEY_HEADER, self.api_key.expose())
            .body(body)
            .send()
            .await
            .map_err(Self::map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(IdentifyError::Network(format!(
                "HTTP {}：{}",
                status.as_u16(),
                Self::status_message(status.as_u16())
            )));
        }

        if let Some(declared) = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
        {
            if declared > self.max_response_bytes {
                return Err(self.response_too_large(declared));
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(Self::map_reqwest_error)? {
            if (body.len() + chunk.len()) as u64 > self.max_response_bytes {
                return Err(self.response_too_large((body.len() + chunk.len()) as u64));
            }
            body.extend_from_slice(&chunk);
        }

        log::debug!("📥 收到响应 - status={} size={}B", status.as_u16(), body.len());

        Ok(RawResponse {
            status: status.as_u16(),
            body,
        })
    }

    fn response_too_large(&self, size: u64) -> IdentifyError {
        IdentifyError::Network(format!(
            "响应体过大：{} 字节（限制：{} 字节）",
            size, self.max_response_bytes
        ))
    }

    /// 统一映射 reqwest 错误到业务错误。
    fn map_reqwest_error(e: reqwest::Error) -> IdentifyError {
        if e.is_timeout() {
            IdentifyError::Network("请求超时".to_string())
        } else if e.is_connect() {
            IdentifyError::Network(format!("无法连接识别服务：{}", e))
        } else {
            IdentifyError::Network(format!("请求失败：{}", e))
        }
    }

    fn status_message(status: u16) -> &'static str {
        match status {
            400 => "请求格式错误",
            401 => "API 密钥无效",
            403 => "无访问权限",
            404 => "识别端点不存在",
            413 => "图片过大",
            429 => "额度或频率超限",
            500..=599 => "识别服务内部错误",
            _ => "未知状态",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_carries_detail_fields() {
        let url = IdentificationClient::build_url(&IdentifierConfig::default()).unwrap();
        assert_eq!(url.path(), "/api/v3/identification");
        assert_eq!(url.query(), Some("details=common_names%2Cdescription"));
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs, vec![("details".to_string(), "common_names,description".to_string())]);
    }

    #[test]
    fn url_without_detail_fields_has_no_query() {
        let mut config = IdentifierConfig::default();
        config.detail_fields.clear();
        let url = IdentificationClient::build_url(&config).unwrap();
        assert_eq!(url.query(), None);
    }

    #[test]
    fn api_key_is_redacted_and_validated() {
        let key = ApiKey::new("  abcd1234secret ").unwrap();
        assert_eq!(key.expose(), "abcd1234secret");
        assert_eq!(format!("{:?}", key), "ApiKey(abcd***)");

        assert!(matches!(ApiKey::new("   "), Err(IdentifyError::InvalidConfig(_))));
        assert!(matches!(ApiKey::new("abc\ndef"), Err(IdentifyError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn connection_failure_is_a_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut config = IdentifierConfig::default();
        config.endpoint = format!("http://127.0.0.1:{}/identify", port);
        let client = IdentificationClient::new(&config, ApiKey::new("key").unwrap()).unwrap();

        let payload = crate::identification::source::EncodedPayload::new(1, 1, 3, "QUJD".to_string());
        let request = IdentificationRequest::single(payload, false);
        let result = client.send(&request).await;
        assert!(matches!(result, Err(IdentifyError::Network(_))));
    }
}
