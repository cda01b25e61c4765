//! 라이브 HTTP 확률 오라클.
//!
//! 요청이 실패하면 종류와 관계없이 `backoff × 2^(시도-1)`만큼 대기하며
//! 최대 `max_retries + 1`번 시도합니다. 모두 실패하면 확률 0과 에러 메시지를
//! 담은 추정을 돌려주므로 오라클 장애가 포지션 진입으로 이어지지 않습니다.
//!
//! 성공한 응답은 반올림된 파라미터 키로 메모이제이션됩니다.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use cycle_core::{OracleEstimate, OracleQuery, OracleSettings};

use crate::error::{OracleError, OracleResult};
use crate::oracle::{ProbabilityOracle, ProbabilitySource};
use crate::wire::{ProbabilityRequest, ProbabilityResponse};

/// 라이브 오라클 설정.
#[derive(Debug, Clone)]
pub struct LiveOracleConfig {
    /// 엔드포인트 URL
    pub url: String,
    /// 최대 재시도 횟수
    pub max_retries: u32,
    /// 요청당 타임아웃
    pub timeout: Duration,
    /// 백오프 단위
    pub backoff: Duration,
}

impl LiveOracleConfig {
    /// 새 설정을 생성합니다.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_retries: 3,
            timeout: Duration::from_millis(5000),
            backoff: Duration::from_millis(500),
        }
    }

    /// 최대 재시도 횟수를 설정합니다.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// 요청 타임아웃을 설정합니다.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 백오프 단위를 설정합니다.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }
}

impl From<&OracleSettings> for LiveOracleConfig {
    fn from(s: &OracleSettings) -> Self {
        Self {
            url: s.url.clone(),
            max_retries: s.max_retries,
            timeout: Duration::from_millis(s.timeout_ms),
            backoff: Duration::from_millis(s.backoff_ms),
        }
    }
}

/// 라이브 오라클 통계.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiveOracleStats {
    /// 발행한 HTTP 요청 수 (재시도 포함)
    pub requests: u64,
    /// 실패한 요청 수 (재시도 포함)
    pub errors: u64,
    /// 메모이제이션된 응답 수
    pub cache_size: usize,
    /// 조회 횟수
    pub lookups: u64,
    /// 메모이제이션 적중 횟수
    pub hits: u64,
}

impl LiveOracleStats {
    /// 메모이제이션 적중률 (%). 조회가 없으면 0.
    pub fn hit_rate(&self) -> f64 {
        if self.lookups == 0 {
            0.0
        } else {
            self.hits as f64 / self.lookups as f64 * 100.0
        }
    }
}

/// HTTP 확률 오라클.
pub struct LiveOracle {
    client: reqwest::Client,
    config: LiveOracleConfig,
    memo: Mutex<HashMap<String, OracleEstimate>>,
    requests: AtomicU64,
    errors: AtomicU64,
    lookups: AtomicU64,
    hits: AtomicU64,
    runtime: Option<Handle>,
}

impl LiveOracle {
    /// 새 라이브 오라클을 생성합니다.
    pub fn new(config: LiveOracleConfig) -> OracleResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| OracleError::Network(e.to_string()))?;

        Ok(Self {
            client,
            config,
            memo: Mutex::new(HashMap::new()),
            requests: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            lookups: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            runtime: None,
        })
    }

    /// 동기 [`ProbabilityOracle`] 호출에 사용할 런타임 핸들을 설정합니다.
    ///
    /// 동기 호출은 런타임 워커가 아닌 스레드(`spawn_blocking`, rayon 등)에서
    /// 이루어져야 합니다.
    pub fn with_runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// 확률을 가져옵니다. 실패해도 에러 대신 확률 0 추정을 반환합니다.
    pub async fn fetch_probability(&self, query: &OracleQuery) -> OracleEstimate {
        let key = query.cache_key();
        self.lookups.fetch_add(1, Ordering::Relaxed);
        if let Some(hit) = self.memo_get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return hit;
        }

        let request = ProbabilityRequest::from(query);
        let attempts = self.config.max_retries + 1;
        let mut last_error = None;

        for attempt in 1..=attempts {
            self.requests.fetch_add(1, Ordering::Relaxed);
            match self.request_once(&request).await {
                Ok(response) => {
                    let estimate = OracleEstimate::from(response);
                    self.memo_put(key, estimate.clone());
                    return estimate;
                }
                Err(e) => {
                    self.errors.fetch_add(1, Ordering::Relaxed);
                    debug!(attempt, attempts, error = %e, "Oracle request failed");
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(self.backoff_delay(attempt)).await;
                    }
                }
            }
        }

        let message = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".to_string());
        warn!(attempts, error = %message, "Oracle retries exhausted, treating probability as 0");
        OracleEstimate::failed(message)
    }

    /// `attempt`번째 실패 후 대기 시간. 시도마다 두 배로 늘어납니다.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(20);
        self.config.backoff.saturating_mul(factor)
    }

    /// 단일 HTTP 요청.
    async fn request_once(&self, request: &ProbabilityRequest) -> OracleResult<ProbabilityResponse> {
        let timeout_ms = self.config.timeout.as_millis() as u64;
        let call = async {
            let response = self
                .client
                .post(&self.config.url)
                .json(request)
                .send()
                .await?;

            let status = response.status();
            let body = response.text().await?;
            if !status.is_success() {
                return Err(OracleError::Api {
                    status: status.as_u16(),
                    body,
                });
            }
            serde_json::from_str::<ProbabilityResponse>(&body)
                .map_err(|_| OracleError::Parse(body))
        };

        match tokio::time::timeout(self.config.timeout, call).await {
            Ok(result) => result.map_err(|e| match e {
                OracleError::Timeout(_) => OracleError::Timeout(timeout_ms),
                other => other,
            }),
            Err(_) => Err(OracleError::Timeout(timeout_ms)),
        }
    }

    fn memo_get(&self, key: &str) -> Option<OracleEstimate> {
        self.memo.lock().ok()?.get(key).cloned()
    }

    fn memo_put(&self, key: String, estimate: OracleEstimate) {
        if let Ok(mut memo) = self.memo.lock() {
            memo.insert(key, estimate);
        }
    }

    /// 요청 통계.
    pub fn stats(&self) -> LiveOracleStats {
        LiveOracleStats {
            requests: self.requests.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            cache_size: self.memo.lock().map(|m| m.len()).unwrap_or(0),
            lookups: self.lookups.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
        }
    }

    /// 메모이제이션 캐시를 비웁니다.
    pub fn clear_cache(&self) {
        if let Ok(mut memo) = self.memo.lock() {
            memo.clear();
        }
    }
}

#[async_trait]
impl ProbabilitySource for LiveOracle {
    async fn fetch(&self, query: &OracleQuery) -> OracleEstimate {
        self.fetch_probability(query).await
    }
}

impl ProbabilityOracle for LiveOracle {
    fn estimate(&self, query: &OracleQuery) -> Option<OracleEstimate> {
        let estimate = match &self.runtime {
            Some(handle) => handle.block_on(self.fetch_probability(query)),
            None => OracleEstimate::failed(OracleError::NoRuntime.to_string()),
        };
        Some(estimate)
    }

    fn name(&self) -> &str {
        "live"
    }
}
