/// Per-user rate limiting for the v1 API
///
/// Token bucket per authenticated user, stored in Redis under
/// `ratelimit:user:{user_id}` and evaluated atomically by a Lua script, so
/// several API instances share one budget. The bucket holds `per_minute`
/// tokens and refills continuously at `per_minute / 60` tokens per second.
///
/// # Headers
///
/// - `X-RateLimit-Limit`: bucket capacity
/// - `X-RateLimit-Remaining`: whole tokens left after this request
/// - `Retry-After`: seconds until one token is available (429 only)
///
/// Redis failures never block a request: the check is skipped with a
/// warning and the request proceeds.

use crate::app::AppState;
use crate::error::ApiError;
use axum::{
    extract::{Extension, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use habitrack_shared::policy::Actor;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Idle buckets expire after this many seconds
const BUCKET_TTL_SECS: u64 = 120;

const TOKEN_BUCKET_SCRIPT: &str = r#"
local key = KEYS[1]
local capacity = tonumber(ARGV[1])
local refill_rate = tonumber(ARGV[2])
local now = tonumber(ARGV[3])
local ttl = tonumber(ARGV[4])

local bucket = redis.call('HMGET', key, 'tokens', 'last_refill')
local tokens = tonumber(bucket[1])
local last_refill = tonumber(bucket[2])

if not tokens then
    tokens = capacity
    last_refill = now
end

local elapsed = math.max(0, now - last_refill)
tokens = math.min(capacity, tokens + (elapsed * refill_rate))

if tokens >= 1 then
    tokens = tokens - 1
    redis.call('HSET', key, 'tokens', tokens, 'last_refill', now)
    redis.call('EXPIRE', key, ttl)
    return {1, math.floor(tokens), 0}
else
    redis.call('HSET', key, 'tokens', tokens, 'last_refill', now)
    redis.call('EXPIRE', key, ttl)
    return {0, 0, math.ceil((1 - tokens) / refill_rate)}
end
"#;

/// Bucket parameters derived from a requests-per-minute budget
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimit {
    pub bucket_capacity: u32,

    /// Tokens per second
    pub refill_rate: f64,
}

impl RateLimit {
    pub fn per_minute(requests: u32) -> Self {
        let requests = requests.max(1);
        RateLimit {
            bucket_capacity: requests,
            refill_rate: f64::from(requests) / 60.0,
        }
    }
}

/// Outcome of one bucket evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub remaining: u32,
    pub retry_after: u64,
}

impl Decision {
    /// Parses the `{allowed, remaining, retry_after}` script reply
    fn from_reply(reply: &[i64]) -> Option<Self> {
        match reply {
            [allowed, remaining, retry_after] => Some(Decision {
                allowed: *allowed == 1,
                remaining: u32::try_from(*remaining).unwrap_or(0),
                retry_after: u64::try_from(*retry_after).unwrap_or(0).max(u64::from(*allowed != 1)),
            }),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    conn: ConnectionManager,
    script: Arc<redis::Script>,
    limit: RateLimit,
}

impl RateLimiter {
    /// Connects to Redis; the connection manager reconnects on its own later
    pub async fn connect(redis_url: &str, limit: RateLimit) -> redis::RedisResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;

        Ok(RateLimiter {
            conn,
            script: Arc::new(redis::Script::new(TOKEN_BUCKET_SCRIPT)),
            limit,
        })
    }

    pub fn limit(&self) -> RateLimit {
        self.limit
    }

    /// Takes one token from the user's bucket
    pub async fn check(&self, user_id: Uuid) -> redis::RedisResult<Decision> {
        let mut conn = self.conn.clone();
        let now = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;

        let reply: Vec<i64> = self
            .script
            .key(bucket_key(user_id))
            .arg(self.limit.bucket_capacity)
            .arg(self.limit.refill_rate)
            .arg(now)
            .arg(BUCKET_TTL_SECS)
            .invoke_async(&mut conn)
            .await?;

        Decision::from_reply(&reply).ok_or_else(|| {
            redis::RedisError::from((
                redis::ErrorKind::TypeError,
                "unexpected rate limit script reply",
            ))
        })
    }
}

fn bucket_key(user_id: Uuid) -> String {
    format!("ratelimit:user:{}", user_id)
}

fn apply_headers(headers: &mut HeaderMap, limit: RateLimit, decision: Decision) {
    headers.insert("x-ratelimit-limit", HeaderValue::from(limit.bucket_capacity));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(decision.remaining));
}

/// Rejects the request with 429 once the actor's bucket is empty
///
/// Must run inside the authentication layer, which provides the [`Actor`].
pub async fn rate_limit_layer(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(limiter) = state.rate_limiter.as_ref() else {
        return Ok(next.run(request).await);
    };

    let decision = match limiter.check(actor.user_id).await {
        Ok(decision) => decision,
        Err(e) => {
            warn!(error = %e, user_id = %actor.user_id, "Rate limit check failed, allowing request");
            return Ok(next.run(request).await);
        }
    };

    if !decision.allowed {
        warn!(user_id = %actor.user_id, retry_after = decision.retry_after, "Rate limit exceeded");
        return Err(ApiError::RateLimitExceeded {
            retry_after: decision.retry_after,
            message: format!(
                "Rate limit exceeded. Try again in {} seconds",
                decision.retry_after
            ),
        });
    }

    let mut response = next.run(request).await;
    apply_headers(response.headers_mut(), limiter.limit(), decision);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_per_minute() {
        let limit = RateLimit::per_minute(60);
        assert_eq!(limit.bucket_capacity, 60);
        assert_eq!(limit.refill_rate, 1.0);

        let slow = RateLimit::per_minute(10);
        assert!((slow.refill_rate - 0.1667).abs() < 0.001);

        assert_eq!(RateLimit::per_minute(0).bucket_capacity, 1);
    }

    #[test]
    fn test_decision_from_reply() {
        assert_eq!(
            Decision::from_reply(&[1, 41, 0]),
            Some(Decision {
                allowed: true,
                remaining: 41,
                retry_after: 0
            })
        );
        assert_eq!(
            Decision::from_reply(&[0, 0, 3]),
            Some(Decision {
                allowed: false,
                remaining: 0,
                retry_after: 3
            })
        );
        assert_eq!(Decision::from_reply(&[1, 2]), None);
    }

    #[test]
    fn test_rejection_always_waits_at_least_one_second() {
        let decision = Decision::from_reply(&[0, 0, 0]).unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.retry_after, 1);
    }

    #[test]
    fn test_bucket_key() {
        let id = Uuid::nil();
        assert_eq!(
            bucket_key(id),
            "ratelimit:user:00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn test_apply_headers() {
        let mut headers = HeaderMap::new();
        apply_headers(
            &mut headers,
            RateLimit::per_minute(60),
            Decision {
                allowed: true,
                remaining: 12,
                retry_after: 0,
            },
        );

        assert_eq!(headers["x-ratelimit-limit"], "60");
        assert_eq!(headers["x-ratelimit-remaining"], "12");
    }
}
