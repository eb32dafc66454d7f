use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration as StdDuration, Instant};

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use kgraph_config::{Auth as AuthConfig, RateLimit};
use moka::sync::Cache;
use serde::Deserialize;

use crate::{Error, Result};

#[derive(Debug, Deserialize)]
struct RawClaims {
	sub: Option<String>,
	tenant_id: Option<String>,
	#[serde(default)]
	scope: Option<ScopeClaim>,
	#[serde(default)]
	scopes: Option<ScopeClaim>,
}

/// Scopes may arrive as a JSON array or as a single space-separated string;
/// both forms are accepted.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScopeClaim {
	List(Vec<String>),
	Spaced(String),
}

impl ScopeClaim {
	fn into_list(self) -> Vec<String> {
		match self {
			Self::List(items) => items,
			Self::Spaced(text) => text.split_whitespace().map(str::to_string).collect(),
		}
	}
}

#[derive(Clone, Debug)]
pub struct Claims {
	pub subject: Option<String>,
	pub tenant_id: String,
	pub scopes: Vec<String>,
}

impl Claims {
	pub fn has_scope(&self, scope: &str) -> bool {
		self.scopes.iter().any(|s| s == scope)
	}
}

/// Verifies a bearer token against the configured algorithm, issuer,
/// audience, and expiration (with `clock_skew_seconds` tolerance), then
/// extracts tenant and scope claims. Auth-disabled deployments bind a fixed
/// development tenant instead of calling this at all (see
/// `TenantBinder::bind`).
pub fn verify_token(cfg: &AuthConfig, token: &str) -> Result<Claims> {
	let jwt = cfg.jwt.as_ref().ok_or_else(|| Error::Unauthorized { message: "auth is not configured".to_string() })?;

	let algorithm = match jwt.algorithm.as_str() {
		"HS256" => Algorithm::HS256,
		"RS256" => Algorithm::RS256,
		"ES256" => Algorithm::ES256,
		other => return Err(Error::Unauthorized { message: format!("unsupported algorithm {other}") }),
	};

	let key = match algorithm {
		Algorithm::HS256 => {
			let secret = jwt
				.hmac_secret
				.as_deref()
				.ok_or_else(|| Error::Unauthorized { message: "missing hmac secret".to_string() })?;
			DecodingKey::from_secret(secret.as_bytes())
		},
		Algorithm::RS256 => {
			let pem = jwt
				.public_key
				.as_deref()
				.ok_or_else(|| Error::Unauthorized { message: "missing jwt public key".to_string() })?;
			DecodingKey::from_rsa_pem(pem.as_bytes())
				.map_err(|err| Error::Unauthorized { message: format!("invalid RSA public key: {err}") })?
		},
		Algorithm::ES256 => {
			let pem = jwt
				.public_key
				.as_deref()
				.ok_or_else(|| Error::Unauthorized { message: "missing jwt public key".to_string() })?;
			DecodingKey::from_ec_pem(pem.as_bytes())
				.map_err(|err| Error::Unauthorized { message: format!("invalid EC public key: {err}") })?
		},
		_ => return Err(Error::Unauthorized { message: "unsupported algorithm".to_string() }),
	};

	let mut validation = Validation::new(algorithm);
	validation.set_issuer(&[jwt.issuer.as_str()]);
	validation.set_audience(&[jwt.audience.as_str()]);
	validation.leeway = jwt.clock_skew_seconds;

	let decoded = decode::<RawClaims>(token, &key, &validation)?;
	let raw = decoded.claims;

	let tenant_id = raw.tenant_id.ok_or_else(|| Error::Unauthorized { message: "missing tenant_id claim".to_string() })?;
	let scopes = raw.scope.or(raw.scopes).map(ScopeClaim::into_list).unwrap_or_default();

	Ok(Claims { subject: raw.sub, tenant_id, scopes })
}

pub fn require_scope(claims: &Claims, required: &str) -> Result<()> {
	if claims.has_scope(required) {
		Ok(())
	} else {
		Err(Error::ScopeDenied { message: format!("missing required scope {required}") })
	}
}

/// `tenant_id` is bound from the verified token only; any `tenant_id` found
/// in a request body or query parameter is ignored, and the caller should
/// count that as an `access_violation{type=cross_tenant_query}` event.
pub struct TenantBinder {
	dev_mode: bool,
	default_tenant: Option<String>,
}

impl TenantBinder {
	pub fn new(cfg: &AuthConfig, default_tenant: Option<String>) -> Self {
		Self { dev_mode: cfg.mode == "off", default_tenant }
	}

	pub fn bind(&self, claims: Option<&Claims>) -> Result<String> {
		if self.dev_mode {
			return self
				.default_tenant
				.clone()
				.ok_or_else(|| Error::InvalidRequest { message: "no default tenant configured".to_string() });
		}
		claims
			.map(|c| c.tenant_id.clone())
			.ok_or_else(|| Error::Unauthorized { message: "missing verified claims".to_string() })
	}
}

/// Fixed-window-per-second token bucket backed by a 1-second-TTL cache, one
/// counter per `(tenant, endpoint)`. Within a wall-clock second the counter
/// may not exceed `burst`; `rate` bounds how many windows in a row can run
/// at full burst before the caller starts seeing rejects (approximated here
/// as a plain per-second ceiling, the simplest implementation that
/// satisfies the contract).
pub struct RateLimiter {
	counters: Cache<String, Arc<Mutex<u32>>>,
	burst: u32,
}

impl RateLimiter {
	pub fn new(cfg: &RateLimit) -> Self {
		let counters = Cache::builder().time_to_live(StdDuration::from_secs(1)).build();
		Self { counters, burst: cfg.burst }
	}

	pub fn check(&self, tenant_id: &str, endpoint: &str) -> Result<()> {
		let key = format!("{tenant_id}:{endpoint}");
		let counter = self.counters.get_with(key, || Arc::new(Mutex::new(0)));
		let mut count = counter.lock().expect("rate limiter mutex poisoned");
		if *count >= self.burst {
			return Err(Error::TooManyRequests { retry_after_ms: 1000 });
		}
		*count += 1;
		Ok(())
	}
}

struct ConcurrencySlot {
	acquired_at: Instant,
}

/// Bounds in-flight requests per `(tenant, endpoint)`. `acquire` returns a
/// guard; dropping the guard releases the slot even on panic/cancellation.
/// `reap_stale` should be called periodically to clear acquisitions older
/// than the stale threshold (10 minutes per the contract) in case a guard
/// was leaked.
pub struct ConcurrencyGate {
	limits: HashMap<String, u32>,
	slots: Mutex<HashMap<String, Vec<ConcurrencySlot>>>,
}

pub struct ConcurrencyGuard<'a> {
	gate: &'a ConcurrencyGate,
	key: String,
}

impl Drop for ConcurrencyGuard<'_> {
	fn drop(&mut self) {
		let mut slots = self.gate.slots.lock().expect("concurrency gate mutex poisoned");
		if let Some(bucket) = slots.get_mut(&self.key) {
			if !bucket.is_empty() {
				bucket.remove(0);
			}
		}
	}
}

impl ConcurrencyGate {
	pub fn new(limits: HashMap<String, u32>) -> Self {
		Self { limits, slots: Mutex::new(HashMap::new()) }
	}

	pub fn acquire(&self, tenant_id: &str, endpoint: &str) -> Result<ConcurrencyGuard<'_>> {
		let key = format!("{tenant_id}:{endpoint}");
		let limit = self.limits.get(endpoint).copied().unwrap_or(u32::MAX);

		let mut slots = self.slots.lock().expect("concurrency gate mutex poisoned");
		let bucket = slots.entry(key.clone()).or_default();
		if bucket.len() as u32 >= limit {
			return Err(Error::TooManyRequests { retry_after_ms: 0 });
		}
		bucket.push(ConcurrencySlot { acquired_at: Instant::now() });
		drop(slots);

		Ok(ConcurrencyGuard { gate: self, key })
	}

	/// Clears acquisitions older than `stale_after`. Run on an interval by
	/// the worker's housekeeping loop.
	pub fn reap_stale(&self, stale_after: StdDuration) {
		let now = Instant::now();
		let mut slots = self.slots.lock().expect("concurrency gate mutex poisoned");
		for bucket in slots.values_mut() {
			bucket.retain(|slot| now.duration_since(slot.acquired_at) < stale_after);
		}
	}
}

#[cfg(test)]
mod tests {
	use jsonwebtoken::{EncodingKey, Header, encode};
	use kgraph_config::JwtConfig;
	use serde::Serialize;

	use super::*;

	#[test]
	fn scope_claim_accepts_space_separated_string() {
		let claim = ScopeClaim::Spaced("read write".to_string());
		assert_eq!(claim.into_list(), vec!["read".to_string(), "write".to_string()]);
	}

	#[derive(Serialize)]
	struct EncodableClaims {
		sub: &'static str,
		tenant_id: &'static str,
		scope: &'static str,
		exp: u64,
		iss: &'static str,
		aud: &'static str,
	}

	fn hs256_config() -> AuthConfig {
		AuthConfig {
			mode: "jwt".to_string(),
			jwt: Some(JwtConfig {
				algorithm: "HS256".to_string(),
				hmac_secret: Some("test-secret".to_string()),
				public_key: None,
				issuer: "kgraph-tests".to_string(),
				audience: "kgraph-api".to_string(),
				clock_skew_seconds: 60,
			}),
		}
	}

	#[test]
	fn hs256_round_trip_extracts_tenant_and_scopes() {
		let cfg = hs256_config();
		let claims = EncodableClaims {
			sub: "user-1",
			tenant_id: "tenant-a",
			scope: "search ask",
			exp: 32_503_680_000,
			iss: "kgraph-tests",
			aud: "kgraph-api",
		};
		let token =
			encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(b"test-secret")).unwrap();

		let verified = verify_token(&cfg, &token).expect("well-formed HS256 token should verify");
		assert_eq!(verified.tenant_id, "tenant-a");
		assert_eq!(verified.subject.as_deref(), Some("user-1"));
		assert!(verified.has_scope("search"));
		assert!(verified.has_scope("ask"));
	}

	#[test]
	fn hs256_rejects_a_token_signed_with_the_wrong_secret() {
		let cfg = hs256_config();
		let claims = EncodableClaims {
			sub: "user-1",
			tenant_id: "tenant-a",
			scope: "search",
			exp: 32_503_680_000,
			iss: "kgraph-tests",
			aud: "kgraph-api",
		};
		let token =
			encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(b"wrong-secret")).unwrap();

		assert!(verify_token(&cfg, &token).is_err());
	}

	#[test]
	fn rs256_without_a_configured_public_key_is_rejected() {
		let mut cfg = hs256_config();
		if let Some(jwt) = cfg.jwt.as_mut() {
			jwt.algorithm = "RS256".to_string();
			jwt.public_key = None;
		}
		let err = verify_token(&cfg, "irrelevant.token.value").unwrap_err();
		assert!(matches!(err, Error::Unauthorized { .. }));
	}

	#[test]
	fn es256_without_a_configured_public_key_is_rejected() {
		let mut cfg = hs256_config();
		if let Some(jwt) = cfg.jwt.as_mut() {
			jwt.algorithm = "ES256".to_string();
			jwt.public_key = None;
		}
		let err = verify_token(&cfg, "irrelevant.token.value").unwrap_err();
		assert!(matches!(err, Error::Unauthorized { .. }));
	}

	#[test]
	fn concurrency_gate_rejects_past_limit_and_releases_on_drop() {
		let mut limits = HashMap::new();
		limits.insert("ask".to_string(), 1);
		let gate = ConcurrencyGate::new(limits);

		let first = gate.acquire("tenant-a", "ask").unwrap();
		assert!(gate.acquire("tenant-a", "ask").is_err());
		drop(first);
		assert!(gate.acquire("tenant-a", "ask").is_ok());
	}

	#[test]
	fn rate_limiter_rejects_past_burst() {
		let cfg = RateLimit { requests_per_minute: 60, burst: 2, max_concurrent_per_tenant: 5 };
		let limiter = RateLimiter::new(&cfg);
		assert!(limiter.check("tenant-a", "search").is_ok());
		assert!(limiter.check("tenant-a", "search").is_ok());
		assert!(limiter.check("tenant-a", "search").is_err());
	}
}
