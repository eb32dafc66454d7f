use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Serialize)]
struct ErrorBody {
	error_code: &'static str,
	message:    String,
}

/// Every handler returns `Result<_, ApiError>`; this is the single place that
/// decides which internal error maps to which HTTP status so the mapping
/// can't drift between routes.
pub struct ApiError {
	status:  StatusCode,
	code:    &'static str,
	message: String,
}

impl ApiError {
	pub fn invalid(message: impl Into<String>) -> Self {
		Self { status: StatusCode::BAD_REQUEST, code: "invalid_request", message: message.into() }
	}

	pub fn not_found(message: impl Into<String>) -> Self {
		Self { status: StatusCode::NOT_FOUND, code: "not_found", message: message.into() }
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		(self.status, Json(ErrorBody { error_code: self.code, message: self.message })).into_response()
	}
}

impl From<kgraph_service::Error> for ApiError {
	fn from(err: kgraph_service::Error) -> Self {
		use kgraph_service::Error::*;
		match err {
			InvalidRequest { message } => Self { status: StatusCode::BAD_REQUEST, code: "invalid_request", message },
			Unauthorized { message } => Self { status: StatusCode::UNAUTHORIZED, code: "unauthorized", message },
			ScopeDenied { message } => Self { status: StatusCode::FORBIDDEN, code: "scope_denied", message },
			TooManyRequests { retry_after_ms } => Self {
				status:  StatusCode::TOO_MANY_REQUESTS,
				code:    "too_many_requests",
				message: format!("retry after {retry_after_ms}ms"),
			},
			NotFound { message } => Self { status: StatusCode::NOT_FOUND, code: "not_found", message },
			Conflict { message } => Self { status: StatusCode::CONFLICT, code: "conflict", message },
			Provider { message } => Self { status: StatusCode::BAD_GATEWAY, code: "provider_error", message },
			Storage { message } => Self { status: StatusCode::INTERNAL_SERVER_ERROR, code: "storage_error", message },
		}
	}
}

impl From<kgraph_storage::Error> for ApiError {
	fn from(err: kgraph_storage::Error) -> Self {
		kgraph_service::Error::from(err).into()
	}
}

impl From<kgraph_connectors::Error> for ApiError {
	fn from(err: kgraph_connectors::Error) -> Self {
		if err.is_permanent() {
			Self { status: StatusCode::BAD_REQUEST, code: "connector_rejected", message: err.to_string() }
		} else {
			Self { status: StatusCode::BAD_GATEWAY, code: "connector_error", message: err.to_string() }
		}
	}
}

impl From<kgraph_crypto::Error> for ApiError {
	fn from(err: kgraph_crypto::Error) -> Self {
		Self { status: StatusCode::INTERNAL_SERVER_ERROR, code: "crypto_error", message: err.to_string() }
	}
}
