use actix_web::HttpResponse;
use fleet_core::{ErrorCode, FleetError};
use serde::Serialize;
use std::str::FromStr;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, serde::Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl ListQuery {
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(100).min(1000)
    }

    pub fn offset(&self) -> usize {
        self.offset.unwrap_or(0)
    }
}

pub fn bad_request(message: impl Into<String>) -> HttpResponse {
    HttpResponse::BadRequest().json(ErrorResponse {
        error: message.into(),
    })
}

pub fn not_found(message: impl Into<String>) -> HttpResponse {
    HttpResponse::NotFound().json(ErrorResponse {
        error: message.into(),
    })
}

pub fn conflict(message: impl Into<String>) -> HttpResponse {
    HttpResponse::Conflict().json(ErrorResponse {
        error: message.into(),
    })
}

pub fn service_unavailable(message: impl Into<String>) -> HttpResponse {
    HttpResponse::ServiceUnavailable().json(ErrorResponse {
        error: message.into(),
    })
}

pub fn internal_error(message: impl Into<String>) -> HttpResponse {
    HttpResponse::InternalServerError().json(ErrorResponse {
        error: message.into(),
    })
}

pub fn error_response(err: impl Into<FleetError>) -> HttpResponse {
    let err = err.into();
    match err.code {
        ErrorCode::InvalidInput => bad_request(err.message),
        ErrorCode::NotFound => not_found(err.message),
        ErrorCode::Conflict => conflict(err.message),
        ErrorCode::Unavailable | ErrorCode::Upstream => service_unavailable(err.message),
        ErrorCode::Internal => internal_error(err.message),
    }
}

pub fn parse_id<T: FromStr>(value: &str) -> Result<T, HttpResponse> {
    T::from_str(value).map_err(|_| bad_request("invalid UUID"))
}
