// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Failures inside the worker or its host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwError {
    /// The network request never produced a response.
    Network(String),
    /// A cache operation failed, e.g. a precache entry could not be fetched.
    Cache(String),
    /// The event is not valid in the worker's current lifecycle state.
    InvalidState(String),
    /// No displayed notification carries the given tag.
    NotFound(String),
    BadRequest(String),
}

impl SwError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Network(_) => 502,
            Self::Cache(_) => 500,
            Self::InvalidState(_) => 409,
            Self::NotFound(_) => 404,
            Self::BadRequest(_) => 400,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network(_) => "NETWORK",
            Self::Cache(_) => "CACHE",
            Self::InvalidState(_) => "INVALID_STATE",
            Self::NotFound(_) => "NOT_FOUND",
            Self::BadRequest(_) => "BAD_REQUEST",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Network(m)
            | Self::Cache(m)
            | Self::InvalidState(m)
            | Self::NotFound(m)
            | Self::BadRequest(m) => m,
        }
    }

    pub fn to_http_response(&self) -> (StatusCode, Json<ErrorResponse>) {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse {
            error: ErrorBody { code: self.as_str().to_owned(), message: self.message().to_owned() },
        };
        (status, Json(body))
    }
}

impl fmt::Display for SwError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.as_str(), self.message())
    }
}

impl std::error::Error for SwError {}

/// Top-level error response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error body with machine-readable code and human-readable message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}
