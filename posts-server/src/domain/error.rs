use std::fmt;

use actix_web::http::header::ContentType;
use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),
    #[error("post not found: {0}")]
    PostNotFound(i64),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("invalid form: {0}")]
    InvalidForm(String),
    #[error("internal error: {0}")]
    Internal(String),
}

/// One violated rule, keyed by the form field it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Every rule an input violated, in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    pub fn fields(&self) -> Vec<&'static str> {
        self.0.iter().map(|e| e.field).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    /// Errors grouped per field, the shape the form templates read.
    pub fn by_field(&self) -> std::collections::BTreeMap<&'static str, Vec<String>> {
        let mut grouped = std::collections::BTreeMap::new();
        for e in &self.0 {
            grouped
                .entry(e.field)
                .or_insert_with(Vec::new)
                .push(e.message.clone());
        }
        grouped
    }

    pub fn into_result(self) -> Result<(), DomainError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(DomainError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl DomainError {
    /// The field errors when this is a validation failure.
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            DomainError::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

impl ResponseError for DomainError {
    fn status_code(&self) -> StatusCode {
        match self {
            DomainError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DomainError::PostNotFound(_) => StatusCode::NOT_FOUND,
            DomainError::InvalidForm(_) => StatusCode::BAD_REQUEST,
            DomainError::Storage(_) | DomainError::Persistence(_) | DomainError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        // storage and database details stay in the logs
        let message = match self {
            DomainError::Storage(_) | DomainError::Persistence(_) | DomainError::Internal(_) => {
                "Something went wrong while handling your request.".to_string()
            }
            _ => self.to_string(),
        };
        let body = format!(
            "<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>{code}</title></head>\
             <body><h1>{code} {reason}</h1><p>{message}</p><p><a href=\"/posts\">Back to posts</a></p></body></html>",
            code = status.as_u16(),
            reason = status.canonical_reason().unwrap_or("Error"),
            message = tera::escape_html(&message),
        );
        HttpResponse::build(status)
            .insert_header(ContentType::html())
            .body(body)
    }
}
