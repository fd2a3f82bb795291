use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use group_buy_engine::SettlementError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("{0}")]
    SettlementError(#[from] SettlementError),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::SettlementError(e) => settlement_status_code(e),
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

/// Maps the engine's error taxonomy onto HTTP statuses. Capacity refusals and idempotency guards are conflicts
/// with existing state (409), stale-view state errors are client errors (400), and missing records are 404s.
fn settlement_status_code(e: &SettlementError) -> StatusCode {
    match e {
        SettlementError::GroupNotFound(_) | SettlementError::ProductNotFound(_) | SettlementError::NotAMember { .. } => {
            StatusCode::NOT_FOUND
        },
        e if e.is_capacity_error() || e.is_idempotency_guard() => StatusCode::CONFLICT,
        e if e.is_state_error() => StatusCode::BAD_REQUEST,
        SettlementError::OverpaymentRejected { .. }
        | SettlementError::InvalidAmount(_)
        | SettlementError::InvalidGroupSpec(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod test {
    use gbe_common::Agorot;
    use group_buy_engine::db_types::UserId;

    use super::*;

    #[test]
    fn settlement_errors_map_to_the_right_statuses() {
        let user_id = UserId::from("u1");
        assert_eq!(settlement_status_code(&SettlementError::GroupNotFound(1)), StatusCode::NOT_FOUND);
        assert_eq!(settlement_status_code(&SettlementError::GroupFull(1)), StatusCode::CONFLICT);
        assert_eq!(
            settlement_status_code(&SettlementError::AlreadyMember { group_id: 1, user_id: user_id.clone() }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            settlement_status_code(&SettlementError::DuplicateDeposit { group_id: 1, user_id }),
            StatusCode::CONFLICT
        );
        assert_eq!(settlement_status_code(&SettlementError::GroupNotCompleted(1)), StatusCode::BAD_REQUEST);
        assert_eq!(
            settlement_status_code(&SettlementError::OverpaymentRejected {
                amount: Agorot::from(100),
                remaining: Agorot::from(50)
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            settlement_status_code(&SettlementError::DatabaseError("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
