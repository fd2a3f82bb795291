use std::fmt::Display;

use chrono::{DateTime, Utc};
use gbe_common::Agorot;
use group_buy_engine::db_types::UserId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// Request body for opening a new group purchase round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenGroupRequest {
    pub product_id: i64,
    pub target_members: i64,
    pub deadline: DateTime<Utc>,
}

/// Request body for joining or leaving a group. The user id is the opaque, already-authenticated identifier
/// supplied by the identity provider upstream of this server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipRequest {
    pub group_id: i64,
    pub user_id: UserId,
}

/// Request body for the deposit and balance payment endpoints. Amounts are in agorot, as confirmed by the
/// payment gateway; this server never charges anyone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub group_id: i64,
    pub user_id: UserId,
    pub amount: Agorot,
}

/// Query parameters for the group listing endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupListParams {
    pub product_id: Option<i64>,
    pub status: Option<String>,
}

/// Optional body for the sweep trigger. `now` overrides the sweep instant, chiefly for operational replays.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepParams {
    pub now: Option<DateTime<Utc>>,
}
