//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
use std::str::FromStr;

use actix_web::{get, web, HttpResponse, Responder};
use chrono::Utc;
use group_buy_engine::{
    db_types::{GroupStatus, NewGroup, UserId},
    traits::GroupQueryFilter,
    GroupFlowApi,
    SettlementDatabase,
};
use log::*;

use crate::{
    data_objects::{GroupListParams, MembershipRequest, OpenGroupRequest, PaymentRequest, SweepParams},
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Groups  ----------------------------------------------------
route!(open_group => Post "/groups" impl SettlementDatabase);
/// Route handler for opening a new group purchase round.
///
/// This is an administrative endpoint; buyers never open groups themselves. The product must already exist and
/// the deadline must lie in the future.
pub async fn open_group<B: SettlementDatabase>(
    body: web::Json<OpenGroupRequest>,
    api: web::Data<GroupFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    debug!("💻️ POST open_group for product {}", req.product_id);
    let group = api.open_group(NewGroup::new(req.product_id, req.target_members, req.deadline)).await?;
    Ok(HttpResponse::Ok().json(group))
}

route!(list_groups => Get "/groups" impl SettlementDatabase);
/// Route handler for the group listing endpoint. Supports filtering by product id and by status.
pub async fn list_groups<B: SettlementDatabase>(
    params: web::Query<GroupListParams>,
    api: web::Data<GroupFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let params = params.into_inner();
    debug!("💻️ GET groups");
    let mut filter = GroupQueryFilter::default();
    if let Some(product_id) = params.product_id {
        filter = filter.with_product_id(product_id);
    }
    if let Some(status) = &params.status {
        let status = GroupStatus::from_str(status).map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?;
        filter = filter.with_status(status);
    }
    let groups = api.db().fetch_groups(filter).await?;
    Ok(HttpResponse::Ok().json(groups))
}

route!(group_by_id => Get "/groups/{id}" impl SettlementDatabase);
/// Route handler for fetching a single group by id.
pub async fn group_by_id<B: SettlementDatabase>(
    path: web::Path<i64>,
    api: web::Data<GroupFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let group_id = path.into_inner();
    debug!("💻️ GET group {group_id}");
    let group = api
        .db()
        .fetch_group(group_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Group {group_id} does not exist")))?;
    Ok(HttpResponse::Ok().json(group))
}

//----------------------------------------------   Membership  ----------------------------------------------------
route!(join_group => Post "/groups/join" impl SettlementDatabase);
/// Route handler for joining a group.
///
/// The capacity check is atomic in the engine, so two buyers racing for the last slot can never both get it;
/// the loser receives a 409 response. If this join completes the group, the completion event hooks fire before
/// the response is returned.
pub async fn join_group<B: SettlementDatabase>(
    body: web::Json<MembershipRequest>,
    api: web::Data<GroupFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    debug!("💻️ POST join_group {} for user {}", req.group_id, req.user_id);
    let membership = api.join_group(req.group_id, &req.user_id).await?;
    Ok(HttpResponse::Ok().json(membership))
}

route!(leave_group => Post "/groups/leave" impl SettlementDatabase);
/// Route handler for leaving a still-open group. Any money the buyer has paid in is refunded on the ledger, and
/// the refund entry (if any) is returned.
pub async fn leave_group<B: SettlementDatabase>(
    body: web::Json<MembershipRequest>,
    api: web::Data<GroupFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    debug!("💻️ POST leave_group {} for user {}", req.group_id, req.user_id);
    let refund = api.leave_group(req.group_id, &req.user_id).await?;
    Ok(HttpResponse::Ok().json(refund))
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(deposit => Post "/payments/deposit" impl SettlementDatabase);
/// Route handler for recording a confirmed deposit.
///
/// The payment gateway calls this after capturing the charge. A retried callback receives a 409 with a
/// distinct duplicate-deposit error, which gateways should treat as success.
pub async fn deposit<B: SettlementDatabase>(
    body: web::Json<PaymentRequest>,
    api: web::Data<GroupFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    debug!("💻️ POST deposit of {} for user {} in group {}", req.amount, req.user_id, req.group_id);
    let entry = api.confirm_deposit(&req.user_id, req.group_id, req.amount).await?;
    Ok(HttpResponse::Ok().json(entry))
}

route!(balance => Post "/payments/balance" impl SettlementDatabase);
/// Route handler for recording a confirmed balance payment. Partial payments accumulate; an amount exceeding
/// the remaining balance is rejected outright.
pub async fn balance<B: SettlementDatabase>(
    body: web::Json<PaymentRequest>,
    api: web::Data<GroupFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    debug!("💻️ POST balance payment of {} for user {} in group {}", req.amount, req.user_id, req.group_id);
    let entry = api.confirm_balance(&req.user_id, req.group_id, req.amount).await?;
    Ok(HttpResponse::Ok().json(entry))
}

//----------------------------------------------   Sweep  ----------------------------------------------------
route!(trigger_sweep => Post "/sweep" impl SettlementDatabase);
/// Route handler for triggering an expiration sweep on demand.
///
/// The background worker normally covers this, but a cron job (or an operator retrying after a partial
/// failure) can drive expiry through this endpoint instead. Re-running a sweep is always safe.
pub async fn trigger_sweep<B: SettlementDatabase>(
    body: Option<web::Json<SweepParams>>,
    api: web::Data<GroupFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let now = body.and_then(|b| b.into_inner().now).unwrap_or_else(Utc::now);
    info!("💻️ POST sweep as of {now}");
    let report = api.sweep(now).await?;
    Ok(HttpResponse::Ok().json(report))
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(orders_for_user => Get "/orders/{user_id}" impl SettlementDatabase);
/// Route handler for a buyer's order projections, one per group membership, classified for display.
pub async fn orders_for_user<B: SettlementDatabase>(
    path: web::Path<UserId>,
    api: web::Data<GroupFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let user_id = path.into_inner();
    debug!("💻️ GET orders for user {user_id}");
    let orders = api.project_orders(&user_id).await?;
    Ok(HttpResponse::Ok().json(orders))
}
