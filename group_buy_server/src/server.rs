use std::{future::Future, pin::Pin, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use group_buy_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    GroupFlowApi,
    SqliteDatabase,
};
use log::*;

use crate::{
    config::ServerConfig,
    errors::ServerError,
    routes::{
        health,
        BalanceRoute,
        DepositRoute,
        GroupByIdRoute,
        JoinGroupRoute,
        LeaveGroupRoute,
        ListGroupsRoute,
        OpenGroupRoute,
        OrdersForUserRoute,
        TriggerSweepRoute,
    },
    sweep_worker::start_sweep_worker,
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = EventHandlers::new(25, notification_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    if config.enable_sweep_worker {
        start_sweep_worker(db.clone(), producers.clone(), config.sweep_interval);
    } else {
        info!("🕰️ The background sweep worker is disabled. Expiry must be driven through POST /sweep.");
    }
    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let srv = HttpServer::new(move || {
        let api = GroupFlowApi::new(db.clone(), producers.clone());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("gbs::access_log"))
            .app_data(web::Data::new(api))
            .service(health)
            .service(OpenGroupRoute::<SqliteDatabase>::new())
            .service(ListGroupsRoute::<SqliteDatabase>::new())
            .service(GroupByIdRoute::<SqliteDatabase>::new())
            .service(JoinGroupRoute::<SqliteDatabase>::new())
            .service(LeaveGroupRoute::<SqliteDatabase>::new())
            .service(DepositRoute::<SqliteDatabase>::new())
            .service(BalanceRoute::<SqliteDatabase>::new())
            .service(TriggerSweepRoute::<SqliteDatabase>::new())
            .service(OrdersForUserRoute::<SqliteDatabase>::new())
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// The server's built-in event subscribers. These stand in for the notification dispatcher: completion and
/// refund events are logged here, and the mail/push integration attaches its own hooks in the same way.
fn notification_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks.on_group_completed(|ev| {
        Box::pin(async move {
            info!(
                "📬️ Group #{} is complete with {} members. Balance payment notices are due.",
                ev.group.id, ev.group.current_members
            );
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    hooks.on_refund_issued(|ev| {
        Box::pin(async move {
            info!("📬️ Refund of {} queued for user {} (group #{}).", ev.refund.amount, ev.refund.user_id, ev.group_id);
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    hooks
}
