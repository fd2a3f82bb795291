//! Expiration sweep behaviour: a group that misses its target by the deadline is expired, every member who paid
//! in is made whole, and re-running the sweep is a no-op.
mod support;

use std::{future::Future, pin::Pin};

use gbe_common::Agorot;
use group_buy_engine::{
    db_types::{EntryKind, GroupStatus, NewGroup, NewProduct, UserId},
    events::{EventHandlers, EventHooks, RefundIssuedEvent},
    GroupFlowApi, OrderState, SettlementDatabase, SettlementError, SqliteDatabase,
};
use log::*;
use tokio::runtime::Runtime;

#[test]
fn lapsed_group_is_expired_and_members_refunded() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async move {
        // Deadline already in the past, target never reached.
        let (api, group_id) = support::new_test_api(10, Agorot::from_shekels(100), support::an_hour_ago()).await;
        let users = (0..4).map(|i| UserId::from(format!("buyer-{i}"))).collect::<Vec<_>>();
        for user in &users {
            api.join_group(group_id, user).await.unwrap();
            api.confirm_deposit(user, group_id, Agorot::from_shekels(5)).await.unwrap();
        }

        let report = api.sweep(chrono::Utc::now()).await.expect("sweep should run");
        assert!(report.is_clean());
        assert_eq!(report.expired_groups, vec![group_id]);
        assert_eq!(report.refund_count(), 4);
        for refund in &report.refunds {
            assert_eq!(refund.kind, EntryKind::Refund);
            assert_eq!(refund.amount, Agorot::from_shekels(5));
        }

        let group = api.db().fetch_group(group_id).await.unwrap().unwrap();
        assert_eq!(group.status, GroupStatus::Expired);
        for user in &users {
            let orders = api.project_orders(user).await.unwrap();
            assert_eq!(orders[0].state, OrderState::Failed);
            assert_eq!(orders[0].total_paid, Agorot::from_shekels(5));
        }
        info!("🕰️ All {} members refunded after expiry", users.len());

        // Running the sweep again must find nothing left to do.
        let report = api.sweep(chrono::Utc::now()).await.unwrap();
        assert_eq!(report.processed_count(), 0);
        assert_eq!(report.refund_count(), 0);
    });
}

#[test]
fn members_without_payments_get_no_refund_entry() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async move {
        let (api, group_id) = support::new_test_api(10, Agorot::from_shekels(100), support::an_hour_ago()).await;
        let payer = UserId::from("payer");
        let lurker = UserId::from("lurker");
        api.join_group(group_id, &payer).await.unwrap();
        api.confirm_deposit(&payer, group_id, Agorot::from_shekels(5)).await.unwrap();
        api.join_group(group_id, &lurker).await.unwrap();

        let report = api.sweep(chrono::Utc::now()).await.unwrap();
        assert_eq!(report.refund_count(), 1);
        assert_eq!(report.refunds[0].user_id, payer);
        let entries = api.db().fetch_ledger(&lurker, group_id).await.unwrap();
        assert!(entries.is_empty());
    });
}

#[test]
fn expired_groups_refuse_new_joins_and_deposits() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async move {
        let (api, group_id) = support::new_test_api(10, Agorot::from_shekels(100), support::an_hour_ago()).await;
        let member = UserId::from("member");
        api.join_group(group_id, &member).await.unwrap();
        api.sweep(chrono::Utc::now()).await.unwrap();

        let err = api.join_group(group_id, &UserId::from("latecomer")).await.expect_err("group is closed");
        assert!(matches!(err, SettlementError::GroupClosed(_)), "got {err:?}");
        let err =
            api.confirm_deposit(&member, group_id, Agorot::from_shekels(1)).await.expect_err("deposit after expiry");
        assert!(matches!(err, SettlementError::GroupClosed(_)), "got {err:?}");
    });
}

#[test]
fn leaving_with_money_on_the_ledger_issues_a_refund() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async move {
        let (api, group_id) = support::new_test_api(10, Agorot::from_shekels(100), support::in_a_week()).await;
        let user = UserId::from("ivan");
        api.join_group(group_id, &user).await.unwrap();
        api.confirm_deposit(&user, group_id, Agorot::from_shekels(5)).await.unwrap();

        let refund = api.leave_group(group_id, &user).await.unwrap().expect("a paid-up leaver must be refunded");
        assert_eq!(refund.kind, EntryKind::Refund);
        assert_eq!(refund.amount, Agorot::from_shekels(5));
        let group = api.db().fetch_group(group_id).await.unwrap().unwrap();
        assert_eq!(group.current_members, 0);

        // A member who never paid leaves without a ledger entry.
        let other = UserId::from("judy");
        api.join_group(group_id, &other).await.unwrap();
        assert!(api.leave_group(group_id, &other).await.unwrap().is_none());
    });
}

#[test]
fn refund_events_reach_subscribers() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async move {
        let url = support::random_db_path();
        support::prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.unwrap();

        let (tx, mut rx) = tokio::sync::mpsc::channel::<RefundIssuedEvent>(10);
        let mut hooks = EventHooks::default();
        hooks.on_refund_issued(move |event| {
            let tx = tx.clone();
            Box::pin(async move {
                let _ = tx.send(event).await;
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        let handlers = EventHandlers::new(10, hooks);
        let producers = handlers.producers();
        handlers.start_handlers().await;
        let api = GroupFlowApi::new(db, producers);

        let product = api
            .register_product(NewProduct {
                name: "Stand mixer".to_string(),
                description: None,
                regular_price: Agorot::from_shekels(200),
                group_price: Agorot::from_shekels(100),
                image_url: None,
            })
            .await
            .unwrap();
        let group = api.db().create_group(NewGroup::new(product.id, 10, support::an_hour_ago())).await.unwrap();
        let user = UserId::from("kim");
        api.join_group(group.id, &user).await.unwrap();
        api.confirm_deposit(&user, group.id, Agorot::from_shekels(5)).await.unwrap();
        api.sweep(chrono::Utc::now()).await.unwrap();

        let event = rx.recv().await.expect("a refund event must have been published");
        assert_eq!(event.group_id, group.id);
        assert_eq!(event.refund.user_id, user);
        assert_eq!(event.refund.amount, Agorot::from_shekels(5));
    });
}
