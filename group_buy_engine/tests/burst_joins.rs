//! Capacity invariant under concurrent joins: with a target of N members and more than N racing joiners, exactly
//! N memberships ever exist and the member counter never exceeds N.
mod support;

use gbe_common::Agorot;
use group_buy_engine::{db_types::UserId, SettlementDatabase, SettlementError};
use log::*;
use tokio::runtime::Runtime;

const TARGET_MEMBERS: i64 = 10;
const NUM_JOINERS: i64 = 25;

#[test]
fn burst_joins() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async move {
        let (api, group_id) =
            support::new_test_api(TARGET_MEMBERS, Agorot::from_shekels(100), support::in_a_week()).await;
        info!("🚀️ Racing {NUM_JOINERS} joiners for {TARGET_MEMBERS} slots on group #{group_id}");

        let mut handles = Vec::new();
        let api = std::sync::Arc::new(api);
        for i in 0..NUM_JOINERS {
            let api = api.clone();
            handles.push(tokio::spawn(async move {
                let user = UserId::from(format!("user-{i}"));
                api.join_group(group_id, &user).await
            }));
        }

        let mut successes = 0;
        let mut refusals = 0;
        for handle in handles {
            match handle.await.expect("join task panicked") {
                Ok(_) => successes += 1,
                Err(SettlementError::GroupFull(_)) | Err(SettlementError::GroupClosed(_)) => refusals += 1,
                Err(e) => panic!("Unexpected join error: {e}"),
            }
        }
        assert_eq!(successes, TARGET_MEMBERS);
        assert_eq!(refusals, NUM_JOINERS - TARGET_MEMBERS);

        let group = api.db().fetch_group(group_id).await.unwrap().expect("group must exist");
        assert_eq!(group.current_members, TARGET_MEMBERS);
        assert!(group.is_completed());
        let members = api.db().fetch_memberships_for_group(group_id).await.unwrap();
        assert_eq!(members.len() as i64, TARGET_MEMBERS);
        info!("🚀️ Burst join test complete");
    });
}
