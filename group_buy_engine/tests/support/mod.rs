use chrono::{DateTime, Duration, Utc};
use gbe_common::Agorot;
use group_buy_engine::{
    db_types::{NewGroup, NewProduct},
    events::EventProducers,
    GroupFlowApi, SettlementDatabase, SqliteDatabase,
};
use log::*;
use sqlx::{migrate, migrate::MigrateDatabase, Sqlite};

pub async fn prepare_test_env(url: &str) {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
    if let Err(e) = Sqlite::drop_database(url).await {
        warn!("Error dropping database {url}: {e:?}");
    }
    Sqlite::create_database(url).await.expect("Error creating database");
    let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error creating connection to database");
    migrate!("./migrations").run(db.pool()).await.expect("Error running DB migrations");
    info!("🚀️ Migrations complete");
}

pub fn random_db_path() -> String {
    format!("sqlite://{}/gbe_test_store_{}.db", std::env::temp_dir().display(), rand::random::<u64>())
}

/// Spins up a fresh database with one product and one open group, and returns the API over it.
pub async fn new_test_api(
    target_members: i64,
    group_price: Agorot,
    deadline: DateTime<Utc>,
) -> (GroupFlowApi<SqliteDatabase>, i64) {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 25).await.expect("Error creating database");
    let product = db
        .insert_product(NewProduct {
            name: "Espresso machine".to_string(),
            description: None,
            regular_price: group_price * 2,
            group_price,
            image_url: None,
        })
        .await
        .expect("Error seeding product");
    // Insert the group directly so tests can use past deadlines; `open_group` refuses those.
    let group = db
        .create_group(NewGroup::new(product.id, target_members, deadline))
        .await
        .expect("Error seeding group");
    (GroupFlowApi::new(db, EventProducers::default()), group.id)
}

pub fn in_a_week() -> DateTime<Utc> {
    Utc::now() + Duration::days(7)
}

pub fn an_hour_ago() -> DateTime<Utc> {
    Utc::now() - Duration::hours(1)
}
