use sqlx::SqliteConnection;

use crate::{
    db_types::{NewProduct, Product},
    traits::SettlementError,
};

pub async fn insert_product(product: NewProduct, conn: &mut SqliteConnection) -> Result<Product, SettlementError> {
    let id = sqlx::query(
        r#"
            INSERT INTO products (name, description, regular_price, group_price, image_url)
            VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(&product.name)
    .bind(&product.description)
    .bind(product.regular_price)
    .bind(product.group_price)
    .bind(&product.image_url)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();
    fetch_product(id, conn).await?.ok_or_else(|| {
        SettlementError::DatabaseError(format!("Product {id} was not found straight after inserting it"))
    })
}

pub async fn fetch_product(product_id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, SettlementError> {
    let product = sqlx::query_as::<_, Product>(
        r#"
            SELECT id, name, description, regular_price, group_price, image_url, created_at
            FROM products
            WHERE id = $1
        "#,
    )
    .bind(product_id)
    .fetch_optional(conn)
    .await?;
    Ok(product)
}
