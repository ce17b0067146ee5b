//! Database seeders for demo data
//!
//! Inserts a small catalog of baths and masters so a fresh install has
//! something bookable. Rows are matched by name, so reruns are no-ops.

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::info;

/// Seed demo baths and masters
pub async fn seed_demo_catalog(pool: &SqlitePool) -> Result<()> {
    info!("Seeding demo catalog...");

    let now = super::timestamp(chrono::Utc::now());

    // Format: (name, address, price_per_hour)
    let baths: Vec<(&str, &str, i64)> = vec![
        ("Cedar Banya", "12 Lesnaya St", 2500),
        ("Black Sauna", "3 Riverside Ln", 1800),
        ("Hammam on Sadovaya", "41 Sadovaya St", 3200),
    ];

    // Format: (name, specialization, price_per_hour)
    let masters: Vec<(&str, &str, i64)> = vec![
        ("Ivan Petrov", "Parenie with birch venik", 2000),
        ("Anna Smirnova", "Scrub and aromatherapy", 1500),
    ];

    let mut inserted = 0u64;

    for (name, address, price) in baths {
        let result = sqlx::query(
            r#"
            INSERT INTO baths (name, address, price_per_hour, created_at)
            SELECT ?, ?, ?, ?
            WHERE NOT EXISTS (SELECT 1 FROM baths WHERE name = ?)
            "#,
        )
        .bind(name)
        .bind(address)
        .bind(price)
        .bind(&now)
        .bind(name)
        .execute(pool)
        .await?;
        inserted += result.rows_affected();
    }

    for (name, specialization, price) in masters {
        let result = sqlx::query(
            r#"
            INSERT INTO masters (name, specialization, price_per_hour, created_at)
            SELECT ?, ?, ?, ?
            WHERE NOT EXISTS (SELECT 1 FROM masters WHERE name = ?)
            "#,
        )
        .bind(name)
        .bind(specialization)
        .bind(price)
        .bind(&now)
        .bind(name)
        .execute(pool)
        .await?;
        inserted += result.rows_affected();
    }

    info!("Demo catalog seeded ({} new rows)", inserted);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let pool = crate::db::init_memory().await.unwrap();
        seed_demo_catalog(&pool).await.unwrap();
        seed_demo_catalog(&pool).await.unwrap();

        let baths: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM baths")
            .fetch_one(&pool)
            .await
            .unwrap();
        let masters: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM masters")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(baths, 3);
        assert_eq!(masters, 2);
    }
}
