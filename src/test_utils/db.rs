// SPDX-License-Identifier: AGPL-3.0-or-later

use sqlx::migrate::MigrateDatabase;
use sqlx::Any;

use crate::db::{connection_pool, create_database, run_pending_migrations, Pool};
use crate::test_utils::TEST_CONFIG;

/// Create test database.
pub async fn initialize_db() -> Pool {
    // Reset database first
    drop_database().await;
    create_database(&TEST_CONFIG.database_url).await.unwrap();

    // Create connection pool and run all migrations
    let pool = connection_pool(&TEST_CONFIG.database_url, 25).await.unwrap();
    if let Err(err) = run_pending_migrations(&pool).await {
        pool.close().await;
        panic!("Could not run pending migrations: {}", err);
    }

    pool
}

// Delete test database
pub async fn drop_database() {
    if Any::database_exists(&TEST_CONFIG.database_url)
        .await
        .unwrap()
    {
        Any::drop_database(&TEST_CONFIG.database_url).await.unwrap();
    }
}

#[cfg(test)]
mod tests {
    use sqlx::query;

    use super::initialize_db;

    #[tokio::test]
    async fn pooled_connections_see_the_same_database() {
        let pool = initialize_db().await;

        // Hold two connections at once so the second query cannot reuse the
        // first connection.
        let mut first = pool.acquire().await.unwrap();
        let mut second = pool.acquire().await.unwrap();

        query("SELECT COUNT(id) FROM users")
            .fetch_one(&mut *first)
            .await
            .unwrap();
        query("SELECT COUNT(id) FROM users")
            .fetch_one(&mut *second)
            .await
            .unwrap();

        drop(first);
        drop(second);
        pool.close().await;
    }
}
