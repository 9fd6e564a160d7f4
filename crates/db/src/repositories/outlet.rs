use async_trait::async_trait;
use sqlx::Row;

use kopi_core::domain::outlet::Outlet;

use crate::DbPool;

use super::{OutletRepository, RepositoryError};

pub struct SqlOutletRepository {
    pool: DbPool,
}

impl SqlOutletRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OutletRepository for SqlOutletRepository {
    /// LIKE filtering over name, city and state with `%` stripped from the
    /// caller-supplied query.
    async fn search(&self, query: &str, limit: u32) -> Result<Vec<Outlet>, RepositoryError> {
        let pattern = format!("%{}%", query.to_lowercase().replace('%', ""));

        let rows = sqlx::query(
            "SELECT name, city, state, opening_hours, services
             FROM outlets
             WHERE LOWER(name) LIKE ?
                OR LOWER(city) LIKE ?
                OR LOWER(state) LIKE ?
             ORDER BY name ASC
             LIMIT ?",
        )
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| Outlet {
                name: row.get("name"),
                city: row.get("city"),
                state: row.get("state"),
                opening_hours: row.get("opening_hours"),
                services: row.get("services"),
            })
            .collect())
    }

    async fn insert(&self, outlet: &Outlet) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO outlets (name, city, state, opening_hours, services)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(name) DO UPDATE SET
                 city = excluded.city,
                 state = excluded.state,
                 opening_hours = excluded.opening_hours,
                 services = excluded.services",
        )
        .bind(&outlet.name)
        .bind(&outlet.city)
        .bind(&outlet.state)
        .bind(&outlet.opening_hours)
        .bind(&outlet.services)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn count(&self) -> Result<i64, RepositoryError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM outlets").fetch_one(&self.pool).await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use kopi_core::domain::outlet::Outlet;

    use crate::migrations::run_pending;
    use crate::repositories::{OutletRepository, SqlOutletRepository};
    use crate::{connect_with_settings, DbPool};

    async fn repo(db_name: &str) -> (SqlOutletRepository, DbPool) {
        let url = format!("sqlite:file:{db_name}?mode=memory&cache=shared");
        let pool = connect_with_settings(&url, 2, 5).await.expect("pool should connect");
        run_pending(&pool).await.expect("migrations should apply");
        (SqlOutletRepository::new(pool.clone()), pool)
    }

    fn outlet(name: &str, city: &str, state: &str) -> Outlet {
        Outlet {
            name: name.to_string(),
            city: city.to_string(),
            state: state.to_string(),
            opening_hours: Some("9:00AM - 10:00PM".to_string()),
            services: Some("Dine-in, Takeaway".to_string()),
        }
    }

    #[tokio::test]
    async fn search_matches_city_case_insensitively() {
        let (repo, pool) = repo("outlets_city").await;
        repo.insert(&outlet("Kopi SS 2", "Petaling Jaya", "Selangor")).await.expect("insert");
        repo.insert(&outlet("Kopi Bangsar", "Kuala Lumpur", "WP KL")).await.expect("insert");

        let results = repo.search("PETALING", 5).await.expect("search");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "Kopi SS 2");

        pool.close().await;
    }

    #[tokio::test]
    async fn search_orders_by_name_and_respects_limit() {
        let (repo, pool) = repo("outlets_order").await;
        repo.insert(&outlet("Kopi Uptown", "Damansara", "Selangor")).await.expect("insert");
        repo.insert(&outlet("Kopi Atria", "Damansara", "Selangor")).await.expect("insert");
        repo.insert(&outlet("Kopi Jaya", "Damansara", "Selangor")).await.expect("insert");

        let results = repo.search("damansara", 2).await.expect("search");
        let names: Vec<&str> = results.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["Kopi Atria", "Kopi Jaya"]);

        pool.close().await;
    }

    #[tokio::test]
    async fn sql_injection_attempt_matches_nothing() {
        let (repo, pool) = repo("outlets_injection").await;
        repo.insert(&outlet("Kopi Sentral", "Kuala Lumpur", "WP KL")).await.expect("insert");

        let results = repo.search("'; DROP TABLE outlets;", 5).await.expect("search");
        assert!(results.is_empty());
        assert_eq!(repo.count().await.expect("count"), 1);

        pool.close().await;
    }

    #[tokio::test]
    async fn insert_upserts_on_name_conflict() {
        let (repo, pool) = repo("outlets_upsert").await;
        repo.insert(&outlet("Kopi Sentral", "Kuala Lumpur", "WP KL")).await.expect("insert");

        let mut updated = outlet("Kopi Sentral", "Kuala Lumpur", "WP KL");
        updated.opening_hours = Some("8:00AM - 11:00PM".to_string());
        repo.insert(&updated).await.expect("upsert");

        assert_eq!(repo.count().await.expect("count"), 1);
        let results = repo.search("sentral", 5).await.expect("search");
        assert_eq!(results[0].opening_hours.as_deref(), Some("8:00AM - 11:00PM"));

        pool.close().await;
    }
}
