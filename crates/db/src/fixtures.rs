use kopi_core::domain::outlet::Outlet;

use crate::repositories::{OutletRepository, RepositoryError};

/// Bundled outlet directory seeded at bootstrap when the table is empty.
/// Mirrors the deployment model where seed data ships with the image and a
/// later sync job replaces it.
const SEED_OUTLETS: &[SeedOutlet] = &[
    SeedOutlet {
        name: "Kopi Coffee SS 2",
        city: "Petaling Jaya",
        state: "Selangor",
        opening_hours: "7:30AM - 9:30PM",
        services: "Dine-in, Takeaway, Delivery",
    },
    SeedOutlet {
        name: "Kopi Coffee Uptown Damansara",
        city: "Damansara",
        state: "Selangor",
        opening_hours: "8:00AM - 10:00PM",
        services: "Dine-in, Takeaway, Drive-thru",
    },
    SeedOutlet {
        name: "Kopi Coffee Damansara Heights",
        city: "Damansara",
        state: "Kuala Lumpur",
        opening_hours: "7:00AM - 9:00PM",
        services: "Dine-in, Takeaway",
    },
    SeedOutlet {
        name: "Kopi Coffee KL Sentral",
        city: "Kuala Lumpur",
        state: "WP Kuala Lumpur",
        opening_hours: "6:30AM - 10:00PM",
        services: "Takeaway, Delivery",
    },
    SeedOutlet {
        name: "Kopi Coffee Pavilion KL",
        city: "Kuala Lumpur",
        state: "WP Kuala Lumpur",
        opening_hours: "10:00AM - 10:00PM",
        services: "Dine-in, Takeaway",
    },
    SeedOutlet {
        name: "Kopi Coffee Paradigm Mall",
        city: "Petaling Jaya",
        state: "Selangor",
        opening_hours: "10:00AM - 10:00PM",
        services: "Dine-in, Takeaway, Delivery",
    },
];

struct SeedOutlet {
    name: &'static str,
    city: &'static str,
    state: &'static str,
    opening_hours: &'static str,
    services: &'static str,
}

impl SeedOutlet {
    fn to_outlet(&self) -> Outlet {
        Outlet {
            name: self.name.to_string(),
            city: self.city.to_string(),
            state: self.state.to_string(),
            opening_hours: Some(self.opening_hours.to_string()),
            services: Some(self.services.to_string()),
        }
    }
}

/// Seed the outlet table when empty. Returns the number of rows inserted;
/// zero means the table already held data and was left untouched.
pub async fn seed_outlets_if_empty(
    repository: &dyn OutletRepository,
) -> Result<u32, RepositoryError> {
    if repository.count().await? > 0 {
        return Ok(0);
    }

    let mut inserted = 0;
    for seed in SEED_OUTLETS {
        repository.insert(&seed.to_outlet()).await?;
        inserted += 1;
    }
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use crate::migrations::run_pending;
    use crate::repositories::{OutletRepository, SqlOutletRepository};
    use crate::{connect_with_settings, DbPool};

    use super::seed_outlets_if_empty;

    async fn repo(db_name: &str) -> (SqlOutletRepository, DbPool) {
        let url = format!("sqlite:file:{db_name}?mode=memory&cache=shared");
        let pool = connect_with_settings(&url, 2, 5).await.expect("pool should connect");
        run_pending(&pool).await.expect("migrations should apply");
        (SqlOutletRepository::new(pool.clone()), pool)
    }

    #[tokio::test]
    async fn seeds_once_and_only_when_empty() {
        let (repo, pool) = repo("fixtures_seed").await;

        let first = seed_outlets_if_empty(&repo).await.expect("first seed");
        assert!(first > 0);

        let second = seed_outlets_if_empty(&repo).await.expect("second seed");
        assert_eq!(second, 0);
        assert_eq!(repo.count().await.expect("count"), i64::from(first));

        pool.close().await;
    }

    #[tokio::test]
    async fn seeded_outlets_are_searchable_by_canonical_locations() {
        let (repo, pool) = repo("fixtures_search").await;
        seed_outlets_if_empty(&repo).await.expect("seed");

        for location in ["Damansara", "Petaling Jaya", "Kuala Lumpur"] {
            let results = repo.search(location, 5).await.expect("search");
            assert!(!results.is_empty(), "no seeded outlet matches {location}");
        }

        pool.close().await;
    }
}
