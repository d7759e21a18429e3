//! Dashboard summaries for producers and dairies.

use crate::{
    config::DashboardConfig,
    core::{
        animal, dairy,
        dairy::{DairyPriceSummary, OfficialDairy},
        dates::{self, DateDisplay},
        feed,
        pricing::{self, PriceRecord},
        production::{self, DateRange, ProductionTotals},
        vaccine::{self, UpcomingVaccine},
    },
    errors::Result,
    store::KeyValueStore,
};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::debug;

/// One point of the monthly production chart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SparkPoint {
    /// Calendar day
    pub date: String,
    /// `dd/mm`
    pub label: String,
    /// Liters produced that day
    pub total: f64,
}

/// Everything the producer home screen shows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProducerSummary {
    /// Animals registered by the producer
    pub total_animals: usize,
    /// Feed recipes of the producer
    pub total_recipes: usize,
    /// Totals for the month containing `today`
    pub month: ProductionTotals,
    /// Daily totals of the month, oldest first
    pub sparkline: Vec<SparkPoint>,
    /// Best-paying dairies by current price
    pub top_dairies: Vec<DairyPriceSummary>,
    /// Next doses due after today
    pub upcoming_vaccines: Vec<UpcomingVaccine>,
    /// Shifts of today still to record, for the notification badge
    pub missing_shifts_today: usize,
}

/// Home screen of a dairy-role user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DairySummary {
    /// Profile of the dairy, `None` before it is filled in
    pub dairy: Option<OfficialDairy>,
    /// Latest published price
    pub current_price: Option<PriceRecord>,
    /// Collection tanks registered by the dairy
    pub tank_count: usize,
}

/// Builds the producer dashboard for `today`.
pub async fn producer_summary<S>(
    store: &S,
    owner_id: &str,
    today: NaiveDate,
    limits: &DashboardConfig,
) -> Result<ProducerSummary>
where
    S: KeyValueStore + ?Sized,
{
    let total_animals = animal::list(store, owner_id).await?.len();
    let total_recipes = feed::list_recipes(store, owner_id).await?.len();

    let range = DateRange::month(today.year(), today.month()).unwrap_or_default();
    let days = production::aggregate_by_day(store, owner_id, &range).await?;
    let month = ProductionTotals::from_days(&days);
    let sparkline = days
        .iter()
        .map(|day| SparkPoint {
            label: dates::format_date(&day.date, DateDisplay::DayMonth),
            date: day.date.clone(),
            total: day.total_liters,
        })
        .collect();

    let mut top_dairies = dairy::prices_overview(store).await?;
    top_dairies.truncate(limits.top_dairies);

    let upcoming_vaccines =
        vaccine::upcoming_for_owner(store, owner_id, today, limits.upcoming_vaccines).await?;
    let missing_shifts_today = production::missing_shifts_today(store, owner_id, today).await?;

    debug!(
        "Dashboard for {}: {} animals, {} L this month",
        owner_id, total_animals, month.total
    );

    Ok(ProducerSummary {
        total_animals,
        total_recipes,
        month,
        sparkline,
        top_dairies,
        upcoming_vaccines,
        missing_shifts_today,
    })
}

/// Builds the dashboard of a dairy-role user.
pub async fn dairy_summary<S>(store: &S, user_id: &str) -> Result<DairySummary>
where
    S: KeyValueStore + ?Sized,
{
    let Some(profile) = dairy::get_official_by_user(store, user_id).await? else {
        return Ok(DairySummary {
            dairy: None,
            current_price: None,
            tank_count: 0,
        });
    };

    Ok(DairySummary {
        current_price: pricing::latest_official_price(store, &profile.id).await?,
        tank_count: dairy::list_tanks_by_dairy(store, &profile.id).await?.len(),
        dairy: Some(profile),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::{
        config::PricingConfig,
        core::{
            dairy::{OfficialDairyInput, TankInput},
            production::Shift,
            vaccine::VaccineInput,
        },
        store::MemoryStore,
        test_utils::{animal_input, production_input},
    };

    const OWNER: &str = "owner-1";

    #[tokio::test]
    async fn test_producer_summary() -> Result<()> {
        let store = MemoryStore::new();
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let limits = DashboardConfig {
            top_dairies: 1,
            upcoming_vaccines: 5,
        };

        let cow = animal::create(&store, OWNER, animal_input("Mimosa", "A1")).await?;
        vaccine::add(
            &store,
            &cow.id,
            VaccineInput {
                name: "Aftosa".to_string(),
                next_due_at: Some("2024-05-20".to_string()),
                ..Default::default()
            },
        )
        .await?;
        feed::save_recipe(&store, OWNER, None, "Básica").await?;

        for (user, name, price) in [("u1", "Low", 2.0), ("u2", "High", 2.5)] {
            let profile = dairy::save_official(
                &store,
                user,
                OfficialDairyInput {
                    trade_name: name.to_string(),
                    ..Default::default()
                },
            )
            .await?;
            pricing::add_official_price(&store, &profile.id, price, &PricingConfig::default()).await?;
        }

        let mut morning = production_input("2024-05-02", Shift::Morning, 10.0);
        morning.unit_price_at_sale = Some(2.0);
        production::upsert(&store, OWNER, morning).await?;
        production::upsert(&store, OWNER, production_input("2024-05-10", Shift::Morning, 5.0)).await?;
        production::upsert(&store, OWNER, production_input("2024-04-30", Shift::Morning, 99.0)).await?;

        let summary = producer_summary(&store, OWNER, today, &limits).await?;
        assert_eq!(summary.total_animals, 1);
        assert_eq!(summary.total_recipes, 1);
        assert_eq!(summary.month.total, 15.0);
        assert_eq!(summary.month.gross_revenue, 20.0);
        assert_eq!(summary.sparkline.len(), 2);
        assert_eq!(summary.sparkline[0].label, "02/05");
        assert_eq!(summary.top_dairies.len(), 1);
        assert_eq!(summary.top_dairies[0].dairy.trade_name, "High");
        assert_eq!(summary.upcoming_vaccines.len(), 1);
        assert_eq!(summary.missing_shifts_today, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_dairy_summary() -> Result<()> {
        let store = MemoryStore::new();

        let empty = dairy_summary(&store, "u1").await?;
        assert!(empty.dairy.is_none());

        let profile = dairy::save_official(
            &store,
            "u1",
            OfficialDairyInput {
                trade_name: "Vale".to_string(),
                ..Default::default()
            },
        )
        .await?;
        dairy::save_tank(
            &store,
            &profile.id,
            None,
            TankInput {
                name: "T1".to_string(),
                ..Default::default()
            },
        )
        .await?;
        pricing::add_official_price(&store, &profile.id, 2.3, &PricingConfig::default()).await?;

        let summary = dairy_summary(&store, "u1").await?;
        assert_eq!(summary.tank_count, 1);
        assert_eq!(summary.current_price.unwrap().price_per_liter, 2.3);
        Ok(())
    }
}
