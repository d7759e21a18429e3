use dotenvy::dotenv;
use milktech::{
    config::{self, database},
    core::{dashboard, dates, sample_data},
    errors::Result,
    store::DatabaseStore,
};
use std::env;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; variables may also be set externally
    dotenv().ok();

    // 3. Load the application configuration
    let app_config = config::load_app_configuration()?;

    // 4. Open the document store
    let database_url = database::get_database_url(app_config.database_url.as_deref());
    let db = database::create_connection(&database_url)
        .await
        .inspect_err(|e| error!("Failed to open database {}: {}", database_url, e))?;
    database::create_tables(&db).await?;
    info!("Document store ready at {}", database_url);
    let store = DatabaseStore::new(db);

    // 5. Seed demo data into an empty directory
    if app_config.seed_sample_data && sample_data::initialize_sample_data(&store).await? {
        info!("Sample data loaded.");
    }

    // 6. Report the producer dashboard when an owner is given
    if let Ok(owner_id) = env::var("MILKTECH_OWNER_ID") {
        let summary =
            dashboard::producer_summary(&store, &owner_id, dates::today(), &app_config.dashboard)
                .await?;
        info!(
            "{}: {} animals, {} recipes, {:.1} L this month ({:.2} gross), {} shift(s) missing today",
            owner_id,
            summary.total_animals,
            summary.total_recipes,
            summary.month.total,
            summary.month.gross_revenue,
            summary.missing_shifts_today
        );
        for entry in &summary.top_dairies {
            info!("  {} pays {:.2}/L", entry.dairy.trade_name, entry.price);
        }
    }

    Ok(())
}
