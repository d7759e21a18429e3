//! Demo directory data for a fresh store.
//!
//! Seeds two official dairies with a current price, three collection tanks and
//! two feed recipes for the demo producer. Nothing is written once any
//! official dairy exists.

use crate::{
    core::{
        dairy::{OfficialDairy, Tank},
        feed::{FeedRecipe, ProportionType, RecipeIngredient},
        pricing::PriceRecord,
    },
    errors::Result,
    store::{KeyValueStore, keys, read_list, write_json},
};
use chrono::{SecondsFormat, Utc};
use tracing::info;

/// Owner of the demo feed recipes
pub const DEMO_PRODUCER_ID: &str = "producer1";

struct DemoDairy {
    id: &'static str,
    user_id: &'static str,
    trade_name: &'static str,
    cnpj: &'static str,
    phone: &'static str,
    address: &'static str,
    city: &'static str,
    state: &'static str,
    lat: f64,
    lng: f64,
    price: f64,
}

const DAIRIES: [DemoDairy; 2] = [
    DemoDairy {
        id: "demo_d1",
        user_id: "dairy1",
        trade_name: "Laticínios Vale Verde",
        cnpj: "12.345.678/0001-90",
        phone: "(11) 98765-4321",
        address: "Rua das Flores, 123",
        city: "São Paulo",
        state: "SP",
        lat: -23.5505,
        lng: -46.6333,
        price: 2.15,
    },
    DemoDairy {
        id: "demo_d2",
        user_id: "dairy2",
        trade_name: "Queijaria Montanha",
        cnpj: "98.765.432/0001-10",
        phone: "(31) 99876-5432",
        address: "Estrada Rural, 456",
        city: "Belo Horizonte",
        state: "MG",
        lat: -19.9167,
        lng: -43.9345,
        price: 2.25,
    },
];

// (id, dairy, name, address, city, state, lat, lng, responsible, phone)
type DemoTank = (
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    f64,
    f64,
    &'static str,
    &'static str,
);

const TANKS: [DemoTank; 3] = [
    (
        "demo_t1", "demo_d1", "Tanque Central SP", "Rua Principal, 789", "São Paulo", "SP",
        -23.5505, -46.6333, "João Silva", "(11) 91234-5678",
    ),
    (
        "demo_t2", "demo_d1", "Tanque Zona Norte", "Av. Norte, 321", "São Paulo", "SP",
        -23.5205, -46.6133, "Maria Santos", "(11) 92345-6789",
    ),
    (
        "demo_t3", "demo_d2", "Tanque MG Central", "Rua Central, 654", "Belo Horizonte", "MG",
        -19.9167, -43.9345, "Pedro Costa", "(31) 93456-7890",
    ),
];

const RECIPES: [(&str, &str, [(&str, f64); 3]); 2] = [
    (
        "demo_r1",
        "Ração Básica Gado Leiteiro",
        [("Milho", 75.0), ("Farelo de Soja", 20.0), ("Sal Mineral", 5.0)],
    ),
    (
        "demo_r2",
        "Ração Premium Lactação",
        [("Milho", 70.0), ("Farelo de Soja", 25.0), ("Sal Mineral", 5.0)],
    ),
];

/// Writes the demo data when the directory is empty. Returns whether anything
/// was seeded.
pub async fn initialize_sample_data<S>(store: &S) -> Result<bool>
where
    S: KeyValueStore + ?Sized,
{
    let existing: Vec<OfficialDairy> = read_list(store, keys::OFFICIAL_DAIRIES).await?;
    if !existing.is_empty() {
        return Ok(false);
    }

    let now = Utc::now();
    let stamp = now.to_rfc3339_opts(SecondsFormat::Millis, true);

    let dairies: Vec<OfficialDairy> = DAIRIES
        .iter()
        .map(|d| OfficialDairy {
            id: d.id.to_string(),
            user_id: d.user_id.to_string(),
            trade_name: d.trade_name.to_string(),
            cnpj: d.cnpj.to_string(),
            phone: d.phone.to_string(),
            address: d.address.to_string(),
            city: d.city.to_string(),
            state: d.state.to_string(),
            lat: Some(d.lat),
            lng: Some(d.lng),
            created_at: now,
        })
        .collect();

    let prices: Vec<PriceRecord> = DAIRIES
        .iter()
        .enumerate()
        .map(|(i, d)| PriceRecord {
            id: format!("demo_p{}", i + 1),
            dairy_id: d.id.to_string(),
            price_per_liter: d.price,
            effective_at: stamp.clone(),
            created_at: now,
            updated_at: now,
        })
        .collect();

    let tanks: Vec<Tank> = TANKS
        .iter()
        .map(
            |&(id, dairy_id, name, address, city, state, lat, lng, responsible, phone)| Tank {
                id: id.to_string(),
                dairy_id: dairy_id.to_string(),
                name: name.to_string(),
                address: address.to_string(),
                city: city.to_string(),
                state: state.to_string(),
                lat: Some(lat),
                lng: Some(lng),
                responsible_name: responsible.to_string(),
                responsible_phone: phone.to_string(),
                created_at: now,
            },
        )
        .collect();

    let recipes: Vec<FeedRecipe> = RECIPES
        .iter()
        .map(|(id, name, _)| FeedRecipe {
            id: (*id).to_string(),
            owner_id: DEMO_PRODUCER_ID.to_string(),
            name: (*name).to_string(),
            created_at: now,
        })
        .collect();

    let items: Vec<RecipeIngredient> = RECIPES
        .iter()
        .flat_map(|(recipe_id, _, shares)| shares.iter().map(move |share| (*recipe_id, *share)))
        .enumerate()
        .map(|(i, (recipe_id, (name, value)))| RecipeIngredient {
            id: format!("demo_ri{}", i + 1),
            recipe_id: recipe_id.to_string(),
            ingredient_name: name.to_string(),
            proportion_type: ProportionType::Percent,
            proportion_value: value,
        })
        .collect();

    write_json(store, keys::OFFICIAL_DAIRIES, &dairies).await?;
    write_json(store, keys::OFFICIAL_PRICES, &prices).await?;
    write_json(store, keys::TANKS, &tanks).await?;
    write_json(store, keys::FEED_RECIPES, &recipes).await?;
    write_json(store, keys::FEED_RECIPE_ITEMS, &items).await?;

    info!(
        "Seeded sample data: {} dairies, {} tanks, {} recipes",
        dairies.len(),
        tanks.len(),
        recipes.len()
    );
    Ok(true)
}
