//! Fixed document keys.
//!
//! The key strings match the document names used by earlier browser-profile
//! exports, so a dump of those documents can be loaded as-is.

/// Registered accounts
pub const USERS: &str = "milk_users";
/// Session of the logged-in user
pub const CURRENT_USER: &str = "milk_current_user";
/// Official dairy profiles
pub const OFFICIAL_DAIRIES: &str = "milk_dairies";
/// Price history of every official dairy
pub const OFFICIAL_PRICES: &str = "milk_prices";
/// Collection tanks
pub const TANKS: &str = "milk_tanks";
/// Feed recipes
pub const FEED_RECIPES: &str = "milk_feed_recipes";
/// Ingredient lines of every recipe
pub const FEED_RECIPE_ITEMS: &str = "milk_feed_recipe_items";

/// Animals of every producer
pub const ANIMALS: &str = "milktech:animals";
/// Vaccination records
pub const VACCINES: &str = "milktech:animal_vaccines";
/// Herd movements
pub const MOVEMENTS: &str = "milktech:animal_movements";
/// Reproduction events
pub const REPRODUCTION: &str = "milktech:animal_repro";
/// Producers' personal dairies
pub const PERSONAL_DAIRIES: &str = "milktech:my_dairies";
/// Production ledger
pub const PRODUCTION: &str = "milktech:milk_production";

const PERSONAL_PRICES_PREFIX: &str = "milktech:my_dairy_prices:";

/// Key of the price history document of one personal dairy.
#[must_use]
pub fn personal_prices(dairy_id: &str) -> String {
    format!("{PERSONAL_PRICES_PREFIX}{dairy_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_personal_prices_key() {
        assert_eq!(personal_prices("42"), "milktech:my_dairy_prices:42");
    }
}
