//! Cascading shipping destination and freight cost.
//!
//! The visitor narrows the destination province → city → district, and picks
//! a courier. Changing a level throws away everything below it, including
//! the last quoted cost. Once a district and courier are known and the cart
//! has a checked item, the backend is asked for a quote.
//!
//! Responses are applied in arrival order. A slow response for a province
//! the visitor has already moved away from can still overwrite the lists.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use thriftshop_core::{Courier, LocationId, Price};

use crate::backend::{BackendError, Location, ShippingQuote};
use crate::models::session_keys;

/// Notice shown when the backend has no rate for the destination.
pub const COURIER_UNAVAILABLE: &str = "This courier is not available for the selected region.";

/// Notice shown when the quote request itself failed.
pub const QUOTE_FAILED: &str = "Could not calculate the shipping cost. Please try again.";

/// The visitor's shipping selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingSelection {
    pub provinces: Vec<Location>,
    pub cities: Vec<Location>,
    pub districts: Vec<Location>,
    pub province: Option<LocationId>,
    pub city: Option<LocationId>,
    pub district: Option<LocationId>,
    #[serde(default)]
    pub courier: Courier,
    #[serde(default)]
    pub cost: Price,
    /// Why the last quote produced no cost.
    #[serde(default)]
    pub notice: Option<String>,
}

fn name_of(list: &[Location], id: Option<LocationId>) -> Option<&str> {
    let id = id?;
    list.iter()
        .find(|l| l.id == id)
        .map(|l| l.name.as_str())
}

impl ShippingSelection {
    /// Read the selection from the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn load(session: &Session) -> Result<Self, tower_sessions::session::Error> {
        Ok(session
            .get::<Self>(session_keys::SHIPPING)
            .await?
            .unwrap_or_default())
    }

    /// Write the selection to the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn save(&self, session: &Session) -> Result<(), tower_sessions::session::Error> {
        session.insert(session_keys::SHIPPING, self).await
    }

    pub fn set_provinces(&mut self, provinces: Vec<Location>) {
        self.provinces = provinces;
    }

    pub fn set_cities(&mut self, cities: Vec<Location>) {
        self.cities = cities;
    }

    pub fn set_districts(&mut self, districts: Vec<Location>) {
        self.districts = districts;
    }

    /// Choose a province. Clears city, district, their options and the cost.
    pub fn select_province(&mut self, province: Option<LocationId>) {
        self.province = province;
        self.city = None;
        self.district = None;
        self.cities.clear();
        self.districts.clear();
        self.reset_cost();
    }

    /// Choose a city. Clears district, district options and the cost.
    pub fn select_city(&mut self, city: Option<LocationId>) {
        self.city = city;
        self.district = None;
        self.districts.clear();
        self.reset_cost();
    }

    /// Choose a district. The cost stays stale until the next quote.
    pub fn select_district(&mut self, district: Option<LocationId>) {
        self.district = district;
        if district.is_none() {
            self.reset_cost();
        }
    }

    pub const fn select_courier(&mut self, courier: Courier) {
        self.courier = courier;
    }

    /// Forget the cost and any notice.
    pub fn reset_cost(&mut self) {
        self.cost = Price::ZERO;
        self.notice = None;
    }

    /// Destination to quote for, once a district is chosen.
    #[must_use]
    pub const fn quote_destination(&self) -> Option<LocationId> {
        self.district
    }

    /// Record the outcome of a quote request.
    ///
    /// Anything but a successful quote leaves the cost at zero with a
    /// notice; the selection itself stays editable.
    pub fn apply_quote(&mut self, result: Result<ShippingQuote, BackendError>) {
        match result {
            Ok(quote) if quote.success => {
                self.cost = quote.cost;
                self.notice = None;
            }
            Ok(_) => {
                self.cost = Price::ZERO;
                self.notice = Some(COURIER_UNAVAILABLE.to_string());
            }
            Err(e) => {
                tracing::warn!(error = %e, "Shipping quote failed");
                self.cost = Price::ZERO;
                self.notice = Some(QUOTE_FAILED.to_string());
            }
        }
    }

    #[must_use]
    pub fn province_name(&self) -> Option<&str> {
        name_of(&self.provinces, self.province)
    }

    #[must_use]
    pub fn city_name(&self) -> Option<&str> {
        name_of(&self.cities, self.city)
    }

    #[must_use]
    pub fn district_name(&self) -> Option<&str> {
        name_of(&self.districts, self.district)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn loc(id: i64, name: &str) -> Location {
        Location {
            id: LocationId::new(id),
            name: name.to_string(),
        }
    }

    fn resolved() -> ShippingSelection {
        let mut s = ShippingSelection::default();
        s.set_provinces(vec![loc(1, "Jawa Barat"), loc(2, "Bali")]);
        s.select_province(Some(LocationId::new(1)));
        s.set_cities(vec![loc(10, "Bandung")]);
        s.select_city(Some(LocationId::new(10)));
        s.set_districts(vec![loc(100, "Coblong")]);
        s.select_district(Some(LocationId::new(100)));
        s.apply_quote(Ok(ShippingQuote {
            success: true,
            cost: Price::new(9_000),
        }));
        s
    }

    #[test]
    fn test_selecting_province_clears_lower_levels() {
        let mut s = resolved();
        assert_eq!(s.cost, Price::new(9_000));

        s.select_province(Some(LocationId::new(2)));
        assert_eq!(s.province, Some(LocationId::new(2)));
        assert!(s.city.is_none());
        assert!(s.district.is_none());
        assert!(s.cities.is_empty());
        assert!(s.districts.is_empty());
        assert_eq!(s.cost, Price::ZERO);
        assert_eq!(s.provinces.len(), 2);
    }

    #[test]
    fn test_selecting_city_clears_district() {
        let mut s = resolved();
        s.select_city(Some(LocationId::new(10)));
        assert!(s.district.is_none());
        assert!(s.districts.is_empty());
        assert_eq!(s.cities.len(), 1);
        assert_eq!(s.cost, Price::ZERO);
        assert!(s.quote_destination().is_none());
    }

    #[test]
    fn test_names_resolve_from_option_lists() {
        let s = resolved();
        assert_eq!(s.province_name(), Some("Jawa Barat"));
        assert_eq!(s.city_name(), Some("Bandung"));
        assert_eq!(s.district_name(), Some("Coblong"));
        assert_eq!(s.quote_destination(), Some(LocationId::new(100)));
    }

    #[test]
    fn test_unavailable_quote_zeroes_cost_with_notice() {
        let mut s = resolved();
        s.apply_quote(Ok(ShippingQuote {
            success: false,
            cost: Price::new(5_000),
        }));
        assert_eq!(s.cost, Price::ZERO);
        assert_eq!(s.notice.as_deref(), Some(COURIER_UNAVAILABLE));
    }

    #[test]
    fn test_failed_quote_zeroes_cost_with_notice() {
        let mut s = resolved();
        s.apply_quote(Err(BackendError::NotFound("rate".to_string())));
        assert_eq!(s.cost, Price::ZERO);
        assert_eq!(s.notice.as_deref(), Some(QUOTE_FAILED));
        assert_eq!(s.district, Some(LocationId::new(100)));
    }

    #[test]
    fn test_stale_city_list_overwrites() {
        let mut s = resolved();
        s.select_province(Some(LocationId::new(2)));
        // a late response for the previous province still lands
        s.set_cities(vec![loc(10, "Bandung")]);
        assert_eq!(s.cities.len(), 1);
        assert_eq!(s.province, Some(LocationId::new(2)));
    }
}
