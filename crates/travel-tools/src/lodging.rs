use crate::catalog::{self, City};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use travel_core::error::AgentError;
use travel_core::tool_registry::Tool;

fn default_guests() -> u32 {
    2
}

#[derive(Deserialize)]
struct StayArgs {
    destination: String,
    checkin_date: String,
    checkout_date: String,
    #[serde(default = "default_guests")]
    guests: u32,
}

fn stay_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "destination": {"type": "string", "description": "Destination city"},
            "checkin_date": {"type": "string", "description": "Arrival date, YYYY-MM-DD"},
            "checkout_date": {"type": "string", "description": "Departure date, YYYY-MM-DD"},
            "guests": {"type": "integer", "description": "Number of travellers. Default: 2"}
        },
        "required": ["destination", "checkin_date", "checkout_date"]
    })
}

/// A priced place to stay.
#[derive(Debug, Clone, PartialEq)]
pub struct StayOffer {
    pub name: String,
    pub category: &'static str,
    pub neighborhood: &'static str,
    pub per_night: f64,
    pub total: f64,
    pub rating: f64,
}

struct Tier {
    label: &'static str,
    suffix: &'static str,
    base: f64,
}

const HOTEL_TIERS: &[Tier] = &[
    Tier { label: "2*", suffix: "Budget Inn", base: 65.0 },
    Tier { label: "3*", suffix: "Central Hotel", base: 120.0 },
    Tier { label: "4*", suffix: "Grand Hotel", base: 210.0 },
    Tier { label: "5*", suffix: "Palace", base: 380.0 },
];

const RENTAL_TIERS: &[Tier] = &[
    Tier { label: "studio", suffix: "Studio", base: 55.0 },
    Tier { label: "apartment", suffix: "Apartment", base: 95.0 },
    Tier { label: "house", suffix: "House", base: 170.0 },
];

fn quote(city: &City, tiers: &'static [Tier], nights: i64, guests: u32, seed: &str) -> Vec<StayOffer> {
    let party = if guests > 2 { 1.0 + 0.25 * f64::from(guests - 2) } else { 1.0 };
    tiers
        .iter()
        .enumerate()
        .map(|(i, tier)| {
            let neighborhood = city.neighborhoods[i % city.neighborhoods.len()];
            let factor = catalog::jitter(&[city.name, tier.suffix, seed], 0.1);
            let per_night = (tier.base * city.cost_index * party * factor).round();
            StayOffer {
                name: format!("{} {}", neighborhood, tier.suffix),
                category: tier.label,
                neighborhood,
                per_night,
                total: per_night * nights as f64,
                rating: 7.0 + (catalog::stable_hash(&[city.name, tier.suffix]) % 25) as f64 / 10.0,
            }
        })
        .collect()
}

fn render(title: String, offers: &[StayOffer]) -> String {
    let mut out = title;
    for (i, offer) in offers.iter().enumerate() {
        out.push_str(&format!(
            "{}. {} ({}) - ${:.0} total (${:.0}/night) - rated {:.1}/10 - {}\n",
            i + 1,
            offer.name,
            offer.category,
            offer.total,
            offer.per_night,
            offer.rating,
            offer.neighborhood
        ));
    }
    if let Some(cheapest) = offers.iter().min_by(|a, b| a.per_night.total_cmp(&b.per_night)) {
        out.push_str(&format!("Best price: ${:.0} - {}", cheapest.total, cheapest.name));
    }
    out
}

fn validate_guests(tool: &str, guests: u32) -> Result<(), AgentError> {
    if guests == 0 || guests > 12 {
        return Err(AgentError::tool(tool, "guests must be between 1 and 12"));
    }
    Ok(())
}

pub struct SearchHotelsTool;

#[async_trait]
impl Tool for SearchHotelsTool {
    fn name(&self) -> &str {
        "search_hotels"
    }

    fn description(&self) -> &str {
        "Search hotels in a city for given dates, with nightly and total prices."
    }

    fn parameters_schema(&self) -> Value {
        stay_schema()
    }

    async fn execute(&self, args: Value) -> Result<String, AgentError> {
        let args: StayArgs = catalog::parse_args(self.name(), args)?;
        validate_guests(self.name(), args.guests)?;
        let city = catalog::require_city(self.name(), &args.destination)?;
        let (checkin, _, nights) = catalog::nights_between(self.name(), &args.checkin_date, &args.checkout_date)?;
        let offers = quote(city, HOTEL_TIERS, nights, args.guests, &checkin.to_string());
        Ok(render(
            format!("Hotels in {} ({} nights, {} guests):\n", city.name, nights, args.guests),
            &offers,
        ))
    }
}

pub struct SearchVacationRentalsTool;

#[async_trait]
impl Tool for SearchVacationRentalsTool {
    fn name(&self) -> &str {
        "search_vacation_rentals"
    }

    fn description(&self) -> &str {
        "Search vacation rentals (studios, apartments, houses) in a city for given dates. \
         Rentals have kitchens and suit families or longer stays."
    }

    fn parameters_schema(&self) -> Value {
        stay_schema()
    }

    async fn execute(&self, args: Value) -> Result<String, AgentError> {
        let args: StayArgs = catalog::parse_args(self.name(), args)?;
        validate_guests(self.name(), args.guests)?;
        let city = catalog::require_city(self.name(), &args.destination)?;
        let (checkin, _, nights) = catalog::nights_between(self.name(), &args.checkin_date, &args.checkout_date)?;
        let offers = quote(city, RENTAL_TIERS, nights, args.guests, &checkin.to_string());
        Ok(render(
            format!("Vacation rentals in {} ({} nights, {} guests):\n", city.name, nights, args.guests),
            &offers,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hotels_priced_per_night_and_total() {
        let out = SearchHotelsTool
            .execute(json!({
                "destination": "Tokyo",
                "checkin_date": "2025-04-10",
                "checkout_date": "2025-04-17"
            }))
            .await
            .unwrap();
        assert!(out.starts_with("Hotels in Tokyo (7 nights, 2 guests)"));
        assert_eq!(out.lines().filter(|l| l.contains("/night")).count(), 4);
        assert!(out.contains("Best price: $"));
    }

    #[test]
    fn test_totals_follow_nights_and_party_size() {
        let city = catalog::find_city("Lisbon").unwrap();
        let couple = quote(city, HOTEL_TIERS, 3, 2, "seed");
        let family = quote(city, HOTEL_TIERS, 3, 4, "seed");
        for (c, f) in couple.iter().zip(&family) {
            assert_eq!(c.total, c.per_night * 3.0);
            assert!(f.per_night > c.per_night);
        }
    }

    #[test]
    fn test_cheaper_cities_cost_less() {
        let bangkok = quote(catalog::find_city("Bangkok").unwrap(), RENTAL_TIERS, 1, 2, "s");
        let new_york = quote(catalog::find_city("New York").unwrap(), RENTAL_TIERS, 1, 2, "s");
        assert!(bangkok[1].per_night < new_york[1].per_night);
    }

    #[tokio::test]
    async fn test_rentals_reject_bad_stays() {
        let err = SearchVacationRentalsTool
            .execute(json!({
                "destination": "Rome",
                "checkin_date": "2025-06-10",
                "checkout_date": "2025-06-09"
            }))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("must be after"));

        let err = SearchVacationRentalsTool
            .execute(json!({
                "destination": "Rome",
                "checkin_date": "2025-06-10",
                "checkout_date": "2025-06-12",
                "guests": 0
            }))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("guests"));
    }
}
