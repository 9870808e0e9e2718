use crate::catalog::{self, City};
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use serde_json::{json, Value};
use travel_core::error::AgentError;
use travel_core::tool_registry::Tool;

const CARRIERS: &[&str] = &["SkyLink", "Meridian Air", "Aurora Airways", "Blue Horizon", "Polar Express Air"];

/// Resolve a city name to its main airport.
pub struct GetAirportCodeTool;

#[async_trait]
impl Tool for GetAirportCodeTool {
    fn name(&self) -> &str {
        "get_airport_code"
    }

    fn description(&self) -> &str {
        "Find the IATA airport code for a city (e.g. 'Tokyo' -> NRT). \
         Call this before search_flights when you only know city names."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "city_name": {
                    "type": "string",
                    "description": "City name, e.g. 'Rio de Janeiro', 'Tokyo', 'Paris'"
                }
            },
            "required": ["city_name"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, AgentError> {
        #[derive(Deserialize)]
        struct Args {
            city_name: String,
        }
        let args: Args = catalog::parse_args(self.name(), args)?;
        let city = catalog::require_city(self.name(), &args.city_name)?;
        Ok(format!(
            "{} ({}): airport {} - {}",
            city.name, city.country, city.airport, city.airport_name
        ))
    }
}

/// One priced itinerary.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightOffer {
    pub carrier: &'static str,
    pub stops: u8,
    pub duration_hours: f64,
    pub price_per_person: f64,
}

/// Seasonal multiplier: peak holidays cost more.
fn season_factor(date: NaiveDate) -> f64 {
    match date.month() {
        7 | 8 | 12 => 1.25,
        4 | 5 | 6 | 9 => 1.05,
        _ => 0.95,
    }
}

/// Deterministic offers between two catalogue cities, cheapest first.
pub fn quote_flights(from: &City, to: &City, departure: NaiveDate, round_trip: bool) -> Vec<FlightOffer> {
    let distance = catalog::distance_km(from.lat, from.lon, to.lat, to.lon);
    let base = (60.0 + distance * 0.075) * season_factor(departure);
    let date = departure.to_string();

    let mut offers: Vec<FlightOffer> = (0..3u8)
        .map(|i| {
            let seed = catalog::stable_hash(&[from.airport, to.airport, &date]) % CARRIERS.len() as u64;
            let index = (seed as usize + usize::from(i)) % CARRIERS.len();
            let carrier = CARRIERS[index];
            let stops = if distance < 2_500.0 { 0 } else { i.min(2) };
            let stop_discount = 1.0 - 0.12 * f64::from(stops);
            let mut price = base * stop_discount * catalog::jitter(&[carrier, from.airport, to.airport, &date], 0.12);
            if round_trip {
                price *= 1.8;
            }
            FlightOffer {
                carrier,
                stops,
                duration_hours: distance / 820.0 + 0.6 + 2.2 * f64::from(stops),
                price_per_person: price.round(),
            }
        })
        .collect();
    offers.sort_by(|a, b| a.price_per_person.total_cmp(&b.price_per_person));
    offers
}

/// Price flights between two airports.
pub struct SearchFlightsTool;

#[async_trait]
impl Tool for SearchFlightsTool {
    fn name(&self) -> &str {
        "search_flights"
    }

    fn description(&self) -> &str {
        "Search flights between two airports with prices per person. \
         Accepts IATA codes (e.g. CDG, NRT) or city names."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "origin": {"type": "string", "description": "Origin airport code, e.g. 'CDG'"},
                "destination": {"type": "string", "description": "Destination airport code, e.g. 'HAV'"},
                "departure_date": {"type": "string", "description": "Departure date, YYYY-MM-DD"},
                "return_date": {"type": "string", "description": "Optional return date, YYYY-MM-DD"}
            },
            "required": ["origin", "destination", "departure_date"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, AgentError> {
        #[derive(Deserialize)]
        struct Args {
            origin: String,
            destination: String,
            departure_date: String,
            #[serde(default)]
            return_date: Option<String>,
        }
        let args: Args = catalog::parse_args(self.name(), args)?;
        let from = catalog::resolve_airport(self.name(), &args.origin)?;
        let to = catalog::resolve_airport(self.name(), &args.destination)?;
        if from.airport == to.airport {
            return Err(AgentError::tool(self.name(), "origin and destination are the same airport"));
        }
        let departure = catalog::parse_date(self.name(), "departure_date", &args.departure_date)?;
        let return_date = match args.return_date.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(raw) => {
                let date = catalog::parse_date(self.name(), "return_date", raw)?;
                if date < departure {
                    return Err(AgentError::tool(self.name(), "return_date is before departure_date"));
                }
                Some(date)
            }
            None => None,
        };

        let offers = quote_flights(from, to, departure, return_date.is_some());
        let mut out = format!("Flights {} -> {} ({}", from.airport, to.airport, departure);
        match return_date {
            Some(r) => out.push_str(&format!(", return {r}, round trip):\n")),
            None => out.push_str(", one way):\n"),
        }
        for (i, offer) in offers.iter().enumerate() {
            let stops = match offer.stops {
                0 => "direct".to_string(),
                1 => "1 stop".to_string(),
                n => format!("{n} stops"),
            };
            out.push_str(&format!(
                "{}. {} - ${:.0}/person - {}, {:.1}h\n",
                i + 1,
                offer.carrier,
                offer.price_per_person,
                stops,
                offer.duration_hours
            ));
        }
        if let Some(best) = offers.first() {
            out.push_str(&format!("Cheapest: ${:.0}/person with {}", best.price_per_person, best.carrier));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_airport_code_lookup() {
        let out = GetAirportCodeTool
            .execute(json!({"city_name": "Tokyo"}))
            .await
            .unwrap();
        assert!(out.contains("NRT"));

        let err = GetAirportCodeTool
            .execute(json!({"city_name": "Gotham"}))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ToolExecution { ref tool_name, .. } if tool_name == "get_airport_code"));
    }

    #[tokio::test]
    async fn test_search_flights_is_deterministic() {
        let args = json!({"origin": "CDG", "destination": "NRT", "departure_date": "2025-04-10"});
        let first = SearchFlightsTool.execute(args.clone()).await.unwrap();
        let second = SearchFlightsTool.execute(args).await.unwrap();
        assert_eq!(first, second);
        assert!(first.starts_with("Flights CDG -> NRT (2025-04-10, one way)"));
        assert!(first.contains("Cheapest: $"));
    }

    #[test]
    fn test_offers_sorted_and_round_trip_costs_more() {
        let paris = catalog::find_city("Paris").unwrap();
        let havana = catalog::find_city("Havana").unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 11, 3).unwrap();
        let one_way = quote_flights(paris, havana, date, false);
        let round = quote_flights(paris, havana, date, true);
        assert_eq!(one_way.len(), 3);
        assert!(one_way.windows(2).all(|w| w[0].price_per_person <= w[1].price_per_person));
        assert!(round[0].price_per_person > one_way[0].price_per_person);
    }

    #[test]
    fn test_short_haul_is_direct() {
        let paris = catalog::find_city("Paris").unwrap();
        let london = catalog::find_city("London").unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
        assert!(quote_flights(paris, london, date, false).iter().all(|o| o.stops == 0));
    }

    #[tokio::test]
    async fn test_search_flights_rejects_bad_input() {
        let bad_date = SearchFlightsTool
            .execute(json!({"origin": "CDG", "destination": "NRT", "departure_date": "April 10"}))
            .await
            .unwrap_err();
        assert!(bad_date.to_string().contains("YYYY-MM-DD"));

        let reversed = SearchFlightsTool
            .execute(json!({
                "origin": "CDG", "destination": "NRT",
                "departure_date": "2025-04-10", "return_date": "2025-04-01"
            }))
            .await
            .unwrap_err();
        assert!(reversed.to_string().contains("before"));

        let same = SearchFlightsTool
            .execute(json!({"origin": "Paris", "destination": "CDG", "departure_date": "2025-04-10"}))
            .await
            .unwrap_err();
        assert!(same.to_string().contains("same airport"));

        let missing = SearchFlightsTool.execute(json!({"origin": "CDG"})).await.unwrap_err();
        assert!(missing.to_string().contains("Invalid arguments"));
    }
}
