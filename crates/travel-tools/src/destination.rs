//! Destination knowledge: context, culture, attractions, food, itineraries, maps.

use crate::catalog::{self, City, Landmark};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use travel_core::error::AgentError;
use travel_core::tool_registry::Tool;
use url::Url;

/// Walking speed used for time estimates, km/h.
const WALKING_KMH: f64 = 4.5;

fn default_radius_small() -> f64 {
    3.0
}

fn default_radius_large() -> f64 {
    5.0
}

fn validate_radius(tool: &str, radius_km: f64) -> Result<(), AgentError> {
    if !(radius_km.is_finite() && radius_km > 0.0 && radius_km <= 50.0) {
        return Err(AgentError::tool(tool, "radius_km must be between 0 and 50"));
    }
    Ok(())
}

fn from_centre(city: &City, landmark: &Landmark) -> f64 {
    catalog::distance_km(city.lat, city.lon, landmark.lat, landmark.lon)
}

/// Landmarks within `radius_km` of the centre, nearest first.
fn landmarks_within(city: &'static City, radius_km: f64) -> Vec<(&'static Landmark, f64)> {
    let mut found: Vec<_> = city
        .landmarks
        .iter()
        .map(|l| (l, from_centre(city, l)))
        .filter(|(_, d)| *d <= radius_km)
        .collect();
    found.sort_by(|a, b| a.1.total_cmp(&b.1));
    found
}

fn osm_point(lat: f64, lon: f64) -> String {
    format!("https://www.openstreetmap.org/?mlat={lat:.4}&mlon={lon:.4}#map=16/{lat:.4}/{lon:.4}")
}

fn osm_search(query: &str) -> Result<String, AgentError> {
    Url::parse_with_params("https://www.openstreetmap.org/search", &[("query", query)])
        .map(String::from)
        .map_err(|e| AgentError::tool("generate_travel_map", format!("Invalid map query: {e}")))
}

pub struct GetDestinationContextTool;

#[async_trait]
impl Tool for GetDestinationContextTool {
    fn name(&self) -> &str {
        "get_destination_context"
    }

    fn description(&self) -> &str {
        "Practical context for a destination: country, language, currency, climate, \
         best months to visit, main airport, neighbourhoods and signature dishes."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "city": {"type": "string", "description": "City name, e.g. 'Osaka', 'Paris'"}
            },
            "required": ["city"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, AgentError> {
        #[derive(Deserialize)]
        struct Args {
            city: String,
        }
        let args: Args = catalog::parse_args(self.name(), args)?;
        let city = catalog::require_city(self.name(), &args.city)?;
        Ok(format!(
            "{name}, {country}\n\
             Language: {language}\n\
             Currency: {currency}\n\
             Climate: {climate}\n\
             Best months: {best}\n\
             Airport: {airport} ({airport_name})\n\
             Neighbourhoods: {hoods}\n\
             Must-try dishes: {dishes}",
            name = city.name,
            country = city.country,
            language = city.language,
            currency = city.currency,
            climate = city.climate,
            best = city.best_months,
            airport = city.airport,
            airport_name = city.airport_name,
            hoods = city.neighborhoods.join(", "),
            dishes = city.dishes.join(", "),
        ))
    }
}

pub struct FindCulturalActivitiesTool;

#[async_trait]
impl Tool for FindCulturalActivitiesTool {
    fn name(&self) -> &str {
        "find_cultural_activities"
    }

    fn description(&self) -> &str {
        "Find museums, historic sites and cultural venues in a city matching preferences \
         (art, history, culture, architecture, religion, nature...)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "city": {"type": "string", "description": "Destination city"},
                "preferences": {"type": "string", "description": "Comma-separated preferences, e.g. 'art,history'. Default: 'art,history'"},
                "radius_km": {"type": "number", "description": "Search radius from the centre in km. Default: 5"}
            },
            "required": ["city"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, AgentError> {
        #[derive(Deserialize)]
        struct Args {
            city: String,
            #[serde(default = "default_preferences")]
            preferences: String,
            #[serde(default = "default_radius_large")]
            radius_km: f64,
        }
        fn default_preferences() -> String {
            "art,history".into()
        }

        let args: Args = catalog::parse_args(self.name(), args)?;
        validate_radius(self.name(), args.radius_km)?;
        let city = catalog::require_city(self.name(), &args.city)?;
        let wanted = catalog::split_list(&args.preferences);

        let nearby = landmarks_within(city, args.radius_km);
        let matching: Vec<_> = nearby
            .iter()
            .filter(|(l, _)| wanted.iter().any(|w| w == l.kind))
            .collect();

        let mut out = format!(
            "Cultural activities in {} ({}; within {} km):\n",
            city.name,
            wanted.join(", "),
            args.radius_km
        );
        let list: Vec<_> = if matching.is_empty() {
            out.push_str("No exact match for these preferences; closest cultural sites instead:\n");
            nearby.iter().collect()
        } else {
            matching
        };
        if list.is_empty() {
            out.push_str("Nothing within this radius. Try a larger radius_km.");
            return Ok(out);
        }
        for (landmark, distance) in list {
            out.push_str(&format!("- {} [{}] - {:.1} km from centre\n", landmark.name, landmark.kind, distance));
        }
        Ok(out.trim_end().to_string())
    }
}

pub struct FindNearbyAttractionsTool;

#[async_trait]
impl Tool for FindNearbyAttractionsTool {
    fn name(&self) -> &str {
        "find_nearby_attractions"
    }

    fn description(&self) -> &str {
        "List attractions and historic places near a hotel or the city centre, \
         with walking distance and time."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "city": {"type": "string", "description": "Destination city"},
                "hotel_address": {"type": "string", "description": "Optional hotel address or neighbourhood; the city centre is used otherwise"},
                "radius_km": {"type": "number", "description": "Search radius in km. Default: 3"}
            },
            "required": ["city"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, AgentError> {
        #[derive(Deserialize)]
        struct Args {
            city: String,
            #[serde(default)]
            hotel_address: Option<String>,
            #[serde(default = "default_radius_small")]
            radius_km: f64,
        }
        let args: Args = catalog::parse_args(self.name(), args)?;
        validate_radius(self.name(), args.radius_km)?;
        let city = catalog::require_city(self.name(), &args.city)?;

        // Distances are measured from the centre; the address is only echoed.
        let origin = args
            .hotel_address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or("city centre");

        let nearby = landmarks_within(city, args.radius_km);
        let mut out = format!("Attractions within {} km of {} ({}):\n", args.radius_km, origin, city.name);
        if nearby.is_empty() {
            out.push_str("None found. Try a larger radius_km.");
            return Ok(out);
        }
        for (landmark, distance) in nearby {
            let minutes = (distance / WALKING_KMH * 60.0).round();
            out.push_str(&format!(
                "- {} ({}) - {:.1} km, ~{:.0} min walk\n",
                landmark.name, landmark.kind, distance, minutes
            ));
        }
        Ok(out.trim_end().to_string())
    }
}

pub struct RecommendRestaurantsTool;

#[async_trait]
impl Tool for RecommendRestaurantsTool {
    fn name(&self) -> &str {
        "recommend_restaurants"
    }

    fn description(&self) -> &str {
        "Recommend restaurants in a city by cuisine and price level ('$' to '$$$$')."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "city": {"type": "string", "description": "Destination city"},
                "cuisine_types": {"type": "string", "description": "Comma-separated cuisines, e.g. 'local,seafood'. Default: 'local'"},
                "budget": {"type": "string", "description": "Price level from '$' to '$$$$'. Default: '$$'"},
                "radius_km": {"type": "number", "description": "Search radius in km. Default: 3"}
            },
            "required": ["city"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, AgentError> {
        #[derive(Deserialize)]
        struct Args {
            city: String,
            #[serde(default = "default_cuisine")]
            cuisine_types: String,
            #[serde(default = "default_budget")]
            budget: String,
            #[serde(default = "default_radius_small")]
            radius_km: f64,
        }
        fn default_cuisine() -> String {
            "local".into()
        }
        fn default_budget() -> String {
            "$$".into()
        }

        let args: Args = catalog::parse_args(self.name(), args)?;
        validate_radius(self.name(), args.radius_km)?;
        let level = args.budget.trim();
        if level.is_empty() || level.len() > 4 || !level.chars().all(|c| c == '$') {
            return Err(AgentError::tool(self.name(), "budget must be one of '$', '$$', '$$$', '$$$$'"));
        }
        let city = catalog::require_city(self.name(), &args.city)?;
        let cuisines = catalog::split_list(&args.cuisine_types);
        let per_person = match level.len() {
            1 => 15.0,
            2 => 35.0,
            3 => 70.0,
            _ => 140.0,
        } * city.cost_index;

        let mut out = format!(
            "Restaurants in {} ({} - {}, about ${:.0} per person):\n",
            city.name,
            cuisines.join(", "),
            level,
            per_person
        );
        for (i, dish) in city.dishes.iter().enumerate() {
            let hood = city.neighborhoods[i % city.neighborhoods.len()];
            let rating = 4.0 + (catalog::stable_hash(&[city.name, *dish, level]) % 10) as f64 / 10.0;
            out.push_str(&format!("- {hood} local kitchen: known for {dish} - {rating:.1}/5\n"));
        }
        let other: Vec<&String> = cuisines.iter().filter(|c| c.as_str() != "local").collect();
        for cuisine in other {
            let hood = city.neighborhoods[catalog::stable_hash(&[city.name, cuisine.as_str()]) as usize % city.neighborhoods.len()];
            out.push_str(&format!("- {} {} bistro in {}\n", capitalise(cuisine), level, hood));
        }
        Ok(out.trim_end().to_string())
    }
}

fn capitalise(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub struct CreateVisitItineraryTool;

/// Interest keywords mapped to landmark kinds.
fn kinds_for(interest: &str) -> &'static [&'static str] {
    match interest {
        "culture" | "museums" | "museum" => &["art", "culture", "history"],
        "art" => &["art"],
        "history" => &["history", "religion"],
        "attractions" | "sightseeing" => &["architecture", "history", "nature"],
        "nature" | "parks" | "beach" => &["nature"],
        "food" | "gastronomy" => &["food"],
        "shopping" => &["shopping"],
        "nightlife" => &["nightlife"],
        "architecture" => &["architecture", "religion"],
        _ => &[],
    }
}

#[async_trait]
impl Tool for CreateVisitItineraryTool {
    fn name(&self) -> &str {
        "create_visit_itinerary"
    }

    fn description(&self) -> &str {
        "Build a day-by-day visit plan (1 to 7 days) for a city around the traveller's interests."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "city": {"type": "string", "description": "Destination city"},
                "duration_days": {"type": "integer", "description": "Number of days, 1 to 7"},
                "interests": {"type": "string", "description": "Comma-separated interests. Default: 'culture,food,attractions'"}
            },
            "required": ["city", "duration_days"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, AgentError> {
        #[derive(Deserialize)]
        struct Args {
            city: String,
            duration_days: u32,
            #[serde(default = "default_interests")]
            interests: String,
        }
        fn default_interests() -> String {
            "culture,food,attractions".into()
        }

        let args: Args = catalog::parse_args(self.name(), args)?;
        if !(1..=7).contains(&args.duration_days) {
            return Err(AgentError::tool(self.name(), "duration_days must be between 1 and 7"));
        }
        let city = catalog::require_city(self.name(), &args.city)?;
        let interests = catalog::split_list(&args.interests);

        // Preferred landmarks first, then the rest, so every day has content.
        let preferred: Vec<&Landmark> = city
            .landmarks
            .iter()
            .filter(|l| interests.iter().any(|i| kinds_for(i).contains(&l.kind)))
            .collect();
        let mut ordered = preferred.clone();
        ordered.extend(city.landmarks.iter().filter(|l| !preferred.iter().any(|p| p.name == l.name)));

        let mut out = format!("{}-day itinerary for {} ({}):\n", args.duration_days, city.name, interests.join(", "));
        for day in 0..args.duration_days as usize {
            let morning = ordered[(day * 2) % ordered.len()];
            let afternoon = ordered[(day * 2 + 1) % ordered.len()];
            let dish = city.dishes[day % city.dishes.len()];
            let hood = city.neighborhoods[day % city.neighborhoods.len()];
            out.push_str(&format!(
                "Day {}:\n  Morning: {}\n  Afternoon: {}\n  Evening: dinner in {} - try {}\n",
                day + 1,
                morning.name,
                afternoon.name,
                hood,
                dish
            ));
        }
        Ok(out.trim_end().to_string())
    }
}

pub struct GenerateTravelMapTool;

#[async_trait]
impl Tool for GenerateTravelMapTool {
    fn name(&self) -> &str {
        "generate_travel_map"
    }

    fn description(&self) -> &str {
        "Produce OpenStreetMap links for the city's main sights and for each hotel address, \
         so the traveller can see everything on a map."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "city": {"type": "string", "description": "Destination city"},
                "hotel_addresses": {"type": "string", "description": "Comma-separated hotel names or addresses"}
            },
            "required": ["city", "hotel_addresses"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, AgentError> {
        #[derive(Deserialize)]
        struct Args {
            city: String,
            hotel_addresses: String,
        }
        let args: Args = catalog::parse_args(self.name(), args)?;
        let city = catalog::require_city(self.name(), &args.city)?;
        let hotels: Vec<&str> = args
            .hotel_addresses
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        let mut out = format!("Map of {}: {}\n", city.name, osm_point(city.lat, city.lon));
        if !hotels.is_empty() {
            out.push_str("Hotels:\n");
            for hotel in hotels {
                let link = osm_search(&format!("{hotel}, {}", city.name))?;
                out.push_str(&format!("- {hotel}: {link}\n"));
            }
        }
        out.push_str("Sights:\n");
        for landmark in city.landmarks {
            out.push_str(&format!("- {}: {}\n", landmark.name, osm_point(landmark.lat, landmark.lon)));
        }
        Ok(out.trim_end().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_destination_context() {
        let out = GetDestinationContextTool.execute(json!({"city": "osaka"})).await.unwrap();
        assert!(out.starts_with("Osaka, Japan"));
        assert!(out.contains("Currency: JPY"));
        assert!(out.contains("Airport: KIX"));
    }

    #[tokio::test]
    async fn test_cultural_activities_filter_by_preference() {
        let out = FindCulturalActivitiesTool
            .execute(json!({"city": "Paris", "preferences": "art", "radius_km": 10}))
            .await
            .unwrap();
        assert!(out.contains("Louvre Museum"));
        assert!(out.contains("Musée d'Orsay"));
        assert!(!out.contains("Eiffel Tower"));
    }

    #[tokio::test]
    async fn test_cultural_activities_fall_back_to_all_sites() {
        let out = FindCulturalActivitiesTool
            .execute(json!({"city": "Paris", "preferences": "surfing", "radius_km": 10}))
            .await
            .unwrap();
        assert!(out.contains("No exact match"));
        assert!(out.contains("Eiffel Tower"));
    }

    #[tokio::test]
    async fn test_nearby_attractions_sorted_by_distance() {
        let out = FindNearbyAttractionsTool
            .execute(json!({"city": "Rome", "hotel_address": "Via del Corso 1", "radius_km": 10}))
            .await
            .unwrap();
        assert!(out.contains("Via del Corso 1"));
        let lines: Vec<&str> = out.lines().skip(1).collect();
        let distances: Vec<f64> = lines
            .iter()
            .map(|l| {
                let km = l.split(" - ").nth(1).unwrap().split(' ').next().unwrap();
                km.parse().unwrap()
            })
            .collect();
        assert!(distances.windows(2).all(|w| w[0] <= w[1]));

        let err = FindNearbyAttractionsTool
            .execute(json!({"city": "Rome", "radius_km": -1}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("radius_km"));
    }

    #[tokio::test]
    async fn test_restaurants_validate_budget() {
        let out = RecommendRestaurantsTool
            .execute(json!({"city": "Tokyo", "cuisine_types": "local,french", "budget": "$$$"}))
            .await
            .unwrap();
        assert!(out.contains("sushi"));
        assert!(out.contains("French $$$ bistro"));

        let err = RecommendRestaurantsTool
            .execute(json!({"city": "Tokyo", "budget": "cheap"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("budget must be"));
    }

    #[tokio::test]
    async fn test_itinerary_has_one_block_per_day() {
        let out = CreateVisitItineraryTool
            .execute(json!({"city": "Lisbon", "duration_days": 3, "interests": "history,food"}))
            .await
            .unwrap();
        assert_eq!(out.matches("Day ").count(), 3);
        // History comes first for a history lover.
        assert!(out.contains("Day 1:\n  Morning: Jerónimos Monastery"));

        let err = CreateVisitItineraryTool
            .execute(json!({"city": "Lisbon", "duration_days": 9}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("between 1 and 7"));
    }

    #[tokio::test]
    async fn test_map_links_are_encoded() {
        let out = GenerateTravelMapTool
            .execute(json!({"city": "Paris", "hotel_addresses": "Hôtel du Louvre, 12 rue de Rivoli"}))
            .await
            .unwrap();
        assert!(out.starts_with("Map of Paris: https://www.openstreetmap.org/?mlat=48.8566"));
        assert!(out.contains("https://www.openstreetmap.org/search?query="));
        assert!(!out.contains("query=Hôtel du Louvre"));
        assert_eq!(out.matches("/search?query=").count(), 2);
    }
}
