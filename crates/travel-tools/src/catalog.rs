//! Offline destination catalogue shared by every tool.

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde_json::Value;
use travel_core::error::AgentError;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// A point of interest. `kind` is one of: art, history, culture, nature,
/// architecture, food, shopping, nightlife, religion.
#[derive(Debug, Clone, Copy)]
pub struct Landmark {
    pub name: &'static str,
    pub kind: &'static str,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct City {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub country: &'static str,
    pub airport: &'static str,
    pub airport_name: &'static str,
    pub lat: f64,
    pub lon: f64,
    /// Relative price level, 1.0 = Paris.
    pub cost_index: f64,
    pub currency: &'static str,
    pub language: &'static str,
    pub climate: &'static str,
    pub best_months: &'static str,
    pub neighborhoods: &'static [&'static str],
    pub dishes: &'static [&'static str],
    pub landmarks: &'static [Landmark],
}

const fn lm(name: &'static str, kind: &'static str, lat: f64, lon: f64) -> Landmark {
    Landmark {
        name,
        kind,
        lat,
        lon,
    }
}

pub static CITIES: &[City] = &[
    City {
        name: "Paris",
        aliases: &[],
        country: "France",
        airport: "CDG",
        airport_name: "Paris Charles de Gaulle",
        lat: 48.8566,
        lon: 2.3522,
        cost_index: 1.0,
        currency: "EUR",
        language: "French",
        climate: "Temperate; mild springs, warm summers, grey winters",
        best_months: "April-June, September-October",
        neighborhoods: &["Le Marais", "Saint-Germain", "Montmartre", "Latin Quarter"],
        dishes: &["steak frites", "croque-monsieur", "onion soup", "croissants"],
        landmarks: &[
            lm("Louvre Museum", "art", 48.8606, 2.3376),
            lm("Eiffel Tower", "architecture", 48.8584, 2.2945),
            lm("Notre-Dame Cathedral", "religion", 48.8530, 2.3499),
            lm("Musée d'Orsay", "art", 48.8600, 2.3266),
            lm("Sainte-Chapelle", "history", 48.8554, 2.3450),
            lm("Luxembourg Gardens", "nature", 48.8462, 2.3372),
        ],
    },
    City {
        name: "Tokyo",
        aliases: &[],
        country: "Japan",
        airport: "NRT",
        airport_name: "Tokyo Narita",
        lat: 35.6762,
        lon: 139.6503,
        cost_index: 1.05,
        currency: "JPY",
        language: "Japanese",
        climate: "Humid subtropical; cherry blossoms in spring, hot humid summers",
        best_months: "March-May, October-November",
        neighborhoods: &["Shinjuku", "Shibuya", "Asakusa", "Ginza"],
        dishes: &["sushi", "ramen", "tempura", "yakitori"],
        landmarks: &[
            lm("Senso-ji Temple", "religion", 35.7148, 139.7967),
            lm("Meiji Shrine", "history", 35.6764, 139.6993),
            lm("Tokyo National Museum", "art", 35.7188, 139.7765),
            lm("Shinjuku Gyoen", "nature", 35.6852, 139.7101),
            lm("Shibuya Crossing", "architecture", 35.6595, 139.7005),
            lm("Tsukiji Outer Market", "food", 35.6654, 139.7707),
        ],
    },
    City {
        name: "Osaka",
        aliases: &[],
        country: "Japan",
        airport: "KIX",
        airport_name: "Osaka Kansai",
        lat: 34.6937,
        lon: 135.5023,
        cost_index: 0.9,
        currency: "JPY",
        language: "Japanese",
        climate: "Humid subtropical; mild winters, hot summers",
        best_months: "March-May, October-November",
        neighborhoods: &["Namba", "Umeda", "Tennoji"],
        dishes: &["takoyaki", "okonomiyaki", "kushikatsu"],
        landmarks: &[
            lm("Osaka Castle", "history", 34.6873, 135.5262),
            lm("Dotonbori", "food", 34.6687, 135.5013),
            lm("Shitenno-ji", "religion", 34.6536, 135.5163),
            lm("Umeda Sky Building", "architecture", 34.7053, 135.4903),
        ],
    },
    City {
        name: "New York",
        aliases: &["NYC", "New York City"],
        country: "United States",
        airport: "JFK",
        airport_name: "New York John F. Kennedy",
        lat: 40.7128,
        lon: -74.0060,
        cost_index: 1.35,
        currency: "USD",
        language: "English",
        climate: "Humid continental; cold winters, hot summers",
        best_months: "April-June, September-November",
        neighborhoods: &["Midtown", "SoHo", "Williamsburg", "Upper West Side"],
        dishes: &["pizza slice", "bagel with lox", "pastrami sandwich"],
        landmarks: &[
            lm("Metropolitan Museum of Art", "art", 40.7794, -73.9632),
            lm("Central Park", "nature", 40.7829, -73.9654),
            lm("Statue of Liberty", "history", 40.6892, -74.0445),
            lm("Empire State Building", "architecture", 40.7484, -73.9857),
            lm("Broadway", "nightlife", 40.7590, -73.9845),
        ],
    },
    City {
        name: "London",
        aliases: &["Londres"],
        country: "United Kingdom",
        airport: "LHR",
        airport_name: "London Heathrow",
        lat: 51.5074,
        lon: -0.1278,
        cost_index: 1.25,
        currency: "GBP",
        language: "English",
        climate: "Temperate oceanic; frequent light rain",
        best_months: "May-September",
        neighborhoods: &["Covent Garden", "South Bank", "Shoreditch", "Kensington"],
        dishes: &["fish and chips", "Sunday roast", "pie and mash"],
        landmarks: &[
            lm("British Museum", "history", 51.5194, -0.1270),
            lm("Tower of London", "history", 51.5081, -0.0759),
            lm("National Gallery", "art", 51.5089, -0.1283),
            lm("Westminster Abbey", "religion", 51.4994, -0.1273),
            lm("Hyde Park", "nature", 51.5073, -0.1657),
        ],
    },
    City {
        name: "Rome",
        aliases: &["Roma"],
        country: "Italy",
        airport: "FCO",
        airport_name: "Rome Fiumicino",
        lat: 41.9028,
        lon: 12.4964,
        cost_index: 0.9,
        currency: "EUR",
        language: "Italian",
        climate: "Mediterranean; hot dry summers, mild winters",
        best_months: "April-June, September-October",
        neighborhoods: &["Trastevere", "Monti", "Centro Storico"],
        dishes: &["cacio e pepe", "carbonara", "supplì", "gelato"],
        landmarks: &[
            lm("Colosseum", "history", 41.8902, 12.4922),
            lm("Vatican Museums", "art", 41.9065, 12.4536),
            lm("Pantheon", "architecture", 41.8986, 12.4769),
            lm("Roman Forum", "history", 41.8925, 12.4853),
            lm("Villa Borghese", "nature", 41.9142, 12.4923),
        ],
    },
    City {
        name: "Barcelona",
        aliases: &["Barcelone"],
        country: "Spain",
        airport: "BCN",
        airport_name: "Barcelona El Prat",
        lat: 41.3851,
        lon: 2.1734,
        cost_index: 0.85,
        currency: "EUR",
        language: "Catalan, Spanish",
        climate: "Mediterranean; warm summers, beach season June-September",
        best_months: "May-June, September",
        neighborhoods: &["Gothic Quarter", "Eixample", "Gràcia", "Barceloneta"],
        dishes: &["paella", "patatas bravas", "pan con tomate"],
        landmarks: &[
            lm("Sagrada Família", "architecture", 41.4036, 2.1744),
            lm("Park Güell", "nature", 41.4145, 2.1527),
            lm("Picasso Museum", "art", 41.3852, 2.1810),
            lm("La Boqueria", "food", 41.3817, 2.1716),
            lm("Barceloneta Beach", "nature", 41.3784, 2.1925),
        ],
    },
    City {
        name: "Lisbon",
        aliases: &["Lisbonne", "Lisboa"],
        country: "Portugal",
        airport: "LIS",
        airport_name: "Lisbon Humberto Delgado",
        lat: 38.7223,
        lon: -9.1393,
        cost_index: 0.75,
        currency: "EUR",
        language: "Portuguese",
        climate: "Mediterranean; sunny, mild winters",
        best_months: "March-June, September-October",
        neighborhoods: &["Alfama", "Baixa", "Bairro Alto", "Belém"],
        dishes: &["pastel de nata", "bacalhau", "grilled sardines"],
        landmarks: &[
            lm("Jerónimos Monastery", "history", 38.6979, -9.2068),
            lm("Belém Tower", "history", 38.6916, -9.2160),
            lm("São Jorge Castle", "history", 38.7139, -9.1335),
            lm("Gulbenkian Museum", "art", 38.7372, -9.1545),
            lm("Time Out Market", "food", 38.7070, -9.1459),
        ],
    },
    City {
        name: "Rio de Janeiro",
        aliases: &["Rio"],
        country: "Brazil",
        airport: "GIG",
        airport_name: "Rio de Janeiro Galeão",
        lat: -22.9068,
        lon: -43.1729,
        cost_index: 0.7,
        currency: "BRL",
        language: "Portuguese",
        climate: "Tropical; hot humid summers (December-March)",
        best_months: "May-October",
        neighborhoods: &["Copacabana", "Ipanema", "Santa Teresa", "Lapa"],
        dishes: &["feijoada", "pão de queijo", "churrasco"],
        landmarks: &[
            lm("Christ the Redeemer", "religion", -22.9519, -43.2105),
            lm("Sugarloaf Mountain", "nature", -22.9492, -43.1545),
            lm("Copacabana Beach", "nature", -22.9711, -43.1822),
            lm("Selarón Steps", "art", -22.9153, -43.1791),
            lm("Museum of Tomorrow", "culture", -22.8944, -43.1796),
        ],
    },
    City {
        name: "Havana",
        aliases: &["La Havane", "La Habana"],
        country: "Cuba",
        airport: "HAV",
        airport_name: "Havana José Martí",
        lat: 23.1136,
        lon: -82.3666,
        cost_index: 0.6,
        currency: "CUP",
        language: "Spanish",
        climate: "Tropical; dry season November-April",
        best_months: "December-April",
        neighborhoods: &["Habana Vieja", "Vedado", "Centro Habana"],
        dishes: &["ropa vieja", "moros y cristianos", "tostones"],
        landmarks: &[
            lm("Old Havana", "history", 23.1365, -82.3516),
            lm("Malecón", "nature", 23.1440, -82.3810),
            lm("Museum of the Revolution", "history", 23.1415, -82.3571),
            lm("National Museum of Fine Arts", "art", 23.1403, -82.3580),
            lm("Fábrica de Arte Cubano", "nightlife", 23.1268, -82.4076),
        ],
    },
    City {
        name: "Marrakech",
        aliases: &["Marrakesh"],
        country: "Morocco",
        airport: "RAK",
        airport_name: "Marrakech Menara",
        lat: 31.6295,
        lon: -7.9811,
        cost_index: 0.55,
        currency: "MAD",
        language: "Arabic, French",
        climate: "Semi-arid; very hot summers, cool nights in winter",
        best_months: "March-May, October-November",
        neighborhoods: &["Medina", "Gueliz", "Hivernage"],
        dishes: &["tagine", "couscous", "pastilla"],
        landmarks: &[
            lm("Jemaa el-Fnaa", "culture", 31.6258, -7.9891),
            lm("Majorelle Garden", "nature", 31.6417, -8.0033),
            lm("Bahia Palace", "architecture", 31.6216, -7.9828),
            lm("Koutoubia Mosque", "religion", 31.6237, -7.9936),
            lm("Souks of the Medina", "shopping", 31.6306, -7.9864),
        ],
    },
    City {
        name: "Bangkok",
        aliases: &[],
        country: "Thailand",
        airport: "BKK",
        airport_name: "Bangkok Suvarnabhumi",
        lat: 13.7563,
        lon: 100.5018,
        cost_index: 0.55,
        currency: "THB",
        language: "Thai",
        climate: "Tropical; hot all year, monsoon June-October",
        best_months: "November-February",
        neighborhoods: &["Sukhumvit", "Silom", "Rattanakosin", "Ari"],
        dishes: &["pad thai", "tom yum", "green curry", "mango sticky rice"],
        landmarks: &[
            lm("Grand Palace", "history", 13.7500, 100.4913),
            lm("Wat Arun", "religion", 13.7437, 100.4888),
            lm("Wat Pho", "religion", 13.7465, 100.4930),
            lm("Chatuchak Market", "shopping", 13.7999, 100.5500),
            lm("Jim Thompson House", "art", 13.7492, 100.5283),
        ],
    },
];

/// Look up a city by name or alias, ignoring case and surrounding spaces.
pub fn find_city(name: &str) -> Option<&'static City> {
    let wanted = name.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }
    CITIES.iter().find(|c| {
        c.name.to_lowercase() == wanted || c.aliases.iter().any(|a| a.to_lowercase() == wanted)
    })
}

/// Like [`find_city`] but produces the error a tool should return.
pub fn require_city(tool: &str, name: &str) -> Result<&'static City, AgentError> {
    find_city(name).ok_or_else(|| {
        let known: Vec<&str> = CITIES.iter().map(|c| c.name).collect();
        AgentError::tool(
            tool,
            format!("Unknown city '{}'. Known cities: {}", name, known.join(", ")),
        )
    })
}

/// Accepts an IATA code from the catalogue or a city name.
pub fn resolve_airport(tool: &str, code_or_city: &str) -> Result<&'static City, AgentError> {
    let code = code_or_city.trim().to_uppercase();
    if let Some(city) = CITIES.iter().find(|c| c.airport == code) {
        return Ok(city);
    }
    require_city(tool, code_or_city)
}

/// Great-circle distance in kilometres.
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// FNV-1a; stable across runs so prices are reproducible.
pub fn stable_hash(parts: &[&str]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for part in parts {
        for byte in part.bytes().chain(std::iter::once(0xff)) {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
    }
    hash
}

/// Deterministic factor in `[1 - spread, 1 + spread]`.
pub fn jitter(parts: &[&str], spread: f64) -> f64 {
    let unit = (stable_hash(parts) % 10_000) as f64 / 10_000.0;
    1.0 - spread + 2.0 * spread * unit
}

pub fn parse_date(tool: &str, field: &str, value: &str) -> Result<NaiveDate, AgentError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        AgentError::tool(
            tool,
            format!("{field} must be a date in YYYY-MM-DD format, got '{value}'"),
        )
    })
}

/// Number of nights between two dates; at least one.
pub fn nights_between(
    tool: &str,
    checkin: &str,
    checkout: &str,
) -> Result<(NaiveDate, NaiveDate, i64), AgentError> {
    let start = parse_date(tool, "checkin_date", checkin)?;
    let end = parse_date(tool, "checkout_date", checkout)?;
    let nights = (end - start).num_days();
    if nights < 1 {
        return Err(AgentError::tool(
            tool,
            format!("checkout_date ({end}) must be after checkin_date ({start})"),
        ));
    }
    Ok((start, end, nights))
}

/// Deserialize tool arguments, reporting failures against the tool.
pub fn parse_args<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T, AgentError> {
    serde_json::from_value(args).map_err(|e| AgentError::tool(tool, format!("Invalid arguments: {e}")))
}

/// Split a comma-separated list, trimmed and lowercased, dropping empties.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_city_by_name_and_alias() {
        assert_eq!(find_city("tokyo").unwrap().airport, "NRT");
        assert_eq!(find_city("  Londres ").unwrap().name, "London");
        assert_eq!(find_city("rio").unwrap().name, "Rio de Janeiro");
        assert!(find_city("Atlantis").is_none());
        assert!(find_city("").is_none());
    }

    #[test]
    fn test_resolve_airport_accepts_code_or_city() {
        assert_eq!(resolve_airport("t", "cdg").unwrap().name, "Paris");
        assert_eq!(resolve_airport("t", "Havana").unwrap().airport, "HAV");
        let err = resolve_airport("t", "XYZ").unwrap_err().to_string();
        assert!(err.contains("Unknown city"), "{err}");
    }

    #[test]
    fn test_distance_paris_tokyo() {
        let paris = find_city("Paris").unwrap();
        let tokyo = find_city("Tokyo").unwrap();
        let d = distance_km(paris.lat, paris.lon, tokyo.lat, tokyo.lon);
        assert!((9_600.0..9_800.0).contains(&d), "{d}");
    }

    #[test]
    fn test_jitter_is_stable_and_bounded() {
        let a = jitter(&["CDG", "NRT", "2025-04-10"], 0.15);
        let b = jitter(&["CDG", "NRT", "2025-04-10"], 0.15);
        assert_eq!(a, b);
        assert!((0.85..=1.15).contains(&a));
        assert_ne!(stable_hash(&["ab", "c"]), stable_hash(&["a", "bc"]));
    }

    #[test]
    fn test_nights_between() {
        let (_, _, nights) = nights_between("t", "2025-04-10", "2025-04-17").unwrap();
        assert_eq!(nights, 7);
        assert!(nights_between("t", "2025-04-10", "2025-04-10").is_err());
        assert!(nights_between("t", "10/04/2025", "2025-04-17").is_err());
    }

    #[test]
    fn test_catalogue_is_consistent() {
        for city in CITIES {
            assert_eq!(city.airport.len(), 3, "{}", city.name);
            assert!(!city.landmarks.is_empty(), "{}", city.name);
            assert!(!city.dishes.is_empty(), "{}", city.name);
            assert!(!city.neighborhoods.is_empty(), "{}", city.name);
        }
    }
}
