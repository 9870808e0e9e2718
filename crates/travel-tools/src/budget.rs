use crate::catalog;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::OnceLock;
use travel_core::error::AgentError;
use travel_core::tool_registry::Tool;

pub struct CalculateTotalCostTool;

#[async_trait]
impl Tool for CalculateTotalCostTool {
    fn name(&self) -> &str {
        "calculate_total_cost"
    }

    fn description(&self) -> &str {
        "Compute the total trip cost from the flight price per person and the total lodging price, \
         optionally checked against the traveller's budget."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "flight_price": {"type": "number", "description": "Flight price per person"},
                "hotel_price": {"type": "number", "description": "Total lodging price for the stay"},
                "travelers": {"type": "integer", "description": "Number of travellers. Default: 2"},
                "budget": {"type": "number", "description": "Optional total budget to compare against"}
            },
            "required": ["flight_price", "hotel_price"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, AgentError> {
        #[derive(Deserialize)]
        struct Args {
            flight_price: f64,
            hotel_price: f64,
            #[serde(default = "default_travelers")]
            travelers: u32,
            #[serde(default)]
            budget: Option<f64>,
        }
        fn default_travelers() -> u32 {
            2
        }

        let args: Args = catalog::parse_args(self.name(), args)?;
        let prices = [args.flight_price, args.hotel_price];
        if prices.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(AgentError::tool(self.name(), "prices must be non-negative numbers"));
        }
        if args.travelers == 0 {
            return Err(AgentError::tool(self.name(), "travelers must be at least 1"));
        }

        let travelers = f64::from(args.travelers);
        let flights = args.flight_price * travelers;
        let total = flights + args.hotel_price;

        let mut out = format!(
            "Total cost:\n\
             Flights: ${:.0}/person x {} = ${:.0}\n\
             Lodging: ${:.0}\n\
             TOTAL: ${:.0} for {} travellers (${:.0}/person)",
            args.flight_price,
            args.travelers,
            flights,
            args.hotel_price,
            total,
            args.travelers,
            total / travelers
        );
        if let Some(budget) = args.budget.filter(|b| b.is_finite() && *b > 0.0) {
            let diff = budget - total;
            if diff >= 0.0 {
                out.push_str(&format!("\nWithin budget: ${diff:.0} left of ${budget:.0}"));
            } else {
                out.push_str(&format!("\nOver budget by ${:.0} (budget ${budget:.0})", -diff));
            }
        }
        Ok(out)
    }
}

/// Amounts such as `$1,850` or `2400€` in a package description.
fn amount_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)(?:\$\s*(\d[\d,.]*)|(\d[\d,.]*)\s*(?:\$|€|eur|usd))").ok())
        .as_ref()
}

/// A package parsed out of free text: its label and price.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageQuote {
    pub label: String,
    pub price: f64,
    pub rental: bool,
}

/// Split "Package1: $X (flight+hotel), Package2: $Y (flight+rental)" into quotes.
pub fn parse_packages(info: &str) -> Vec<PackageQuote> {
    info.split([';', '\n'])
        .flat_map(|line| line.split(", "))
        .filter_map(|part| {
            let caps = amount_pattern()?.captures(part)?;
            let raw = caps.get(1).or_else(|| caps.get(2))?.as_str();
            let price = raw.replace(',', "").trim_end_matches('.').parse::<f64>().ok()?;
            let label = part.split(':').next().unwrap_or(part).trim().to_string();
            let lower = part.to_lowercase();
            Some(PackageQuote {
                label,
                price,
                rental: ["rental", "location", "airbnb", "apartment"]
                    .iter()
                    .any(|k| lower.contains(k)),
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pick {
    Cheapest,
    Middle,
    Priciest,
    CheapestRental,
}

fn choose(budget: &str, style: &str, priority: &str) -> (Pick, &'static str) {
    if style == "budget" || budget == "low" {
        return (Pick::Cheapest, "Lowest price; the savings on lodging pay for activities.");
    }
    if style == "luxury" || budget == "high" {
        return (Pick::Priciest, "Premium comfort: full hotel services and central location.");
    }
    match priority {
        "comfort" => (Pick::Middle, "Good comfort without premium prices; hotel services included."),
        "adventure" => (
            Pick::CheapestRental,
            "A rental in a local neighbourhood gives the most authentic stay.",
        ),
        _ => (Pick::Middle, "Best value: solid comfort with budget left for the trip itself."),
    }
}

pub struct RecommendBestPackageTool;

#[async_trait]
impl Tool for RecommendBestPackageTool {
    fn name(&self) -> &str {
        "recommend_best_package"
    }

    fn description(&self) -> &str {
        "Compare flight+lodging packages (hotel vs rental) and recommend one for the \
         traveller's budget level, travel style and priorities."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "packages_info": {"type": "string", "description": "Packages with prices, e.g. 'Package1: $1800 (flight+hotel), Package2: $1500 (flight+rental)'"},
                "user_budget": {"type": "string", "enum": ["low", "medium", "high"], "description": "low (<$2000), medium ($2000-5000), high (>$5000). Default: medium"},
                "travel_style": {"type": "string", "enum": ["budget", "balanced", "luxury"], "description": "Default: balanced"},
                "priorities": {"type": "string", "enum": ["value", "comfort", "adventure"], "description": "Default: value"}
            },
            "required": ["packages_info"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, AgentError> {
        #[derive(Deserialize)]
        struct Args {
            packages_info: String,
            #[serde(default = "default_budget")]
            user_budget: String,
            #[serde(default = "default_style")]
            travel_style: String,
            #[serde(default = "default_priorities")]
            priorities: String,
        }
        fn default_budget() -> String {
            "medium".into()
        }
        fn default_style() -> String {
            "balanced".into()
        }
        fn default_priorities() -> String {
            "value".into()
        }

        let args: Args = catalog::parse_args(self.name(), args)?;
        let budget = args.user_budget.trim().to_lowercase();
        let style = args.travel_style.trim().to_lowercase();
        let priority = args.priorities.trim().to_lowercase();
        if !["low", "medium", "high"].contains(&budget.as_str()) {
            return Err(AgentError::tool(self.name(), "user_budget must be low, medium or high"));
        }
        if !["budget", "balanced", "luxury"].contains(&style.as_str()) {
            return Err(AgentError::tool(self.name(), "travel_style must be budget, balanced or luxury"));
        }
        if !["value", "comfort", "adventure"].contains(&priority.as_str()) {
            return Err(AgentError::tool(self.name(), "priorities must be value, comfort or adventure"));
        }

        let mut packages = parse_packages(&args.packages_info);
        if packages.is_empty() {
            return Err(AgentError::tool(
                self.name(),
                "packages_info must list at least one package with a price, e.g. 'Package1: $1800'",
            ));
        }
        packages.sort_by(|a, b| a.price.total_cmp(&b.price));

        let (pick, reason) = choose(&budget, &style, &priority);
        let chosen = match pick {
            Pick::Cheapest => &packages[0],
            Pick::Priciest => &packages[packages.len() - 1],
            Pick::Middle => &packages[packages.len() / 2],
            Pick::CheapestRental => packages.iter().find(|p| p.rental).unwrap_or(&packages[0]),
        };

        let mut out = format!(
            "Profile: budget {budget}, style {style}, priority {priority}\n\
             Recommendation: {} (${:.0}{})\n\
             Why: {reason}\n\
             Compared:\n",
            chosen.label,
            chosen.price,
            if chosen.rental { ", rental" } else { "" },
        );
        for p in &packages {
            let kind = if p.rental { "rental" } else { "hotel" };
            let marker = if std::ptr::eq(p, chosen) { " <- recommended" } else { "" };
            out.push_str(&format!("- {}: ${:.0} ({kind}){marker}\n", p.label, p.price));
        }
        if packages.iter().any(|p| p.rental) && packages.iter().any(|p| !p.rental) {
            out.push_str("Tip: a rental kitchen typically saves $30-50 a day on meals.");
        }
        Ok(out.trim_end().to_string())
    }
}
