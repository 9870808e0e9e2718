//! Offline travel tools backed by a small deterministic city catalogue.

pub mod budget;
pub mod catalog;
pub mod destination;
pub mod flights;
pub mod lodging;

use std::sync::Arc;
use travel_core::error::AgentError;
use travel_core::tool_registry::ToolRegistry;

/// Register all built-in tools into the registry.
pub fn register_all(registry: &mut ToolRegistry) -> Result<(), AgentError> {
    registry.register(Arc::new(flights::GetAirportCodeTool))?;
    registry.register(Arc::new(flights::SearchFlightsTool))?;
    registry.register(Arc::new(lodging::SearchHotelsTool))?;
    registry.register(Arc::new(lodging::SearchVacationRentalsTool))?;
    registry.register(Arc::new(destination::GetDestinationContextTool))?;
    registry.register(Arc::new(destination::FindCulturalActivitiesTool))?;
    registry.register(Arc::new(destination::FindNearbyAttractionsTool))?;
    registry.register(Arc::new(destination::RecommendRestaurantsTool))?;
    registry.register(Arc::new(destination::CreateVisitItineraryTool))?;
    registry.register(Arc::new(destination::GenerateTravelMapTool))?;
    registry.register(Arc::new(budget::CalculateTotalCostTool))?;
    registry.register(Arc::new(budget::RecommendBestPackageTool))?;
    tracing::debug!(count = registry.len(), "registered travel tools");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use travel_core::prompts::FULL_TOOLS;

    #[test]
    fn test_register_all_covers_catalogue() {
        let mut registry = ToolRegistry::new();
        register_all(&mut registry).unwrap();
        assert_eq!(registry.len(), FULL_TOOLS.len());
        assert_eq!(registry.list_names(), FULL_TOOLS.to_vec());
    }
}
