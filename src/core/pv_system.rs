use crate::core::building_element::{BuildingElement, ElementType, Orientation};
use crate::core::radiation::RadiationRecord;
use crate::core::units::WATTS_PER_KILOWATT;
use crate::errors::BipvError;
use crate::input::{Input, PanelSpec, PvSystemInput};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PVSystemSpec {
    pub element_id: String,
    pub element_type: ElementType,
    pub orientation: Orientation,
    pub panel: String,
    pub panel_count: u32,
    /// m2 of module area installed
    pub covered_area: f64,
    pub system_power_kw: f64,
    pub annual_energy_kwh: f64,
    /// kWh/kW/year
    pub specific_yield: f64,
    pub panel_cost: f64,
    pub installation_cost: f64,
    pub total_cost: f64,
}

/// Footprint of one panel including the gap to its neighbours, in m2
pub fn effective_panel_area(panel: &PanelSpec, spacing_factor: f64) -> f64 {
    panel.area() * (1. + spacing_factor).powi(2)
}

/// Number of whole panels that fit on an element
pub fn panel_count(element_area: f64, panel: &PanelSpec, spacing_factor: f64) -> u32 {
    (element_area / effective_panel_area(panel, spacing_factor)).floor() as u32
}

#[derive(Clone, Copy, Debug)]
pub struct PVSystemSizer {
    spacing_factor: f64,
    min_system_kw: f64,
    performance_ratio: f64,
    installation_cost_per_kw: f64,
}

impl PVSystemSizer {
    pub fn new(
        spacing_factor: f64,
        min_system_kw: f64,
        performance_ratio: f64,
        installation_cost_per_kw: f64,
    ) -> Self {
        Self {
            spacing_factor,
            min_system_kw,
            performance_ratio,
            installation_cost_per_kw,
        }
    }

    pub fn from_input(input: &PvSystemInput) -> Self {
        Self::new(
            input.spacing_factor,
            input.min_system_kw,
            input.performance_ratio(),
            input.installation_cost_per_kw,
        )
    }

    /// Size a system for one element, or return `None` where no panel fits or the system would
    /// fall below the minimum capacity.
    pub fn size(
        &self,
        element: &BuildingElement,
        record: &RadiationRecord,
        panel_name: &str,
        panel: &PanelSpec,
    ) -> Option<PVSystemSpec> {
        let panel_count = panel_count(element.area, panel, self.spacing_factor);
        if panel_count == 0 {
            debug!(element_id = %element.id, "no panels fit on element");
            return None;
        }

        let system_power_kw = panel_count as f64 * panel.power_watts / WATTS_PER_KILOWATT as f64;
        if system_power_kw < self.min_system_kw {
            debug!(
                element_id = %element.id,
                system_power_kw, "system below minimum capacity"
            );
            return None;
        }

        let annual_energy_kwh = system_power_kw * record.annual_irradiance * self.performance_ratio;
        let panel_cost = panel_count as f64 * panel.unit_cost;
        let installation_cost = system_power_kw * self.installation_cost_per_kw;

        Some(PVSystemSpec {
            element_id: element.id.clone(),
            element_type: element.element_type,
            orientation: element.orientation,
            panel: panel_name.to_string(),
            panel_count,
            covered_area: panel_count as f64 * panel.area(),
            system_power_kw,
            annual_energy_kwh,
            specific_yield: annual_energy_kwh / system_power_kw,
            panel_cost,
            installation_cost,
            total_cost: panel_cost + installation_cost,
        })
    }

    /// Size systems for every element with a radiation record, in record order. Elements that
    /// cannot host a viable system are silently left out, so the result may be empty.
    pub fn size_all(
        &self,
        input: &Input,
        elements: &[BuildingElement],
        records: &[RadiationRecord],
    ) -> Result<Vec<PVSystemSpec>, BipvError> {
        let elements_by_id: HashMap<&str, &BuildingElement> = elements
            .iter()
            .map(|element| (element.id.as_str(), element))
            .collect();

        let mut systems = vec![];
        for record in records {
            let element = elements_by_id
                .get(record.element_id.as_str())
                .ok_or_else(|| {
                    BipvError::invalid_input(format!(
                        "radiation record refers to unknown element '{}'",
                        record.element_id
                    ))
                })?;
            let (panel_name, panel) = input.panel_for(element.element_type)?;
            if let Some(system) = self.size(element, record, panel_name, panel) {
                systems.push(system);
            }
        }

        Ok(systems)
    }
}
