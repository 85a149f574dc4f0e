use crate::core::building_element::{BuildingElement, ElementGeometry, ElementType};
use crate::errors::BipvError;
use anyhow::bail;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_valid::Validate;
use std::io::{BufReader, Read};

pub fn ingest_for_processing(json: impl Read) -> Result<Input, anyhow::Error> {
    let reader = BufReader::new(json);
    let input: Input = serde_json::from_reader(reader)?;
    input.check()?;

    Ok(input)
}

#[derive(Clone, Debug, Deserialize, Serialize, Validate)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct Input {
    #[validate]
    pub project: ProjectInput,
    #[serde(default)]
    #[validate]
    pub radiation: RadiationInput,
    #[serde(default)]
    #[validate]
    pub shading: ShadingInput,
    #[serde(default)]
    pub suitability: SuitabilityPolicy,
    pub panel_catalog: IndexMap<String, PanelSpec>,
    #[validate]
    pub pv_system: PvSystemInput,
    /// Monthly demand used when no historical energy data is supplied
    pub demand: Option<DemandInput>,
    /// Elements given directly in the input rather than extracted from a BIM export
    #[serde(default)]
    pub building_elements: Vec<BuildingElementInput>,
    #[serde(default)]
    #[validate]
    pub objectives: ObjectiveWeights,
    #[serde(default)]
    #[validate]
    pub financial: FinancialInput,
    /// Configuration to appraise; the top-ranked configuration is used when absent
    pub selected_configuration: Option<String>,
}

impl Input {
    /// Validate field ranges and cross-references that serde cannot express on its own.
    pub fn check(&self) -> anyhow::Result<()> {
        if let Err(errors) = self.validate() {
            bail!(BipvError::invalid_input(errors.to_string()));
        }
        let ProjectInput {
            latitude,
            longitude,
            ..
        } = self.project;
        if !(-90. ..=90.).contains(&latitude) || !(-180. ..=180.).contains(&longitude) {
            bail!(BipvError::invalid_input(format!(
                "coordinates ({latitude}, {longitude}) are outside the valid range"
            )));
        }
        for (name, panel) in &self.panel_catalog {
            panel.check(name)?;
        }
        self.panel_for(ElementType::Facade)?;
        self.panel_for(ElementType::Window)?;
        self.objectives.normalised()?;
        if let Some(demand) = &self.demand {
            if demand.monthly_kwh.iter().any(|value| !value.is_finite() || *value < 0.) {
                bail!(BipvError::invalid_input(
                    "monthly demand values must be non-negative numbers"
                ));
            }
        }

        Ok(())
    }

    /// The catalog entry used for elements of the given type
    pub fn panel_for(&self, element_type: ElementType) -> Result<(&str, &PanelSpec), BipvError> {
        let name = match element_type {
            ElementType::Facade => &self.pv_system.facade_panel,
            ElementType::Window => self
                .pv_system
                .window_panel
                .as_ref()
                .unwrap_or(&self.pv_system.facade_panel),
        };
        self.panel_catalog
            .get_key_value(name)
            .map(|(name, panel)| (name.as_str(), panel))
            .ok_or_else(|| BipvError::UnknownPanel(name.clone()))
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, Validate)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct ProjectInput {
    pub name: String,
    pub location: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    /// IANA timezone name, carried through to reports
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_currency() -> String {
    "USD".to_string()
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub enum RadiationMethod {
    /// Site GHI scaled by orientation, shading and vertical surface factors
    #[default]
    Simplified,
    /// Plane-of-array irradiation summed over a synthesised typical year
    Hourly,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, Validate)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct RadiationInput {
    #[serde(default)]
    pub method: RadiationMethod,
    #[serde(default = "default_albedo")]
    #[validate(minimum = 0.)]
    #[validate(maximum = 1.)]
    pub albedo: f64,
}

impl Default for RadiationInput {
    fn default() -> Self {
        Self {
            method: Default::default(),
            albedo: default_albedo(),
        }
    }
}

fn default_albedo() -> f64 {
    crate::core::surface_irradiance::DEFAULT_GROUND_ALBEDO
}

/// Fractions of irradiation lost to surrounding trees and buildings.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize, Validate)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct ShadingInput {
    #[serde(default)]
    #[validate(minimum = 0.)]
    #[validate(maximum = 0.5)]
    pub tree_shading: f64,
    #[serde(default)]
    #[validate(minimum = 0.)]
    #[validate(maximum = 0.3)]
    pub building_shading: f64,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(tag = "policy", rename_all = "snake_case", deny_unknown_fields)]
pub enum SuitabilityPolicy {
    /// Suitable elements face E through W and exceed a minimum area for their type
    MinimumArea {
        #[serde(default = "default_facade_min_area")]
        facade_min_area: f64,
        #[serde(default = "default_window_min_area")]
        window_min_area: f64,
    },
    /// Suitable elements face E through W and receive at least this annual irradiation (kWh/m2)
    MinimumRadiation { min_annual_irradiance: f64 },
}

impl Default for SuitabilityPolicy {
    fn default() -> Self {
        Self::MinimumArea {
            facade_min_area: default_facade_min_area(),
            window_min_area: default_window_min_area(),
        }
    }
}

fn default_facade_min_area() -> f64 {
    100.
}

fn default_window_min_area() -> f64 {
    6.
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct PanelSpec {
    pub description: Option<String>,
    /// m
    pub width: f64,
    /// m
    pub height: f64,
    /// rated power at standard test conditions, W
    pub power_watts: f64,
    /// module efficiency, 0 to 1
    pub efficiency: f64,
    /// cost per module, in project currency
    pub unit_cost: f64,
}

impl PanelSpec {
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    fn check(&self, name: &str) -> Result<(), BipvError> {
        let positive = [
            ("width", self.width),
            ("height", self.height),
            ("power_watts", self.power_watts),
        ];
        for (field, value) in positive {
            if !value.is_finite() || value <= 0. {
                return Err(BipvError::invalid_input(format!(
                    "panel '{name}' {field} must be positive, got {value}"
                )));
            }
        }
        if !(0. ..=1.).contains(&self.efficiency) {
            return Err(BipvError::invalid_input(format!(
                "panel '{name}' efficiency must be between 0 and 1, got {}",
                self.efficiency
            )));
        }
        if !self.unit_cost.is_finite() || self.unit_cost < 0. {
            return Err(BipvError::invalid_input(format!(
                "panel '{name}' unit_cost must not be negative, got {}",
                self.unit_cost
            )));
        }

        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, Validate)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct PvSystemInput {
    /// catalog key of the panel installed on opaque facades
    pub facade_panel: String,
    /// catalog key of the (semi-transparent) panel installed on windows; defaults to the facade panel
    pub window_panel: Option<String>,
    /// gap between panels as a fraction of panel dimensions
    #[serde(default = "default_spacing_factor")]
    #[validate(minimum = 0.)]
    #[validate(maximum = 1.)]
    pub spacing_factor: f64,
    /// kW
    #[serde(default = "default_min_system_kw")]
    #[validate(minimum = 0.)]
    pub min_system_kw: f64,
    /// %
    #[serde(default = "default_system_losses_pct")]
    #[validate(minimum = 0.)]
    #[validate(maximum = 100.)]
    pub system_losses_pct: f64,
    /// cost per installed kW, in project currency
    #[serde(default = "default_installation_cost_per_kw")]
    #[validate(minimum = 0.)]
    pub installation_cost_per_kw: f64,
}

impl PvSystemInput {
    pub fn performance_ratio(&self) -> f64 {
        (100. - self.system_losses_pct) / 100.
    }
}

fn default_spacing_factor() -> f64 {
    0.05
}

fn default_min_system_kw() -> f64 {
    1.
}

fn default_system_losses_pct() -> f64 {
    14.
}

fn default_installation_cost_per_kw() -> f64 {
    1500.
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct DemandInput {
    /// kWh, January to December
    pub monthly_kwh: [f64; 12],
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct BuildingElementInput {
    pub id: String,
    #[serde(rename = "type")]
    pub element_type: ElementType,
    /// degrees clockwise from North
    pub azimuth: f64,
    /// m2
    pub area: f64,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub tilt: Option<f64>,
    pub level: Option<String>,
    pub host_wall_id: Option<String>,
}

impl BuildingElementInput {
    pub fn to_element(&self, policy: &SuitabilityPolicy) -> Result<BuildingElement, BipvError> {
        BuildingElement::new(
            self.id.clone(),
            self.element_type,
            ElementGeometry {
                azimuth: self.azimuth,
                area: self.area,
                width: self.width,
                height: self.height,
                tilt: self.tilt,
                level: self.level.clone(),
                host_wall_id: self.host_wall_id.clone(),
            },
            policy,
        )
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, Validate)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct ObjectiveWeights {
    #[serde(default = "default_weight")]
    #[validate(minimum = 0.)]
    pub energy_weight: f64,
    #[serde(default = "default_weight")]
    #[validate(minimum = 0.)]
    pub financial_weight: f64,
}

impl ObjectiveWeights {
    /// Weights scaled to sum to one, as (energy, financial)
    pub fn normalised(&self) -> Result<(f64, f64), BipvError> {
        let total = self.energy_weight + self.financial_weight;
        if !total.is_finite() || total <= 0. {
            return Err(BipvError::invalid_input(
                "at least one objective weight must be positive",
            ));
        }
        Ok((self.energy_weight / total, self.financial_weight / total))
    }
}

impl Default for ObjectiveWeights {
    fn default() -> Self {
        Self {
            energy_weight: default_weight(),
            financial_weight: default_weight(),
        }
    }
}

fn default_weight() -> f64 {
    0.5
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, Validate)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct FinancialInput {
    /// price of imported electricity, per kWh
    #[serde(default = "default_electricity_rate")]
    #[validate(minimum = 0.)]
    pub electricity_rate: f64,
    #[serde(default = "default_lifetime_years")]
    #[validate(minimum = 1)]
    #[validate(maximum = 100)]
    pub lifetime_years: u32,
    #[serde(default = "default_discount_rate")]
    #[validate(minimum = 0.)]
    #[validate(maximum = 1.)]
    pub discount_rate: f64,
    /// fractional loss of output per year
    #[serde(default = "default_degradation_rate")]
    #[validate(minimum = 0.)]
    #[validate(maximum = 1.)]
    pub degradation_rate: f64,
    /// annual operation and maintenance cost as a fraction of the initial cost
    #[serde(default = "default_om_rate")]
    #[validate(minimum = 0.)]
    #[validate(maximum = 1.)]
    pub om_rate: f64,
    /// kg CO2 per kWh of grid electricity
    #[serde(default = "default_grid_co2_factor")]
    #[validate(minimum = 0.)]
    pub grid_co2_factor: f64,
    /// value per tonne of CO2
    #[serde(default = "default_carbon_price")]
    #[validate(minimum = 0.)]
    pub carbon_price: f64,
}

impl Default for FinancialInput {
    fn default() -> Self {
        Self {
            electricity_rate: default_electricity_rate(),
            lifetime_years: default_lifetime_years(),
            discount_rate: default_discount_rate(),
            degradation_rate: default_degradation_rate(),
            om_rate: default_om_rate(),
            grid_co2_factor: default_grid_co2_factor(),
            carbon_price: default_carbon_price(),
        }
    }
}

fn default_electricity_rate() -> f64 {
    0.25
}

fn default_lifetime_years() -> u32 {
    25
}

fn default_discount_rate() -> f64 {
    0.06
}

fn default_degradation_rate() -> f64 {
    0.005
}

fn default_om_rate() -> f64 {
    0.01
}

fn default_grid_co2_factor() -> f64 {
    0.4
}

fn default_carbon_price() -> f64 {
    25.
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use serde_json::json;

    #[fixture]
    fn minimal_input() -> serde_json::Value {
        json!({
            "project": {
                "name": "Office block",
                "latitude": 40.7128,
                "longitude": -74.006
            },
            "panel_catalog": {
                "glass-glass mono": {
                    "width": 2.0,
                    "height": 1.0,
                    "power_watts": 400.0,
                    "efficiency": 0.2,
                    "unit_cost": 250.0
                }
            },
            "pv_system": {
                "facade_panel": "glass-glass mono"
            }
        })
    }

    fn ingest(value: serde_json::Value) -> anyhow::Result<Input> {
        ingest_for_processing(value.to_string().as_bytes())
    }

    #[rstest]
    fn should_apply_defaults_to_minimal_input(minimal_input: serde_json::Value) {
        let input = ingest(minimal_input).unwrap();

        assert_eq!(input.project.currency, "USD");
        assert_eq!(input.radiation.method, RadiationMethod::Simplified);
        assert_eq!(input.radiation.albedo, 0.2);
        assert_eq!(input.shading, ShadingInput::default());
        assert_eq!(input.suitability, SuitabilityPolicy::default());
        assert_eq!(input.pv_system.spacing_factor, 0.05);
        assert_eq!(input.pv_system.performance_ratio(), 0.86);
        assert_eq!(input.financial.lifetime_years, 25);
        assert_eq!(input.objectives.normalised().unwrap(), (0.5, 0.5));
    }

    #[rstest]
    fn should_fall_back_to_facade_panel_for_windows(minimal_input: serde_json::Value) {
        let input = ingest(minimal_input).unwrap();

        let (name, panel) = input.panel_for(ElementType::Window).unwrap();
        assert_eq!(name, "glass-glass mono");
        assert_eq!(panel.area(), 2.);
    }

    #[rstest]
    fn should_reject_unknown_panel(mut minimal_input: serde_json::Value) {
        minimal_input["pv_system"]["window_panel"] = json!("missing");

        assert!(ingest(minimal_input).is_err());
    }

    #[rstest]
    #[case("tree_shading", 0.6)]
    #[case("building_shading", 0.35)]
    #[case("tree_shading", -0.1)]
    fn should_reject_out_of_range_shading(
        mut minimal_input: serde_json::Value,
        #[case] field: &str,
        #[case] value: f64,
    ) {
        minimal_input["shading"] = json!({ field: value });

        assert!(ingest(minimal_input).is_err());
    }

    #[rstest]
    #[case("latitude", 91.)]
    #[case("latitude", -90.5)]
    #[case("longitude", 181.)]
    fn should_reject_coordinates_off_the_globe(
        mut minimal_input: serde_json::Value,
        #[case] field: &str,
        #[case] value: f64,
    ) {
        minimal_input["project"][field] = json!(value);

        assert!(ingest(minimal_input).is_err());
    }

    #[rstest]
    fn should_reject_zero_objective_weights(mut minimal_input: serde_json::Value) {
        minimal_input["objectives"] = json!({"energy_weight": 0.0, "financial_weight": 0.0});

        assert!(ingest(minimal_input).is_err());
    }

    #[rstest]
    fn should_reject_unknown_fields(mut minimal_input: serde_json::Value) {
        minimal_input["genetic_algorithm"] = json!({"generations": 100});

        assert!(ingest(minimal_input).is_err());
    }

    #[rstest]
    fn should_parse_radiation_suitability_policy(mut minimal_input: serde_json::Value) {
        minimal_input["suitability"] =
            json!({"policy": "minimum_radiation", "min_annual_irradiance": 400.0});

        let input = ingest(minimal_input).unwrap();
        assert_eq!(
            input.suitability,
            SuitabilityPolicy::MinimumRadiation {
                min_annual_irradiance: 400.
            }
        );
    }

    #[rstest]
    fn should_convert_inline_building_elements(mut minimal_input: serde_json::Value) {
        minimal_input["building_elements"] = json!([
            {"id": "F-S", "type": "facade", "azimuth": 180.0, "area": 150.0},
            {"id": "G-N", "type": "window", "azimuth": 5.0, "area": 12.0, "tilt": 90.0}
        ]);

        let input = ingest(minimal_input).unwrap();
        let elements = input
            .building_elements
            .iter()
            .map(|element| element.to_element(&input.suitability).unwrap())
            .collect::<Vec<_>>();

        assert!(elements[0].pv_suitable);
        assert!(!elements[1].pv_suitable);
    }
}
