use crate::core::building_element::{BuildingElement, Orientation};
use crate::core::weather::{annual_poa_irradiance, TypicalMeteorologicalYear};
use crate::errors::BipvError;
use crate::input::{ShadingInput, SuitabilityPolicy};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Correction from the irradiation on an optimally tilted plane to that on an unoptimised
/// vertical surface, applied by the simplified method only.
pub const VERTICAL_SURFACE_FACTOR: f64 = 0.8;

const MAX_TREE_SHADING: f64 = 0.5;
const MAX_BUILDING_SHADING: f64 = 0.3;

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct RadiationRecord {
    pub element_id: String,
    pub orientation: Orientation,
    /// kWh/m2/year
    pub annual_irradiance: f64,
    pub orientation_factor: f64,
    /// fraction of irradiation remaining after shading, 0 to 1
    pub shading_factor: f64,
}

/// Fraction of irradiation that remains once tree and building shading are taken off.
pub fn total_shading(shading: &ShadingInput) -> Result<f64, BipvError> {
    let ShadingInput {
        tree_shading,
        building_shading,
    } = *shading;

    if !(0. ..=MAX_TREE_SHADING).contains(&tree_shading) {
        return Err(BipvError::invalid_input(format!(
            "tree shading must be between 0 and {MAX_TREE_SHADING}, got {tree_shading}"
        )));
    }
    if !(0. ..=MAX_BUILDING_SHADING).contains(&building_shading) {
        return Err(BipvError::invalid_input(format!(
            "building shading must be between 0 and {MAX_BUILDING_SHADING}, got {building_shading}"
        )));
    }

    Ok(1. - (tree_shading + building_shading))
}

/// Annual irradiation on a vertical surface by the simplified method, in kWh/m2/year
///
/// Arguments:
/// * `base_ghi` - annual global horizontal irradiation at the site, in kWh/m2/year
/// * `orientation` - orientation of the surface
/// * `shading_factor` - fraction of irradiation remaining after shading, as from [`total_shading`]
pub fn annual_irradiance(base_ghi: f64, orientation: Orientation, shading_factor: f64) -> f64 {
    base_ghi * orientation.radiation_factor() * shading_factor * VERTICAL_SURFACE_FACTOR
}

/// Where the irradiation on each element comes from.
#[derive(Clone, Copy, Debug)]
pub enum RadiationSource<'a> {
    Simplified { annual_ghi: f64 },
    Hourly {
        tmy: &'a TypicalMeteorologicalYear,
        annual_ghi: f64,
        albedo: f64,
    },
}

#[derive(Debug)]
pub struct RadiationAggregator<'a> {
    source: RadiationSource<'a>,
    shading_factor: f64,
    min_annual_irradiance: Option<f64>,
}

impl<'a> RadiationAggregator<'a> {
    pub fn new(
        source: RadiationSource<'a>,
        shading: &ShadingInput,
        policy: &SuitabilityPolicy,
    ) -> Result<Self, BipvError> {
        let min_annual_irradiance = match policy {
            SuitabilityPolicy::MinimumRadiation {
                min_annual_irradiance,
            } => Some(*min_annual_irradiance),
            SuitabilityPolicy::MinimumArea { .. } => None,
        };

        Ok(Self {
            source,
            shading_factor: total_shading(shading)?,
            min_annual_irradiance,
        })
    }

    /// Produce one record per suitable element. Elements that are not PV suitable, or that fall
    /// below the radiation threshold of a minimum radiation policy, are left out of the result.
    pub fn analyse(&self, elements: &[BuildingElement]) -> Vec<RadiationRecord> {
        elements
            .iter()
            .filter(|element| element.pv_suitable)
            .map(|element| self.record_for(element))
            .filter(|record| match self.min_annual_irradiance {
                Some(threshold) if record.annual_irradiance < threshold => {
                    debug!(
                        element_id = %record.element_id,
                        annual_irradiance = record.annual_irradiance,
                        threshold,
                        "element below radiation threshold"
                    );
                    false
                }
                _ => true,
            })
            .collect()
    }

    fn record_for(&self, element: &BuildingElement) -> RadiationRecord {
        let (annual_irradiance, orientation_factor) = match self.source {
            RadiationSource::Simplified { annual_ghi } => (
                annual_irradiance(annual_ghi, element.orientation, self.shading_factor),
                element.orientation.radiation_factor(),
            ),
            RadiationSource::Hourly {
                tmy,
                annual_ghi,
                albedo,
            } => {
                let poa = annual_poa_irradiance(tmy, element.tilt, element.azimuth.angle(), albedo);
                let ratio = if annual_ghi > 0. { poa / annual_ghi } else { 0. };
                (poa * self.shading_factor, ratio)
            }
        };

        RadiationRecord {
            element_id: element.id.clone(),
            orientation: element.orientation,
            annual_irradiance,
            orientation_factor,
            shading_factor: self.shading_factor,
        }
    }
}
