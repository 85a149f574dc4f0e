use crate::core::pv_system::PVSystemSpec;
use crate::core::units::{sum_monthly, MONTHS_PER_YEAR};
use fsum::FSum;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct EnergyBalance {
    /// kWh
    pub annual_demand: f64,
    /// kWh
    pub annual_generation: f64,
    pub monthly_demand: [f64; 12],
    pub monthly_generation: [f64; 12],
    /// demand less generation per month; negative values are net export
    pub monthly_net_import: [f64; 12],
    pub net_import: f64,
    /// %
    pub self_sufficiency: f64,
}

/// Percentage of demand met by generation, capped at 100, and 0 where there is no demand.
pub fn self_sufficiency(generation: f64, demand: f64) -> f64 {
    if demand <= 0. {
        return 0.;
    }
    (generation / demand * 100.).clamp(0., 100.)
}

/// Compare generation from a set of PV systems against monthly demand.
///
/// Annual generation is spread across the months in proportion to each month's share of the
/// site's horizontal irradiation.
pub fn balance(
    monthly_demand: &[f64; 12],
    systems: &[PVSystemSpec],
    monthly_ghi: &[f64; 12],
) -> EnergyBalance {
    let annual_demand = sum_monthly(monthly_demand);
    let annual_generation =
        FSum::with_all(systems.iter().map(|system| system.annual_energy_kwh)).value();

    let total_ghi = sum_monthly(monthly_ghi);
    let monthly_generation: [f64; 12] = std::array::from_fn(|month| {
        if total_ghi > 0. {
            annual_generation * monthly_ghi[month] / total_ghi
        } else {
            annual_generation / MONTHS_PER_YEAR as f64
        }
    });
    let monthly_net_import: [f64; 12] =
        std::array::from_fn(|month| monthly_demand[month] - monthly_generation[month]);

    EnergyBalance {
        annual_demand,
        annual_generation,
        monthly_demand: *monthly_demand,
        monthly_generation,
        monthly_net_import,
        net_import: annual_demand - annual_generation,
        self_sufficiency: self_sufficiency(annual_generation, annual_demand),
    }
}
