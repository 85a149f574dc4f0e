pub mod building_element;
pub mod energy_balance;
pub mod financial;
pub mod optimisation;
pub mod pv_system;
pub mod radiation;
pub mod solar_position;
pub mod surface_irradiance;
pub mod units;
pub mod weather;
