use crate::core::solar_position::SolarPosition;

pub const DEFAULT_GROUND_ALBEDO: f64 = 0.2;

/// Calculate the plane-of-array irradiance on a tilted surface, in W/m2
///
/// Uses an isotropic sky: the direct beam is projected onto the surface, the sky diffuse is scaled
/// by the view factor to the sky and the ground reflected component by the view factor to the
/// ground.
///
/// Arguments:
/// * `ghi` - global horizontal irradiance, in W/m2
/// * `dni` - direct normal irradiance, in W/m2
/// * `dhi` - diffuse horizontal irradiance, in W/m2
/// * `solar_position` - position of the sun
/// * `surface_tilt` - tilt of the surface from horizontal, 0 (horizontal) to 90 (vertical), in degrees
/// * `surface_azimuth` - azimuth of the surface normal, clockwise from North, in degrees
/// * `albedo` - solar reflectivity of the ground, 0 to 1
pub fn poa_irradiance(
    ghi: f64,
    dni: f64,
    dhi: f64,
    solar_position: &SolarPosition,
    surface_tilt: f64,
    surface_azimuth: f64,
    albedo: f64,
) -> f64 {
    let tilt = surface_tilt.to_radians();

    let direct = if solar_position.is_above_horizon() {
        dni.max(0.) * cos_incidence(solar_position, surface_tilt, surface_azimuth)
    } else {
        0.
    };
    let diffuse = dhi.max(0.) * (1. + tilt.cos()) / 2.;
    let ground_reflected = ghi.max(0.) * albedo * (1. - tilt.cos()) / 2.;

    (direct + diffuse + ground_reflected).max(0.)
}

/// Cosine of the angle between the solar beam and the surface normal, clamped so that a surface
/// facing away from the sun receives no beam radiation.
pub fn cos_incidence(solar_position: &SolarPosition, surface_tilt: f64, surface_azimuth: f64) -> f64 {
    let zenith = solar_position.zenith.to_radians();
    let tilt = surface_tilt.to_radians();
    let relative_azimuth = (solar_position.azimuth - surface_azimuth).to_radians();

    (zenith.sin() * tilt.sin() * relative_azimuth.cos() + zenith.cos() * tilt.cos()).max(0.)
}
