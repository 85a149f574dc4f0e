use crate::core::units::Azimuth360;
use crate::errors::BipvError;
use crate::input::SuitabilityPolicy;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

#[derive(Clone, Copy, Debug, Deserialize, Display, EnumString, Eq, Hash, PartialEq, Serialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum ElementType {
    #[strum(to_string = "facade", serialize = "wall", serialize = "walls")]
    Facade,
    #[strum(to_string = "window", serialize = "windows", serialize = "glazing")]
    Window,
}

#[derive(
    Clone, Copy, Debug, Deserialize, Display, EnumIter, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub enum Orientation {
    North,
    Northeast,
    East,
    Southeast,
    South,
    Southwest,
    West,
    Northwest,
}

impl Orientation {
    /// Classify an azimuth (clockwise from North) into one of eight 45 degree sectors centred on
    /// the cardinal and ordinal directions, e.g. South covers [157.5, 202.5).
    pub fn classify(azimuth: Azimuth360) -> Self {
        let sector = ((azimuth.angle() + 22.5).rem_euclid(360.) / 45.).floor() as usize;
        match sector {
            0 => Self::North,
            1 => Self::Northeast,
            2 => Self::East,
            3 => Self::Southeast,
            4 => Self::South,
            5 => Self::Southwest,
            6 => Self::West,
            _ => Self::Northwest,
        }
    }

    /// Orientations that receive enough sun to be worth considering for facade PV
    pub fn is_pv_orientation(&self) -> bool {
        matches!(
            self,
            Self::South | Self::Southeast | Self::Southwest | Self::East | Self::West
        )
    }

    pub fn is_south_facing(&self) -> bool {
        matches!(self, Self::South | Self::Southeast | Self::Southwest)
    }

    /// Fraction of the site's horizontal irradiation that reaches a surface with this orientation
    pub fn radiation_factor(&self) -> f64 {
        match self {
            Self::South => 0.95,
            Self::Southeast | Self::Southwest => 0.85,
            Self::East | Self::West => 0.75,
            Self::Northeast | Self::Northwest => 0.55,
            Self::North => 0.35,
        }
    }
}

/// Decide whether an element should be carried forward to radiation analysis.
///
/// With a minimum radiation policy only the orientation is checked here; the radiation threshold
/// is applied once annual irradiation has been calculated.
pub fn is_pv_suitable(
    orientation: Orientation,
    element_type: ElementType,
    area: f64,
    policy: &SuitabilityPolicy,
) -> bool {
    if !orientation.is_pv_orientation() {
        return false;
    }

    match policy {
        SuitabilityPolicy::MinimumArea {
            facade_min_area,
            window_min_area,
        } => match element_type {
            ElementType::Facade => area > *facade_min_area,
            ElementType::Window => area > *window_min_area,
        },
        SuitabilityPolicy::MinimumRadiation { .. } => true,
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct BuildingElement {
    pub id: String,
    pub element_type: ElementType,
    pub orientation: Orientation,
    pub azimuth: Azimuth360,
    /// m2
    pub area: f64,
    pub width: Option<f64>,
    pub height: Option<f64>,
    /// degrees from horizontal; facades and windows are vertical (90) unless stated
    pub tilt: f64,
    pub level: Option<String>,
    pub host_wall_id: Option<String>,
    pub pv_suitable: bool,
}

pub const VERTICAL_TILT: f64 = 90.;

/// The geometric description of an element before classification.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ElementGeometry {
    pub azimuth: f64,
    pub area: f64,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub tilt: Option<f64>,
    pub level: Option<String>,
    pub host_wall_id: Option<String>,
}

impl BuildingElement {
    /// Validate an element's geometry and classify its orientation and PV suitability.
    pub fn new(
        id: impl Into<String>,
        element_type: ElementType,
        geometry: ElementGeometry,
        policy: &SuitabilityPolicy,
    ) -> Result<Self, BipvError> {
        let id = id.into();
        let azimuth = Azimuth360::new(geometry.azimuth)?;

        if !geometry.area.is_finite() || geometry.area <= 0. {
            return Err(BipvError::invalid_input(format!(
                "element '{id}' must have a positive area, got {}",
                geometry.area
            )));
        }
        let tilt = geometry.tilt.unwrap_or(VERTICAL_TILT);
        if !(0. ..=180.).contains(&tilt) {
            return Err(BipvError::invalid_input(format!(
                "element '{id}' tilt must be between 0 and 180 degrees, got {tilt}"
            )));
        }

        let orientation = Orientation::classify(azimuth);

        Ok(Self {
            pv_suitable: is_pv_suitable(orientation, element_type, geometry.area, policy),
            id,
            element_type,
            orientation,
            azimuth,
            area: geometry.area,
            width: geometry.width,
            height: geometry.height,
            tilt,
            level: geometry.level,
            host_wall_id: geometry.host_wall_id,
        })
    }

    pub fn geometry(&self) -> ElementGeometry {
        ElementGeometry {
            azimuth: self.azimuth.angle(),
            area: self.area,
            width: self.width,
            height: self.height,
            tilt: Some(self.tilt),
            level: self.level.clone(),
            host_wall_id: self.host_wall_id.clone(),
        }
    }
}
