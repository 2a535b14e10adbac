//! Typed views of the few payloads the client inspects itself
//!
//! Most endpoints hand their payload back as raw JSON; only route types and
//! single routes are decoded, since other calls depend on their fields.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Transport mode as numbered by the API (`route_type`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RouteKind {
    /// Metropolitan train
    Train,
    /// Tram
    Tram,
    /// Bus (metropolitan, regional and SkyBus)
    Bus,
    /// V/Line regional train and coach
    VLine,
    /// Night bus
    NightBus,
}

impl RouteKind {
    /// Numeric `route_type` code
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::Train => 0,
            Self::Tram => 1,
            Self::Bus => 2,
            Self::VLine => 3,
            Self::NightBus => 4,
        }
    }

    /// Mode for a numeric `route_type` code
    #[must_use]
    pub const fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Train),
            1 => Some(Self::Tram),
            2 => Some(Self::Bus),
            3 => Some(Self::VLine),
            4 => Some(Self::NightBus),
            _ => None,
        }
    }
}

impl fmt::Display for RouteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Train => "Train",
            Self::Tram => "Tram",
            Self::Bus => "Bus",
            Self::VLine => "Vline",
            Self::NightBus => "Night Bus",
        };
        f.write_str(name)
    }
}

/// Entry of the `route_types` listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteType {
    /// Numeric mode code
    pub route_type: u32,
    /// Human-readable mode name
    pub route_type_name: String,
}

/// A single route as returned by `routes/{route_id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Route identifier
    pub route_id: u64,
    /// Numeric mode code
    pub route_type: u32,
    /// Route name, e.g. "Upfield"
    pub route_name: String,
    /// Public route number (empty for trains)
    #[serde(default)]
    pub route_number: Option<String>,
    /// GTFS identifier
    #[serde(default)]
    pub route_gtfs_id: Option<String>,
}

impl Route {
    /// Mode of this route, if the code is known
    #[must_use]
    pub const fn kind(&self) -> Option<RouteKind> {
        RouteKind::from_code(self.route_type)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.route_number.as_deref().filter(|n| !n.is_empty()) {
            Some(number) => write!(f, "{number} {} (#{})", self.route_name, self.route_id),
            None => write!(f, "{} (#{})", self.route_name, self.route_id),
        }
    }
}
