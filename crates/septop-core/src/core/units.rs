//! Unit-bearing physical quantities.
//!
//! Every settings value with a physical dimension is stored as a [`Quantity`] that pairs a
//! magnitude with a unit of that dimension. Conversions are only possible within a dimension,
//! which is enforced at the type level by the [`Unit`] trait. Quantities serialize to and from
//! strings of the form `"<magnitude> <unit>"` (for example `"298.15 kelvin"` or `"2 fs"`).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UnitError {
    #[error("Cannot parse quantity '{0}': expected '<magnitude> <unit>'")]
    Malformed(String),

    #[error("Unknown {dimension} unit '{unit}'")]
    UnknownUnit {
        dimension: &'static str,
        unit: String,
    },
}

/// A unit belonging to a single physical dimension.
pub trait Unit: Copy + PartialEq + fmt::Debug {
    /// Human-readable name of the dimension, used in error messages.
    const DIMENSION: &'static str;

    /// Factor converting a magnitude expressed in this unit to the canonical unit of the dimension.
    fn scale(self) -> f64;

    fn symbol(self) -> &'static str;

    fn from_symbol(symbol: &str) -> Option<Self>;
}

macro_rules! unit_kind {
    (
        $(#[$meta:meta])*
        $name:ident, $dimension:literal {
            $($variant:ident => $scale:expr, $symbol:literal $(| $alias:literal)*;)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl Unit for $name {
            const DIMENSION: &'static str = $dimension;

            fn scale(self) -> f64 {
                match self {
                    $(Self::$variant => $scale),+
                }
            }

            fn symbol(self) -> &'static str {
                match self {
                    $(Self::$variant => $symbol),+
                }
            }

            fn from_symbol(symbol: &str) -> Option<Self> {
                match symbol {
                    $($symbol $(| $alias)* => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

unit_kind! {
    /// Molar energy. Canonical unit: kJ/mol.
    EnergyUnit, "energy" {
        KilojoulePerMole => 1.0, "kJ/mol" | "kilojoule_per_mole" | "kilojoule/mole";
        KilocaloriePerMole => 4.184, "kcal/mol" | "kilocalorie_per_mole" | "kilocalorie/mole";
    }
}

unit_kind! {
    /// Absolute temperature. Canonical unit: kelvin.
    TemperatureUnit, "temperature" {
        Kelvin => 1.0, "kelvin" | "K";
    }
}

unit_kind! {
    /// Pressure. Canonical unit: bar.
    PressureUnit, "pressure" {
        Bar => 1.0, "bar";
        Atmosphere => 1.01325, "atm" | "atmosphere";
    }
}

unit_kind! {
    /// Length. Canonical unit: nanometer.
    LengthUnit, "length" {
        Nanometer => 1.0, "nanometer" | "nm";
        Angstrom => 0.1, "angstrom" | "A";
    }
}

unit_kind! {
    /// Time. Canonical unit: picosecond.
    TimeUnit, "time" {
        Femtosecond => 1.0e-3, "fs" | "femtosecond";
        Picosecond => 1.0, "ps" | "picosecond";
        Nanosecond => 1.0e3, "ns" | "nanosecond";
    }
}

unit_kind! {
    /// Atomic mass. Canonical unit: dalton.
    MassUnit, "mass" {
        Amu => 1.0, "amu" | "dalton" | "Da";
    }
}

unit_kind! {
    /// Molar concentration. Canonical unit: molar.
    ConcentrationUnit, "concentration" {
        Molar => 1.0, "molar" | "M";
        Millimolar => 1.0e-3, "millimolar" | "mM";
    }
}

unit_kind! {
    /// Harmonic distance force constant. Canonical unit: kJ/mol/nm².
    DistanceForceConstantUnit, "distance force constant" {
        KilojoulePerMoleNm2 => 1.0, "kJ/mol/nm**2" | "kilojoule/(mole*nanometer**2)";
        KilocaloriePerMoleA2 => 418.4, "kcal/mol/A**2" | "kilocalorie/(mole*angstrom**2)";
    }
}

unit_kind! {
    /// Harmonic angular force constant. Canonical unit: kJ/mol/rad².
    AngularForceConstantUnit, "angular force constant" {
        KilojoulePerMoleRad2 => 1.0, "kJ/mol/rad**2" | "kilojoule/(mole*radian**2)";
        KilocaloriePerMoleRad2 => 4.184, "kcal/mol/rad**2" | "kilocalorie/(mole*radian**2)";
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantity<U: Unit> {
    magnitude: f64,
    unit: U,
}

pub type Energy = Quantity<EnergyUnit>;
pub type Temperature = Quantity<TemperatureUnit>;
pub type Pressure = Quantity<PressureUnit>;
pub type Length = Quantity<LengthUnit>;
pub type Time = Quantity<TimeUnit>;
pub type Mass = Quantity<MassUnit>;
pub type Concentration = Quantity<ConcentrationUnit>;
pub type DistanceForceConstant = Quantity<DistanceForceConstantUnit>;
pub type AngularForceConstant = Quantity<AngularForceConstantUnit>;

impl<U: Unit> Quantity<U> {
    pub const fn new(magnitude: f64, unit: U) -> Self {
        Self { magnitude, unit }
    }

    pub fn magnitude(&self) -> f64 {
        self.magnitude
    }

    pub fn unit(&self) -> U {
        self.unit
    }

    /// Returns the same quantity expressed in `unit`.
    pub fn to(&self, unit: U) -> Self {
        Self::new(self.magnitude_in(unit), unit)
    }

    pub fn magnitude_in(&self, unit: U) -> f64 {
        if unit == self.unit {
            self.magnitude
        } else {
            self.magnitude * self.unit.scale() / unit.scale()
        }
    }

    /// Magnitude in the canonical unit of the dimension.
    pub fn canonical(&self) -> f64 {
        self.magnitude * self.unit.scale()
    }
}

impl<U: Unit> fmt::Display for Quantity<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.magnitude, self.unit.symbol())
    }
}

impl<U: Unit> FromStr for Quantity<U> {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (magnitude, symbol) = trimmed
            .split_once(char::is_whitespace)
            .ok_or_else(|| UnitError::Malformed(s.to_string()))?;
        let magnitude: f64 = magnitude
            .parse()
            .map_err(|_| UnitError::Malformed(s.to_string()))?;
        let symbol = symbol.trim();
        let unit = U::from_symbol(symbol).ok_or_else(|| UnitError::UnknownUnit {
            dimension: U::DIMENSION,
            unit: symbol.to_string(),
        })?;
        Ok(Self::new(magnitude, unit))
    }
}

impl<U: Unit> Serialize for Quantity<U> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de, U: Unit> Deserialize<'de> for Quantity<U> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
