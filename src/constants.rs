//! # Constants and type definitions for platescale
//!
//! This module centralizes the **physical constants**, **conversion factors**, and **common type
//! definitions** used throughout the `platescale` library.
//!
//! ## Overview
//!
//! - Astronomical and geodetic constants (J2000 epoch, WGS84 ellipsoid)
//! - Unit conversions (degrees ↔ radians, arcseconds ↔ radians, days ↔ seconds)
//! - Core type aliases used across the crate

// -------------------------------------------------------------------------------------------------
// Physical constants and unit conversions
// -------------------------------------------------------------------------------------------------

/// 2π, useful for trigonometric conversions
pub const DPI: f64 = 2. * std::f64::consts::PI;

/// Number of seconds in a Julian day
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Astronomical Unit in kilometers (IAU 2012)
pub const AU: f64 = 149_597_870.7;

/// MJD epoch of J2000.0 (2000-01-01 12:00:00 TT)
pub const T2000: f64 = 51544.5;

/// Degrees → radians
pub const RADEG: f64 = std::f64::consts::PI / 180.0;

/// Arcseconds → radians
pub const RADSEC: f64 = std::f64::consts::PI / 648000.0;

/// Gaussian gravitational constant k, also the mean angular speed of the Earth in rad/day
pub const GAUSS_GRAV: f64 = 0.01720209895;

/// Speed of light in km/s
pub const VLIGHT: f64 = 2.99792458e5;

/// Speed of light in astronomical units per day
pub const VLIGHT_AU: f64 = VLIGHT / AU * SECONDS_PER_DAY;

/// Ratio of the sidereal day to the solar day
pub const SIDEREAL_RATE: f64 = 1.00273790934;

/// WGS84 semi-major axis in meters
pub const WGS84_A: f64 = 6_378_137.0;

/// WGS84 flattening
const WGS84_F: f64 = 1.0 / 298.257_223_563;

/// WGS84 semi-minor axis in meters
pub const WGS84_B: f64 = WGS84_A * (1.0 - WGS84_F);

/// WGS84 first eccentricity squared
pub const WGS84_E2: f64 = WGS84_F * (2.0 - WGS84_F);

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Angle in degrees
pub type Degree = f64;
/// Angle in arcseconds
pub type ArcSec = f64;
/// Angle in radians
pub type Radian = f64;
/// Distance in kilometers
pub type Kilometer = f64;
/// Distance in meters
pub type Meter = f64;
/// Modified Julian Date (days)
pub type MJD = f64;
