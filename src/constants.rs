//! Physical constants in cgs units.

/// Gravitational constant, cm^3 g^-1 s^-2.
pub const GRAVITY: f64 = 6.672e-8;

/// Boltzmann constant, erg/K.
pub const BOLTZMANN: f64 = 1.38066e-16;

/// Proton mass, g.
pub const PROTONMASS: f64 = 1.6726e-24;

/// Stefan-Boltzmann constant, erg cm^-2 s^-1 K^-4.
pub const STEFAN_BOLTZMANN: f64 = 5.670373e-5;

/// Speed of light, cm/s.
pub const LIGHTSPEED: f64 = 2.99792458e10;

/// Hubble constant for h = 1, s^-1 (100 km/s/Mpc).
pub const HUBBLE: f64 = 3.2407789e-18;

/// Primordial hydrogen mass fraction.
pub const HYDROGEN_MASSFRAC: f64 = 0.76;

/// Helium-to-hydrogen number density ratio implied by the primordial
/// mass fractions.
pub const YHELIUM: f64 = (1.0 - HYDROGEN_MASSFRAC) / (4.0 * HYDROGEN_MASSFRAC);

/// Adiabatic index of a monatomic ideal gas, minus one.
pub const GAMMA_MINUS1: f64 = 5.0 / 3.0 - 1.0;
