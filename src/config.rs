use crate::cosmology::Cosmology;
use crate::physics::math::Scalar;
use crate::units::UnitsToCgs;
use log::{info, warn};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct SimulationConfig {
    pub gravity: GravityConfig,
    pub cooling: CoolingConfig,
    pub timestep: TimestepConfig,
    pub cosmology: Cosmology,
    pub units: UnitsToCgs,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct GravityConfig {
    pub gravitational_constant: Scalar,
    /// Periodic box side in code units; non-positive disables wrapping.
    pub boxsize: Scalar,
    /// Barnes-Hut opening angle; zero selects the relative criterion.
    pub err_tol_theta: Scalar,
    /// Force-accuracy tolerance for the relative opening criterion.
    pub err_tol_force_acc: Scalar,
    /// Short-range cutoff radius (TreePM split), code units.
    pub rcut: Scalar,
    /// Long-range/short-range split scale, code units.
    pub asmth: Scalar,
    /// Comoving softening per particle type.
    pub softening: [Scalar; 6],
    /// Maximum physical softening per particle type.
    pub softening_max_phys: [Scalar; 6],
}

impl Default for GravityConfig {
    fn default() -> Self {
        Self {
            gravitational_constant: 43007.1,
            boxsize: 0.0,
            err_tol_theta: 0.5,
            err_tol_force_acc: 0.005,
            rcut: 4.5,
            asmth: 1.25,
            softening: [0.05; 6],
            softening_max_phys: [0.05; 6],
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CoolingConfig {
    pub cooling_on: bool,
    /// Path to the whitespace-delimited ionizing background table.
    /// Empty means primordial cooling is disabled.
    pub tree_cool_file: String,
    /// Empty means metal cooling is disabled.
    pub metal_cool_file: String,
    /// Empty means the UV background is spatially uniform.
    pub uv_fluctuation_file: String,
    pub min_gas_temp: Scalar,
}

impl Default for CoolingConfig {
    fn default() -> Self {
        Self {
            cooling_on: true,
            tree_cool_file: String::new(),
            metal_cool_file: String::new(),
            uv_fluctuation_file: String::new(),
            min_gas_temp: 5.0,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TimestepConfig {
    pub time_begin: Scalar,
    pub time_max: Scalar,
    /// Requested output scale factors, ascending.
    pub output_times: Vec<Scalar>,
    /// Fraction of the total particle count that must accumulate force
    /// updates before a new domain decomposition is required.
    pub tree_domain_update_frequency: Scalar,
}

impl Default for TimestepConfig {
    fn default() -> Self {
        Self {
            time_begin: 0.02,
            time_max: 1.0,
            output_times: Vec::new(),
            tree_domain_update_frequency: 0.1,
        }
    }
}

impl SimulationConfig {
    /// Load configuration from a file, falling back to defaults if the file doesn't exist
    pub fn load_or_default(path: &str) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    warn!("Failed to parse config file {}: {}. Using defaults.", path, e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("Config file {} not found. Using defaults.", path);
                Self::default()
            }
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
