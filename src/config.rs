//! Application configuration, loaded from environment variables or
//! default values.
//!
//! All knobs use the `CAGE_PACKER_` prefix and are read once at startup;
//! invalid values fall back to their defaults with a warning.

use std::env;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use log::warn;

use crate::scoring::ScoreWeights;
use crate::types::Vec3;

/// Complete application configuration.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub solver: SolverConfig,
    pub cage: CageDefaults,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment
    /// variables.
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            solver: SolverConfig::from_env(),
            cage: CageDefaults::from_env(),
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
}

impl ApiConfig {
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_PORT: u16 = 8080;

    fn from_env() -> Self {
        let host_value =
            env_string("CAGE_PACKER_API_HOST").unwrap_or_else(|| Self::DEFAULT_HOST.to_string());
        let (bind_ip, effective_host) = match host_value.parse::<IpAddr>() {
            Ok(ip) => (ip, host_value),
            Err(err) => {
                warn!(
                    "could not parse CAGE_PACKER_API_HOST ('{}'): {}. Using {}.",
                    host_value,
                    err,
                    Self::DEFAULT_HOST
                );
                (
                    Self::DEFAULT_HOST
                        .parse::<IpAddr>()
                        .expect("default host must be valid"),
                    Self::DEFAULT_HOST.to_string(),
                )
            }
        };

        let port = match env_string("CAGE_PACKER_API_PORT") {
            Some(raw) => match raw.parse::<u16>() {
                Ok(value) if value != 0 => value,
                Ok(_) => {
                    warn!(
                        "CAGE_PACKER_API_PORT must not be 0. Using {}.",
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
                Err(err) => {
                    warn!(
                        "could not parse CAGE_PACKER_API_PORT ('{}'): {}. Using {}.",
                        raw,
                        err,
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
            },
            None => Self::DEFAULT_PORT,
        };

        Self {
            bind_ip,
            display_host: effective_host,
            port,
        }
    }

    /// Socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Visible hostname for logging and hints.
    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    /// Configured port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Indicates whether binding to all interfaces.
    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }
}

/// Default cage geometry used when `/start_packing` omits the fields.
#[derive(Clone, Copy, Debug)]
pub struct CageDefaults {
    pub dimensions: Vec3,
    pub weight_limit: f64,
}

impl CageDefaults {
    pub const DEFAULT_DIMENSIONS: Vec3 = Vec3::new(100.0, 100.0, 150.0);
    pub const DEFAULT_WEIGHT_LIMIT: f64 = 300.0;

    fn from_env() -> Self {
        let dimensions = match env_string("CAGE_PACKER_CAGE_DIMENSIONS") {
            Some(raw) => parse_dimensions(&raw).unwrap_or_else(|| {
                warn!(
                    "could not parse CAGE_PACKER_CAGE_DIMENSIONS ('{}'), expected 'LxWxH'. \
                     Using default.",
                    raw
                );
                Self::DEFAULT_DIMENSIONS
            }),
            None => Self::DEFAULT_DIMENSIONS,
        };

        let weight_limit = load_f64(
            "CAGE_PACKER_CAGE_WEIGHT_LIMIT",
            Self::DEFAULT_WEIGHT_LIMIT,
            |v| v > 0.0,
            "must be greater than 0",
        );

        Self {
            dimensions,
            weight_limit,
        }
    }
}

fn parse_dimensions(raw: &str) -> Option<Vec3> {
    let parts: Vec<f64> = raw
        .split(['x', 'X', ','])
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .ok()?;
    match parts.as_slice() {
        [l, w, h] if *l > 0.0 && *w > 0.0 && *h > 0.0 => Some(Vec3::new(*l, *w, *h)),
        _ => None,
    }
}

/// Configuration for the packing decision core.
///
/// Carries the physical tolerances of the robotic cell and the search
/// parameters of the MCTS packer.
#[derive(Clone, Copy, Debug)]
pub struct SolverConfig {
    /// Vision measurement error added to every item dimension (cm).
    pub measurement_error: f64,
    /// Minimum fraction of an item's footprint that must be supported.
    pub stability_factor: f64,
    /// Height tolerance for grouping support surfaces.
    pub merge_margin: f64,
    /// Weight of the height term in the placement score.
    pub w_z_score: f64,
    /// Fraction of the floor in which the center of gravity must stay.
    pub safety_margin_ratio: f64,
    /// Capacity of the temp buffer next to the conveyor.
    pub temp_area_capacity: usize,
    /// Number of conveyor items visible to the packer.
    pub lookahead_depth: usize,
    /// MCTS iteration budget.
    pub num_simulations: usize,
    /// Maximum number of items placed per rollout.
    pub rollout_depth: usize,
    /// Exploration constant of the UCT formula.
    pub uct_c: f64,
    /// Number of independent MCTS trees; 1 keeps the search fully
    /// single-threaded and deterministic per seed.
    pub parallel_trees: usize,
}

impl SolverConfig {
    pub const DEFAULT_MEASUREMENT_ERROR: f64 = 3.0;
    pub const DEFAULT_STABILITY_FACTOR: f64 = 0.75;
    pub const DEFAULT_MERGE_MARGIN: f64 = 1e-6;
    pub const DEFAULT_W_Z_SCORE: f64 = 1.0;
    pub const DEFAULT_SAFETY_MARGIN_RATIO: f64 = 0.8;
    pub const DEFAULT_TEMP_AREA_CAPACITY: usize = 3;
    pub const DEFAULT_LOOKAHEAD_DEPTH: usize = 3;
    pub const DEFAULT_NUM_SIMULATIONS: usize = 200;
    pub const DEFAULT_UCT_C: f64 = 1.41;
    pub const DEFAULT_PARALLEL_TREES: usize = 1;

    /// Creates a builder for custom configuration.
    pub fn builder() -> SolverConfigBuilder {
        SolverConfigBuilder::default()
    }

    /// Scoring weights derived from this configuration.
    pub fn score_weights(&self) -> ScoreWeights {
        ScoreWeights {
            w_z: self.w_z_score,
        }
    }

    fn from_env() -> Self {
        let measurement_error = load_f64(
            "CAGE_PACKER_MEASUREMENT_ERROR",
            Self::DEFAULT_MEASUREMENT_ERROR,
            |v| v >= 0.0,
            "must not be negative",
        );
        let stability_factor = load_f64(
            "CAGE_PACKER_STABILITY_FACTOR",
            Self::DEFAULT_STABILITY_FACTOR,
            |v| (0.0..=1.0).contains(&v),
            "must be between 0 and 1",
        );
        let merge_margin = load_f64(
            "CAGE_PACKER_MERGE_MARGIN",
            Self::DEFAULT_MERGE_MARGIN,
            |v| v > 0.0,
            "must be greater than 0",
        );
        let w_z_score = load_f64(
            "CAGE_PACKER_W_Z_SCORE",
            Self::DEFAULT_W_Z_SCORE,
            |v| v > 0.0,
            "must be greater than 0",
        );
        let safety_margin_ratio = load_f64(
            "CAGE_PACKER_SAFETY_MARGIN_RATIO",
            Self::DEFAULT_SAFETY_MARGIN_RATIO,
            |v| (0.0..=1.0).contains(&v),
            "must be between 0 and 1",
        );
        let temp_area_capacity = load_usize(
            "CAGE_PACKER_TEMP_AREA_CAPACITY",
            Self::DEFAULT_TEMP_AREA_CAPACITY,
        );
        let lookahead_depth = load_usize(
            "CAGE_PACKER_LOOKAHEAD_DEPTH",
            Self::DEFAULT_LOOKAHEAD_DEPTH,
        );
        let num_simulations = load_usize(
            "CAGE_PACKER_NUM_SIMULATIONS",
            Self::DEFAULT_NUM_SIMULATIONS,
        );
        let rollout_depth =
            load_usize("CAGE_PACKER_ROLLOUT_DEPTH", temp_area_capacity + 1);
        let uct_c = load_f64(
            "CAGE_PACKER_UCT_C",
            Self::DEFAULT_UCT_C,
            |v| v >= 0.0,
            "must not be negative",
        );
        let parallel_trees = load_usize(
            "CAGE_PACKER_PARALLEL_TREES",
            Self::DEFAULT_PARALLEL_TREES,
        )
        .max(1);

        Self {
            measurement_error,
            stability_factor,
            merge_margin,
            w_z_score,
            safety_margin_ratio,
            temp_area_capacity,
            lookahead_depth,
            num_simulations,
            rollout_depth,
            uct_c,
            parallel_trees,
        }
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            measurement_error: Self::DEFAULT_MEASUREMENT_ERROR,
            stability_factor: Self::DEFAULT_STABILITY_FACTOR,
            merge_margin: Self::DEFAULT_MERGE_MARGIN,
            w_z_score: Self::DEFAULT_W_Z_SCORE,
            safety_margin_ratio: Self::DEFAULT_SAFETY_MARGIN_RATIO,
            temp_area_capacity: Self::DEFAULT_TEMP_AREA_CAPACITY,
            lookahead_depth: Self::DEFAULT_LOOKAHEAD_DEPTH,
            num_simulations: Self::DEFAULT_NUM_SIMULATIONS,
            rollout_depth: Self::DEFAULT_TEMP_AREA_CAPACITY + 1,
            uct_c: Self::DEFAULT_UCT_C,
            parallel_trees: Self::DEFAULT_PARALLEL_TREES,
        }
    }
}

/// Builder for custom solver configurations.
#[derive(Clone, Debug, Default)]
pub struct SolverConfigBuilder {
    config: SolverConfig,
}

impl SolverConfigBuilder {
    pub fn measurement_error(mut self, value: f64) -> Self {
        self.config.measurement_error = value;
        self
    }

    pub fn stability_factor(mut self, value: f64) -> Self {
        self.config.stability_factor = value;
        self
    }

    pub fn merge_margin(mut self, value: f64) -> Self {
        self.config.merge_margin = value;
        self
    }

    pub fn w_z_score(mut self, value: f64) -> Self {
        self.config.w_z_score = value;
        self
    }

    pub fn safety_margin_ratio(mut self, value: f64) -> Self {
        self.config.safety_margin_ratio = value;
        self
    }

    pub fn temp_area_capacity(mut self, value: usize) -> Self {
        self.config.temp_area_capacity = value;
        self.config.rollout_depth = value + 1;
        self
    }

    pub fn lookahead_depth(mut self, value: usize) -> Self {
        self.config.lookahead_depth = value;
        self
    }

    pub fn num_simulations(mut self, value: usize) -> Self {
        self.config.num_simulations = value;
        self
    }

    pub fn rollout_depth(mut self, value: usize) -> Self {
        self.config.rollout_depth = value;
        self
    }

    pub fn uct_c(mut self, value: f64) -> Self {
        self.config.uct_c = value;
        self
    }

    pub fn parallel_trees(mut self, value: usize) -> Self {
        self.config.parallel_trees = value.max(1);
        self
    }

    pub fn build(self) -> SolverConfig {
        self.config
    }
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            warn!("access to {} failed: {}. Using default value.", name, err);
            None
        }
    }
}

fn load_f64(
    var_name: &str,
    default: f64,
    validator: impl Fn(f64) -> bool,
    invalid_hint: &str,
) -> f64 {
    match env_string(var_name) {
        Some(raw) => match raw.parse::<f64>() {
            Ok(value) if validator(value) => value,
            Ok(value) => {
                warn!(
                    "{} contains invalid value '{}': {}. Using {}.",
                    var_name, value, invalid_hint, default
                );
                default
            }
            Err(err) => {
                warn!(
                    "could not parse {} ('{}') as number: {}. Using {}.",
                    var_name, raw, err, default
                );
                default
            }
        },
        None => default,
    }
}

fn load_usize(var_name: &str, default: usize) -> usize {
    match env_string(var_name) {
        Some(raw) => match raw.parse::<usize>() {
            Ok(value) => value,
            Err(err) => {
                warn!(
                    "could not parse {} ('{}') as integer: {}. Using {}.",
                    var_name, raw, err, default
                );
                default
            }
        },
        None => default,
    }
}
