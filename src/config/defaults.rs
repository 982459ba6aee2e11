/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Database defaults
pub const DEFAULT_DATABASE_URL: &str = "sqlite://./data/birdnet.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 3;

// Species cache defaults
pub const DEFAULT_SPECIES_CACHE_TTL_SECS: u64 = 24 * 60 * 60;
/// Large enough for the full eBird/BirdNET taxonomy in a single listing call
pub const DEFAULT_SPECIES_REFRESH_LIMIT: u64 = 50_000;
pub const DEFAULT_WARM_ON_STARTUP: bool = true;

// Station defaults
pub const DEFAULT_NODE_NAME: &str = "BirdNET-Go";
pub const DEFAULT_THRESHOLD: f64 = 0.8;
pub const DEFAULT_SENSITIVITY: f64 = 1.0;
