//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Remote watch constants
pub mod watch {
    /// Server-side long-poll wait per request (seconds)
    pub const WAIT_SECS: u64 = 600;

    /// Fixed delay after a failed long-poll before retrying (seconds)
    pub const RETRY_BACKOFF_SECS: u64 = 10;
}

/// HTTP/Network constants
pub mod network {
    /// Local request timeout (seconds). Must exceed `watch::WAIT_SECS`.
    pub const REQUEST_TIMEOUT_SECS: u64 = 1800;

    /// Maximum attempts when seeding the remote store
    pub const MAX_NETWORK_RETRIES: usize = 3;

    /// Base delay for seed retries (milliseconds)
    pub const BASE_DELAY_MS: u64 = 500;

    /// Header carrying the ACL token
    pub const TOKEN_HEADER: &str = "X-Consul-Token";
}

/// Document source constants
pub mod paths {
    /// Local override file, relative to the working directory
    pub const LOCAL_CONFIG_FILE: &str = "configuration.json";

    /// Default mounted secret holding the document
    pub const SECRETS_CONFIG_FILE: &str = "/run/secrets/configuration.json";

    /// Optional settings file for the manager itself
    pub const SETTINGS_FILE: &str = "cfgsync.toml";
}

/// Environment variable names
pub mod env {
    /// Remote store base URL (e.g. `http://localhost:8500/v1/kv`)
    pub const REMOTE_URL: &str = "consulUrl";

    /// Key holding the document in the remote store
    pub const REMOTE_KEY: &str = "consulConfigKey";

    /// Redirects the runtime document location
    pub const RUNTIME_CONFIG_PATH: &str = "runtimeConfigPath";

    /// Prefix for the manager's own settings
    pub const SETTINGS_PREFIX: &str = "CFGSYNC_";
}

/// Change notification constants
pub mod events {
    /// Broadcast channel capacity for `ConfigEvent` subscribers
    pub const CHANNEL_CAPACITY: usize = 256;
}
