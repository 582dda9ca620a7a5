//! Agent Configuration Module
//!
//! Loads the agent configuration from TOML, with `${VAR}` expansion from the
//! environment and built-in defaults for every field.
//!
//! ## Loading Order
//!
//! 1. Explicit path (`--config`)
//! 2. `NETMON_CONFIG` environment variable (path to TOML file)
//! 3. `agent_config.toml` in the current working directory
//! 4. Built-in defaults
//!
//! The first candidate file that exists is used. If it cannot be read,
//! parsed or validated, loading fails rather than falling through.
//!
//! ## Usage
//!
//! ```ignore
//! let loaded = AgentConfig::load(args.config.as_deref())?;
//! loaded.log();
//! let config = loaded.config;
//! let interval = config.monitoring.interval();
//! ```

mod agent_config;
pub mod defaults;

pub use agent_config::*;
