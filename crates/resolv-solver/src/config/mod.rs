//! Resolver configuration
//!
//! Holds the default [`Flags`](crate::Flags), channel order, search limits and
//! the network settings used by repository data providers.
//!
//! # Configuration Sources (in priority order, highest to lowest)
//!
//! 1. Environment variables (`RESOLV_*`)
//! 2. A JSON configuration file
//! 3. Built-in defaults
//!
//! # Example
//!
//! ```rust,no_run
//! use resolv_solver::config::{Config, ConfigLoader};
//! use resolv_solver::{Pool, Request};
//! use std::path::Path;
//!
//! let config = Config::build(Some(Path::new("/etc/resolv.json")), &ConfigLoader::new(true)).unwrap();
//!
//! let mut pool = Pool::new();
//! config.apply_to_pool(&mut pool);
//!
//! let request = Request::with_flags(config.request_flags());
//! println!("Solving with at most {} steps", config.solve_budget().max_steps);
//! # let _ = request;
//! ```

mod config;
mod network;
mod source;

pub use config::{ChannelPriority, Config, ConfigError, SolverConfig};
pub use network::{NetworkConfig, SslVerify};
pub(crate) use network::select_proxy;
pub use source::{ConfigLoader, ConfigSource};
