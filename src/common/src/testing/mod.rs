//! Test utilities for the rotator.
//!
//! This module is only available when the `testing` feature is enabled or during tests:
//!
//! ```toml
//! [dev-dependencies]
//! common = { path = "../common", features = ["testing"] }
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use common::testing::TestConfigBuilder;
//!
//! let config = TestConfigBuilder::new()
//!     .with_log_path(dir.path().join("mongod.log"))
//!     .with_archive()
//!     .build();
//! ```

mod config_builder;

pub use config_builder::TestConfigBuilder;
