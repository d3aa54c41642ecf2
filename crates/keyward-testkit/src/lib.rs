//! # Keyward Testkit
//!
//! Testing utilities for keyward.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: A fully initialized in-memory host with an owner and drives
//! - **Generators**: Proptest strategies for keys, permissions and circles
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use keyward_testkit::generators::{symmetric_key, CircleParams};
//!
//! proptest! {
//!     #[test]
//!     fn circle_requests_have_a_name(params: CircleParams) {
//!         prop_assert!(!params.to_request().name.is_empty());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use keyward_testkit::fixtures::TestHost;
//!
//! async fn example() {
//!     let host = TestHost::new().await;
//!     let connection = host.connect("frodo.example.com", &[]).await;
//!     host.host.validate(&connection.token.to_authentication_token()).await.unwrap();
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{connected_hosts, photos_drive, MemoryHost, TestHost};
pub use generators::{circle_from_params, CircleParams};
