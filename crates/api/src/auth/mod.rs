//! Authentication primitives.
//!
//! - [`jwt`] -- access-token validation (and minting, for tests and tooling).
//!   Credential issuance lives outside this service; it only verifies tokens.

pub mod jwt;
