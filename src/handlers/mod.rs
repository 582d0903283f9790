// ---------------------------------------------------------------------------
// handlers/ — HTTP handlers
// mod.rs re-exports all public items so `crate::handlers::*` paths stay flat.
// ---------------------------------------------------------------------------

pub(crate) mod system;
pub(crate) mod utilities;

pub use system::{health, readiness};
pub use utilities::{extract, fetch, format, secret_check};
