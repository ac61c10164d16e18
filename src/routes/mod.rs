//! Routers grouped by access level. Access control is attached as a layer on
//! each group in `create_router`, never inside individual handlers.

/// Anonymous access: health, banner, registration, login and the catalog.
pub mod public;

/// Any authenticated, active account.
pub mod authenticated;

/// Staff only (`administrador` or `dueno`): user administration and catalog
/// management.
pub mod admin;
