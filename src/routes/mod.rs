/// Router Module Index
///
/// Organizes the application's routing logic into security-segregated modules,
/// enforcing a Defense-in-Depth strategy. This structure ensures that
/// access control is applied explicitly at the module level (via Axum layers),
/// preventing accidental exposure of protected endpoints.
///
/// The four modules map directly to the access tiers.

/// Routes accessible to all callers (anonymous included): the identity
/// lifecycle endpoints and the public platform counters.
pub mod public;

/// Routes protected by the `AuthUser` extractor middleware.
/// Requires a validated session or bearer token.
pub mod authenticated;

/// Routes restricted to the 'Moderator' and 'Admin' roles: the catalog
/// resource sub-API.
pub mod moderator;

/// Routes restricted exclusively to the 'Admin' role: role management.
pub mod admin;
