//! Centralized limits and thresholds.
//!
//! Every bound that guards against pathological inputs lives here so the
//! caps are auditable in one place.

/// Maximum iterations of a fixed-point transform before the runner gives up.
///
/// Alias cycles the inliner fails to recognize would otherwise loop forever.
pub const MAX_FIXED_POINT_ITERATIONS: usize = 100;

/// Maximum scope-chain walks during binding resolution.
pub const MAX_SCOPE_WALK: usize = 10_000;

/// Maximum attempts when generating a fresh unique identifier.
pub const MAX_UID_ATTEMPTS: usize = 10_000;

/// Diagnostic previews of rendered code are truncated past this length.
pub const CODE_PREVIEW_MAX: usize = 100;
