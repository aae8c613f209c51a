//! Stable exit codes for converge CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid flags, unknown names or conflicting options; nothing was changed.
pub const INVALID: i32 = 1;
/// Configuration, state store, bootstrap, engine or kubeconfig failure.
pub const FAILED: i32 = 2;
/// The engine run was cancelled.
pub const CANCELLED: i32 = 130;
