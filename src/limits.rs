/// Longest resource id a store will key on, in bytes.
pub const MAX_RESOURCE_ID_LEN: usize = 256;

/// Stores refuse further inserts on a resource past this many reservations.
pub const MAX_RESERVATIONS_PER_RESOURCE: usize = 100_000;

/// Upper bound on how many rooms a single availability sweep may check.
pub const MAX_CANDIDATES: usize = 1_000;
