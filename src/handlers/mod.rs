// handlers/mod.rs - two handler tiers
//
// Public (no session): service info and health.
// Protected (session + CSRF header): everything under /api/v1.
pub mod protected;
pub mod public;
