// handlers/protected/mod.rs - handlers behind the session and CSRF layers
//
// Every handler receives the session's Actor as a request extension.

pub mod blocks;
pub mod boards;
pub mod boards_and_blocks;
