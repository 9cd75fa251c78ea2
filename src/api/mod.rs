// =============================================================================
// HTTP + WebSocket surface
// =============================================================================

pub mod rest;
pub mod ws;
