pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod session_gate;
pub mod utils;
