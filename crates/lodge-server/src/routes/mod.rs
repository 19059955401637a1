//! API routes.

pub mod info;
pub mod login;

pub use info::{InfoRequest, info_handler};
pub use login::{LoginRequest, LoginResponse, login_handler};
