//! Cross-device QR login.
//!
//! A browser calls `POST /api/qrlogin/generate` and shows the returned QR
//! code. A phone scans it, opens the confirmation page, and confirms. The
//! browser polls `GET /api/qrlogin/status/{id}` until the session reads
//! `Confirmed`. The session state lives in [`login::LoginSessionStore`].

pub mod config;
pub mod gateway;
pub mod login;
pub mod qr;

pub use config::Config;
pub use login::{LoginError, LoginSession, LoginSessionStore, LoginStatus};
