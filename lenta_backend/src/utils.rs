//! Shared helpers and constants.

use chrono::{DateTime, Utc};

pub const APP_NAME: &str = "lenta_backend";

pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

pub fn print_banner() {
    println!("{APP_NAME} v{}", env!("CARGO_PKG_VERSION"));
}
