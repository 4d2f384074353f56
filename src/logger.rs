//! `env_logger` setup with a default filter when `RUST_LOG` is unset.

use env_logger::Env;

pub const DEFAULT_FILTER: &str = "info,actix_web=info,postgres=warn,tokio_postgres=warn";

pub fn init() {
    env_logger::Builder::from_env(Env::default().default_filter_or(DEFAULT_FILTER)).init();
}
