mod probes;
mod results;
mod status;

pub use probes::{heartbeat, list_checks, register_probe};
pub use results::ingest_result;
pub use status::{health, status_page};
