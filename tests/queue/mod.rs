pub mod retries;
pub mod workers;
