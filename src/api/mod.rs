pub mod dashboard;
pub mod devices;
pub mod middleware;
pub mod ping;
