pub mod reports;
pub mod session;
pub mod users;
pub mod waste_config;
pub mod wastes;
