pub mod dispositions;
pub mod sessions;
pub mod users;
pub mod waste_types;
pub mod wastes;
