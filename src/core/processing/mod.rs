pub mod composite;
pub mod stretch;
