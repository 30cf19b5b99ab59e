pub mod feature;
pub mod join;
pub mod overlay;
