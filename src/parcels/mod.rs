pub mod index;
pub mod resolver;
pub mod risk;
