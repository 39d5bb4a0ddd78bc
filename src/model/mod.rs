pub mod backend;
pub mod registry;
