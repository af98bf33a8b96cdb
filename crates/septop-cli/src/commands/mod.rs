pub mod gather;
pub mod plan;
pub mod settings;
