pub mod generate;
pub mod token;
pub mod version;
