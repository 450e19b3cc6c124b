pub mod gas;
pub mod utils;
