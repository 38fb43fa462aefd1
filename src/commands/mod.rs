pub mod analysis;
pub mod dataset;
pub mod export;
pub mod utility;
