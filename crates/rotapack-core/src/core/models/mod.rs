pub mod assignment;
pub mod pose;
