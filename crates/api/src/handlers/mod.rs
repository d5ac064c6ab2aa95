pub mod browse;
pub mod jobs;
pub mod simulations;
