pub mod cli;
pub mod config;
pub mod cursor;
pub mod journal;
pub mod normalize;
pub mod service;
pub mod shipper;
