pub mod account;
pub mod data;
pub mod sharing;
