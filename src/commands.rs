pub mod calendar;
pub mod config;
pub mod exercise;
pub mod pr;
pub mod program;
pub mod session;
