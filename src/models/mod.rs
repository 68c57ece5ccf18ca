// src/models/mod.rs

pub mod attempt;
pub mod level;
pub mod progress;
pub mod ranking;
