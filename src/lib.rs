// src/lib.rs

//! Fare watch library: priced flight searches, trigger evaluation and alert
//! delivery for saved watches.

pub mod error;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod provider;
pub mod storage;
