//! Route handlers

pub mod motion;
pub mod recording;
pub mod stream;
