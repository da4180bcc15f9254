// redline-common: shared types and utilities for the Redline workspace

pub mod diff;
pub mod intent;
pub mod path;
pub mod protocol;
pub mod types;
