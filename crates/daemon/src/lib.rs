// redline-daemon: document automation daemon with a staged edit pipeline.
//
// Edits move through plan → preview → apply. Nothing touches a document
// on disk until the apply stage has cleared every gate.

pub mod config;
pub mod engine;
pub mod errors;
pub mod ledger;
pub mod locator;
pub mod pipeline;
pub mod registry;
pub mod rpc;
pub mod runtime;
pub mod security;
pub mod startup;
pub mod storage;
