#![allow(missing_docs, dead_code)]
//! Shared benchmark support: runtimes and echo servers.

pub mod harness;
