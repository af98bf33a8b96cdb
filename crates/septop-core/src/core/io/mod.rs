//! Persistent storage produced by multistate sampling.

pub mod storage;
