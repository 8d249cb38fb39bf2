//! Core runtime: capture, decoding, normalization and the publish cycle.

pub mod capture;
pub mod executor;
pub mod normalizer;
pub mod parser;
pub mod reading;
pub mod value;
