//! Route handlers

pub mod index;
