#![doc = include_str!("RUSTDOC.md")]

pub mod app;

pub mod functions;

pub mod util;
