#![allow(dead_code)]

#[path = "../../src/synth.rs"]
pub mod synth;
