#![no_std]

pub mod env;
pub mod identity;
pub mod markers;
pub mod paths;
pub mod session;
