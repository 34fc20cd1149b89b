#![cfg_attr(doc, warn(missing_docs))]
#![doc = include_str!("../README.md")]

pub mod emu;
pub mod expr;
pub mod plat;
pub mod wp;
