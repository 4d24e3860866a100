//! Board model for the CrayOn FPGA accelerator.
//!
//! This crate has **no dependencies** and **no hardware access**. It is a pure
//! model of the board as seen from the host: the size of the on-board working
//! tile, the fixed USB payloads, the FX2-LP bridge identifiers and vendor
//! commands, and the request codes the FPGA firmware understands.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`memory`] | Working tile size, send/receive payload sizes |
//! | [`usb`] | FX2-LP vendor/product IDs, endpoints, vendor commands, timeouts |
//! | [`request`] | Control request codes, loader chunking, settle delays |

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod memory;
pub mod request;
pub mod usb;
