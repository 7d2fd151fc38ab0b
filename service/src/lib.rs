//! Ambient services shared by the streaming server: command line / environment
//! configuration and console logging.

pub mod config;
pub mod logging;
