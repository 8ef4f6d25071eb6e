//! tpbuild-lib: third-party dependency build orchestration
//!
//! This crate builds a fixed set of C/C++ libraries from source archives
//! into a shared `stage/` tree:
//! - `recipe`: static per-target recipes and the ordered registry
//! - `tracker`: target selection and completion markers
//! - `acquire`: archive extraction, patching and source preparation
//! - `backend`: cmake, make, msbuild and script build strategies
//! - `stage`: copying headers and libraries into `stage/`
//! - `engine`: the sequential per-target pipeline

pub mod acquire;
pub mod backend;
pub mod clean;
pub mod config;
pub mod consts;
pub mod engine;
pub mod placeholder;
pub mod platform;
pub mod process;
pub mod recipe;
pub mod stage;
pub mod template;
pub mod tracker;
pub mod util;
