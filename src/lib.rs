//! Sheetpress Server
//!
//! Accepts an uploaded `.xlsx` spreadsheet over HTTP, rewrites its print
//! layout so pages fit the sheet width, converts it to PDF through an
//! external conversion engine, and delivers the result either inline or as
//! a time-limited presigned link to an S3-backed content-addressed cache.
//!
//! # Modules
//!
//! - `pipeline`: the per-request orchestrator (validate, stage, dedup,
//!   normalize, convert, deliver)
//! - `checksum`: streaming SHA-256 staging of uploads
//! - `normalize`: xlsx print-layout rewriting
//! - `convert`: external conversion engine invocation
//! - `cache` / `storage`: content-addressed PDF artifact cache

pub mod cache;
pub mod checksum;
pub mod config;
pub mod convert;
pub mod error;
pub mod html;
pub mod normalize;
pub mod pipeline;
pub mod routes;
pub mod state;
pub mod storage;
