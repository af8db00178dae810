//! Lectora - capture printed text with a camera and read it aloud.
//!
//! The crate is organized around the capture-to-speech pipeline:
//! - [`camera`]: capture capability (file-backed or external command)
//! - [`normalize`]: resize/recompress before caching and upload
//! - [`cache`]: bounded on-disk cache of normalized images
//! - [`ocr`]: remote text recognition (Google Vision)
//! - [`speech`]: speech synthesis and single-utterance playback
//! - [`pipeline`]: the state machine tying the stages together

#![allow(clippy::should_implement_trait)]

pub mod cache;
pub mod camera;
pub mod config;
pub mod models;
pub mod normalize;
pub mod ocr;
pub mod pipeline;
pub mod speech;
