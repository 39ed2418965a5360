//! moodmap: region-scoped public-mood mapping.
//!
//! Takes a free-text region, fans out to news and social sources, filters the
//! results down to posts about that region, classifies each post into one of
//! six emotions with an LLM, and renders the result as a GeoJSON feature
//! collection plus a per-emotion summary. A chat responder answers questions
//! grounded in that same evidence.

pub mod cache;
pub mod chat;
pub mod classify;
pub mod config;
pub mod error;
pub mod llm;
pub mod mapdata;
pub mod model;
pub mod pipeline;
pub mod region;
pub mod sources;
pub mod web;
