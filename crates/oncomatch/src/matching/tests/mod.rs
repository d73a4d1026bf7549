pub(crate) mod common;

mod cache;
mod engine;
mod scoring;
