//! End-to-end scenarios for the bot pipeline with a scripted command runner

mod artifact_publish;
mod fail_fast;
mod helpers;
mod release_gating;
mod secrets;
mod trigger_matrix;
