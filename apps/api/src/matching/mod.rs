//! Hybrid résumé/job matching: canonicalization, requirement extraction,
//! Boolean search simulation and channel-weighted scoring.

pub mod boolean;
pub mod drilldown;
pub mod handlers;
pub mod normalization;
pub mod open_vocab;
pub mod pipeline;
pub mod requirements;
pub mod scoring;
pub mod sections;
pub mod self_check;
pub mod tokenizer;
