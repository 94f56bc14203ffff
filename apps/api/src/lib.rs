//! ATS match simulator: transparent résumé/job scoring over a normalization
//! map, an open-vocabulary extractor and a Boolean search simulator.

pub mod config;
pub mod errors;
pub mod matching;
pub mod routes;
pub mod state;
