//! HTTP Routes under `/systarest`

pub mod control;
pub mod status;
