//! Core domain types and logic.

pub mod bar;
pub mod series;
pub mod num;
pub mod indicator;
pub mod position;
pub mod record;
pub mod rule;
pub mod rule_parser;
pub mod rule_eval;
pub mod rule_builder;
pub mod strategy;
pub mod runner;
pub mod criteria;
pub mod config_validation;
pub mod error;
