mod common;

mod catalog;
mod comparison;
mod corrective;
mod evaluation;
mod orchestration;
mod report;
mod routing;
mod service;
mod store;
