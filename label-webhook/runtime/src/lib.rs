#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use label_webhook_core as core;

mod admission;
mod args;
mod metrics;

pub use self::{
    admission::{Admission, Error},
    args::Args,
    metrics::AdmissionMetrics,
};
