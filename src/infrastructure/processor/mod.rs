//! # Payment Processor
//!
//! Port and adapters for the external processor that moves money.
//!
//! - [`PaymentProcessor`]: the port
//! - [`HttpPaymentProcessor`]: JSON-over-HTTP adapter
//! - [`SimulatedPaymentProcessor`]: scripted in-process adapter

pub mod error;
pub mod http;
pub mod simulated;
pub mod traits;

pub use error::{ProcessorError, ProcessorResult};
pub use http::HttpPaymentProcessor;
pub use simulated::{SimulatedBehavior, SimulatedPaymentProcessor};
pub use traits::{
    PaymentProcessor, PayoutSubmission, ProcessorCallback, ProcessorOutcome, ProcessorStatus,
};
