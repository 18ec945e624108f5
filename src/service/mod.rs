//! ResourceController: the per-request operations on top of the enrichers.

mod controller;
mod validation;
pub use controller::{template_name, ResourceController, ResourceRequest};
pub use validation::{FieldErrors, RequestValidator};
