//! Request extractors: response negotiation and save bodies.

mod accept;
mod body;
pub use body::SaveBody;
