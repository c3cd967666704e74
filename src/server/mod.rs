// Transport adapters for the control surface.
pub mod http;
