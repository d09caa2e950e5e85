//! Route handlers. Each handler extracts, delegates to the controller, and
//! serializes; none of them makes a lifecycle decision.

pub mod circuits;
pub mod service;
pub mod transactions;
