//! Execution: turning a detected route into settled on-chain trades.
//!
//! [`batch`] holds the leg and batch state machines, [`verifier`] proves
//! cross-chain finality, [`orchestrator`] sequences legs and applies the
//! abort policy, and [`audit`] keeps the authoritative history.

pub mod audit;
pub mod batch;
pub mod orchestrator;
pub mod verifier;
