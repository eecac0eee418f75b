//! Retrieval-augmented recipe chat: a persistent vector index of recipes,
//! grounded prompt assembly and per-session conversation state, served over
//! a small HTTP API.

pub mod conversation;
pub mod core;
pub mod llm;
pub mod orchestrator;
pub mod rag;
pub mod server;
pub mod state;
pub mod vector_math;

#[cfg(test)]
mod test_support;
