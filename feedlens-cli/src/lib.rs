//! Feedlens command-line front end and offline mock LLM

pub mod cli;
pub mod mock_llm;
