// Fake-news generation for detector research.
// Strategies, style/domain resolution, prompt assembly and output cleanup.
// All LLM calls go through llm_client.

pub mod generator;
pub mod handlers;
pub mod prompts;
pub mod strategies;
pub mod tone;
