pub mod tavily;
pub mod wikipedia;

pub use tavily::{TavilyVerification, TavilyVerifier};
pub use wikipedia::WikipediaClient;
