pub mod critique;
pub mod draft;
pub mod error;
pub mod issue;
pub mod llm_config;
pub mod test_artifact;
pub mod view;
