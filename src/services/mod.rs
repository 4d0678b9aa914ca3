pub mod llm;
pub mod notifier;
pub mod policy;
pub mod refinement;
