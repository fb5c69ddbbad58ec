pub mod analytics;
pub mod experiments;
pub mod recommendation;
