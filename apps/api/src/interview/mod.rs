pub mod conversation;
pub mod extract;
pub mod handlers;
pub mod machine;
pub mod prompts;
pub mod questions;
pub mod registry;
pub mod runtime;
pub mod stages;
