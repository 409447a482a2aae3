pub mod aspect;
pub mod chat;
pub mod conversation;
pub mod deferred;
pub mod events;
pub mod memory;
pub mod models;
pub mod prompts;
pub mod result;
pub mod tools;
