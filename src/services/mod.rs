/// Business logic between the HTTP handlers and the store

pub mod accounts;
pub mod content;
