pub mod app;
pub mod outbox;
