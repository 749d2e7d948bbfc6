pub mod chat;
pub mod report;
pub mod setup;
pub mod ui;
