pub mod chat;
pub mod worker;
