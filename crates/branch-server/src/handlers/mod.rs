pub mod conversations;
pub mod generation;
pub mod health;
pub mod messages;
pub mod navigation;
