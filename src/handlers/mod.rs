pub mod guidance;
pub mod health;
pub mod history;
