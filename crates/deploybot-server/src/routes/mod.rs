pub mod detect;
pub mod environments;
pub mod health;
