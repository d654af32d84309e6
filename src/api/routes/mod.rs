pub mod alerts;
pub mod control;
pub mod evaluate;
pub mod health;
