pub mod auth;
pub mod categories;
pub mod health;
pub mod live;
pub mod panels;
pub mod settings;
pub mod tickets;
pub mod toggles;
pub mod webhook;
