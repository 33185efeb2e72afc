// Tunnel UI
// Keeps a tunnel front-end in step with the tunnel service

pub mod app;
pub mod conf;
pub mod constants;
pub mod control;
pub mod errors;
pub mod settings;
pub mod tasks;
pub mod ui;
