//! StethoLink: patient-simulation sessions over HTTP, Telegram and WhatsApp.

pub mod api;
pub mod bot;
pub mod config;
pub mod simulation;
