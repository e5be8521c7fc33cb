//! Chat front ends. Telegram and WhatsApp share one command handler.

pub mod commands;
pub mod telegram;
pub mod whatsapp;

pub use commands::{spawn_pruner, BotHandler, Command};
pub use whatsapp::WhatsAppBridge;
