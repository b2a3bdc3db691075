//! Shared UI icons.

use console::Emoji;

// Outcomes
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static CLOCK: Emoji<'_, '_> = Emoji("⏱️  ", "[T]");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "*");

// Run flow
pub static PROGRESS: Emoji<'_, '_> = Emoji("📊 ", "[PROG]");
pub static RUNNING: Emoji<'_, '_> = Emoji("▶️  ", "[>]");
pub static PLUG: Emoji<'_, '_> = Emoji("🔌 ", "[WS]");
pub static PAUSE: Emoji<'_, '_> = Emoji("⏸️  ", "[..]");
pub static MONEY: Emoji<'_, '_> = Emoji("💰 ", "$");
