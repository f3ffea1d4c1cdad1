//! Compiled regex rules for classifying user agents.
//!
//! Rules are tried in order and the first match wins. Update these when new
//! client families need their own label.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::classify::{Browser, OperatingSystem};

// ═══════════════════════════════════════════════════════════════════════════════
// Browser Rules
// ═══════════════════════════════════════════════════════════════════════════════

// Rule order decides, not token position: an agent mentioning both Safari and
// Chrome is Chrome wherever the tokens appear. Chrome and Edge user agents also
// mention Safari, so Chrome must come first.
pub static BROWSER_RULES: Lazy<Vec<(Regex, Browser)>> = Lazy::new(|| {
    vec![
        (Regex::new(r"Chrome").unwrap(), Browser::Chrome),
        (Regex::new(r"Firefox").unwrap(), Browser::Firefox),
        (Regex::new(r"Safari").unwrap(), Browser::Safari),
    ]
});

// ═══════════════════════════════════════════════════════════════════════════════
// Operating System Rules
// ═══════════════════════════════════════════════════════════════════════════════

pub static OS_RULES: Lazy<Vec<(Regex, OperatingSystem)>> = Lazy::new(|| {
    vec![
        (Regex::new(r"Windows NT").unwrap(), OperatingSystem::WindowsNt),
        (Regex::new(r"Mac OS X").unwrap(), OperatingSystem::MacOsX),
    ]
});
