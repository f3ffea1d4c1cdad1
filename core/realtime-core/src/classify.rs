//! Coarse client classification used as the label dimension of join/leave counters.

use std::fmt;

use crate::patterns::{BROWSER_RULES, OS_RULES};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Browser {
    Chrome,
    Safari,
    Firefox,
    Other,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chrome => "Chrome",
            Browser::Safari => "Safari",
            Browser::Firefox => "Firefox",
            Browser::Other => "Other",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        match value {
            "Chrome" => Some(Browser::Chrome),
            "Safari" => Some(Browser::Safari),
            "Firefox" => Some(Browser::Firefox),
            "Other" => Some(Browser::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OperatingSystem {
    WindowsNt,
    MacOsX,
    Other,
}

impl OperatingSystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperatingSystem::WindowsNt => "Windows NT",
            OperatingSystem::MacOsX => "Mac OS X",
            OperatingSystem::Other => "Other",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        match value {
            "Windows NT" => Some(OperatingSystem::WindowsNt),
            "Mac OS X" => Some(OperatingSystem::MacOsX),
            "Other" => Some(OperatingSystem::Other),
            _ => None,
        }
    }
}

/// The (browser, os) pair a join or leave is counted under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientLabels {
    pub browser: Browser,
    pub os: OperatingSystem,
}

impl ClientLabels {
    pub const OTHER: ClientLabels = ClientLabels {
        browser: Browser::Other,
        os: OperatingSystem::Other,
    };

    pub fn new(browser: Browser, os: OperatingSystem) -> Self {
        Self { browser, os }
    }

    /// Snapshot key form, e.g. `Chrome_Windows NT`.
    pub fn key(&self) -> String {
        format!("{}_{}", self.browser.as_str(), self.os.as_str())
    }

    pub fn from_key(key: &str) -> Option<Self> {
        let (browser, os) = key.split_once('_')?;
        Some(Self {
            browser: Browser::from_label(browser)?,
            os: OperatingSystem::from_label(os)?,
        })
    }
}

impl fmt::Display for ClientLabels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Classifies a user-agent string. Absent or unrecognized input maps to `Other`.
pub fn classify_user_agent(user_agent: Option<&str>) -> ClientLabels {
    let Some(user_agent) = user_agent else {
        return ClientLabels::OTHER;
    };

    let browser = BROWSER_RULES
        .iter()
        .find(|(pattern, _)| pattern.is_match(user_agent))
        .map(|(_, browser)| *browser)
        .unwrap_or(Browser::Other);
    let os = OS_RULES
        .iter()
        .find(|(pattern, _)| pattern.is_match(user_agent))
        .map(|(_, os)| *os)
        .unwrap_or(OperatingSystem::Other);

    ClientLabels { browser, os }
}
