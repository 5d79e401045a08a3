//! Status labels and display colors shared by charts, legends and maps

// Chemical status
pub const NORMAL: &str = "#1e8449";
pub const CAUTION: &str = "#ff9800";
pub const POOR: &str = "#e74c3c";
pub const ABOVE_NORMAL: &str = "#5e35b1";
pub const BELOW_NORMAL: &str = "#f57c00";

// Five-step ramp for fish integrity classes and habitat grades
pub const RAMP_BEST: &str = "#2e7d32";
pub const RAMP_GOOD: &str = "#66bb6a";
pub const RAMP_MIDDLE: &str = "#ffca28";
pub const RAMP_LOW: &str = "#f57c00";
pub const RAMP_WORST: &str = "#c62828";

// Macroinvertebrate condition
pub const NON_IMPAIRED: &str = "#1e8449";
pub const SLIGHTLY_IMPAIRED: &str = "#7cb342";
pub const MODERATELY_IMPAIRED: &str = "#ff9800";
pub const SEVERELY_IMPAIRED: &str = "#e74c3c";

pub const UNKNOWN: &str = "gray";

pub const STATUS_UNKNOWN: &str = "Unknown";
pub const STATUS_NORMAL: &str = "Normal";
pub const STATUS_CAUTION: &str = "Caution";
pub const STATUS_POOR: &str = "Poor";
pub const STATUS_ABOVE_NORMAL: &str = "Above Normal (Basic/Alkaline)";
pub const STATUS_BELOW_NORMAL: &str = "Below Normal (Acidic)";
