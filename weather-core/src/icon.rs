use serde::{Deserialize, Serialize};

/// Presentation icon for an OpenWeather icon code such as `"01d"` or `"09n"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IconCategory {
    Sun,
    Moon,
    Cloud,
    CloudRain,
    CloudDrizzle,
    CloudLightning,
    CloudSnow,
    /// Fallback for codes outside the known vocabulary.
    HelpCircle,
}

impl IconCategory {
    pub fn from_code(code: &str) -> Self {
        match code {
            "01d" => IconCategory::Sun,
            "01n" => IconCategory::Moon,
            "02d" | "02n" | "03d" | "03n" | "04d" | "04n" | "50d" | "50n" => IconCategory::Cloud,
            "09d" | "09n" => IconCategory::CloudRain,
            "10d" | "10n" => IconCategory::CloudDrizzle,
            "11d" | "11n" => IconCategory::CloudLightning,
            "13d" | "13n" => IconCategory::CloudSnow,
            _ => IconCategory::HelpCircle,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IconCategory::Sun => "sun",
            IconCategory::Moon => "moon",
            IconCategory::Cloud => "cloud",
            IconCategory::CloudRain => "cloud-rain",
            IconCategory::CloudDrizzle => "cloud-drizzle",
            IconCategory::CloudLightning => "cloud-lightning",
            IconCategory::CloudSnow => "cloud-snow",
            IconCategory::HelpCircle => "help-circle",
        }
    }
}

impl std::fmt::Display for IconCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
