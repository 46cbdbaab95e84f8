//! Locale handling for user-facing text: decimal formatting and the
//! fallback member name used when a profile has no display name.

/// Locales the service renders text for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    English,
    Vietnamese,
}

const MAX_FRACTION_DIGITS: usize = 3;

impl Locale {
    /// Best-effort parse of a language tag; unknown or empty tags fall back to English.
    pub fn from_tag(tag: &str) -> Self {
        let primary = tag
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match primary.as_str() {
            "vi" => Locale::Vietnamese,
            _ => Locale::English,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Locale::English => "en",
            Locale::Vietnamese => "vi",
        }
    }

    fn separators(&self) -> (char, char) {
        match self {
            Locale::English => (',', '.'),
            Locale::Vietnamese => ('.', ','),
        }
    }

    /// Generic greeting name for a member without a profile name.
    pub fn default_member_name(&self, brand: &str) -> String {
        match self {
            Locale::English => format!("{brand} member"),
            Locale::Vietnamese => format!("Thành viên {brand}"),
        }
    }

    /// Formats `value` with digit grouping and at most three fraction digits,
    /// trimming trailing zeros: `12345.5` renders as `12,345.5` in English.
    pub fn format_decimal(&self, value: f64) -> String {
        if !value.is_finite() {
            return value.to_string();
        }

        let (group_sep, decimal_sep) = self.separators();
        let rendered = format!("{:.*}", MAX_FRACTION_DIGITS, value.abs());
        let (int_part, frac_part) = rendered.split_once('.').unwrap_or((rendered.as_str(), ""));
        let frac_part = frac_part.trim_end_matches('0');

        let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
        for (idx, digit) in int_part.chars().enumerate() {
            if idx > 0 && (int_part.len() - idx) % 3 == 0 {
                grouped.push(group_sep);
            }
            grouped.push(digit);
        }

        let negative = value < 0.0 && (int_part != "0" || !frac_part.is_empty());
        let mut out = String::new();
        if negative {
            out.push('-');
        }
        out.push_str(&grouped);
        if !frac_part.is_empty() {
            out.push(decimal_sep);
            out.push_str(frac_part);
        }
        out
    }
}
