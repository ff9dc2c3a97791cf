//! Calendar data types
//!
//! A calendar is the ordered list of per-day post ideas produced for one
//! business. Entries are immutable once assembled and the calendar only
//! accepts the next contiguous day number.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Hard upper bound on the number of days in one calendar
pub const MAX_CALENDAR_DAYS: u32 = 30;

/// Number of pipe-delimited fields in a generated record
///
/// Day | Activity | Script | Visual | Caption | Hashtags | Time | CTA | ImagePrompt
pub const RECORD_FIELD_COUNT: usize = 9;

/// Where the content of an entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentSource {
    /// Text-generation service response
    Ai,
    /// Deterministic template rotation
    Fallback,
    /// Last-resort content substituted after an unexpected failure
    Emergency,
}

impl ContentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentSource::Ai => "ai",
            ContentSource::Fallback => "fallback",
            ContentSource::Emergency => "emergency",
        }
    }
}

/// One day of a content calendar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEntry {
    pub day: u32,
    pub activity: String,
    pub script: String,
    pub visual: String,
    pub caption: String,
    pub hashtags: String,
    #[serde(rename = "time")]
    pub time_slot: String,
    #[serde(rename = "cta")]
    pub call_to_action: String,
    #[serde(rename = "ai_prompt")]
    pub image_prompt: String,
    pub source: ContentSource,
}

impl CalendarEntry {
    /// Signature used to detect near-duplicate entries within one calendar
    pub fn signature(&self) -> String {
        content_signature(&self.activity, &self.script)
    }
}

/// Build the signature for an activity/script pair
///
/// Lowercased activity joined to the lowercased first 30 characters of the
/// script.
pub fn content_signature(activity: &str, script: &str) -> String {
    let prefix: String = script.chars().take(30).collect();
    format!("{}_{}", activity.to_lowercase(), prefix.to_lowercase())
}

/// A niche/city pair for batch generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Business {
    #[serde(default = "default_niche")]
    pub niche: String,
    #[serde(default = "default_city")]
    pub city: String,
}

fn default_niche() -> String {
    "business".to_string()
}

fn default_city() -> String {
    "local".to_string()
}

/// Ordered calendar for one (niche, city, days) request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Calendar {
    pub niche: String,
    pub city: String,
    entries: Vec<CalendarEntry>,
}

impl Calendar {
    pub fn new(niche: impl Into<String>, city: impl Into<String>) -> Self {
        Self {
            niche: niche.into(),
            city: city.into(),
            entries: Vec::new(),
        }
    }

    /// Append the next day
    ///
    /// Rejects entries whose day number is not exactly one past the last
    /// entry, and anything past [`MAX_CALENDAR_DAYS`].
    pub fn push(&mut self, entry: CalendarEntry) -> Result<()> {
        let expected = self.next_day();
        if entry.day != expected {
            return Err(Error::InvalidInput(format!(
                "Calendar expected day {}, got day {}",
                expected, entry.day
            )));
        }
        if entry.day > MAX_CALENDAR_DAYS {
            return Err(Error::InvalidInput(format!(
                "Calendar cannot exceed {} days",
                MAX_CALENDAR_DAYS
            )));
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Day number the next pushed entry must carry
    pub fn next_day(&self) -> u32 {
        self.entries.len() as u32 + 1
    }

    pub fn entries(&self) -> &[CalendarEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<CalendarEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries produced by the text-generation service
    pub fn ai_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.source == ContentSource::Ai)
            .count()
    }

    /// Summary label stored with persisted calendars: "ai", "fallback" or "mixed"
    pub fn generation_method(&self) -> &'static str {
        let ai = self.ai_count();
        if ai == 0 {
            "fallback"
        } else if ai == self.entries.len() {
            "ai"
        } else {
            "mixed"
        }
    }

    /// Percentage of requested days that produced an entry
    pub fn success_rate(&self, requested_days: u32) -> f64 {
        if requested_days == 0 {
            return 0.0;
        }
        self.entries.len() as f64 / requested_days as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(day: u32, source: ContentSource) -> CalendarEntry {
        CalendarEntry {
            day,
            activity: "Behind the Scenes".to_string(),
            script: "See what makes our salon special in Austin".to_string(),
            visual: "Studio photo".to_string(),
            caption: "Caption".to_string(),
            hashtags: "#Salon".to_string(),
            time_slot: "Morning".to_string(),
            call_to_action: "Book now".to_string(),
            image_prompt: "Salon interior".to_string(),
            source,
        }
    }

    #[test]
    fn test_push_accepts_contiguous_days() {
        let mut calendar = Calendar::new("hair", "Austin");
        for day in 1..=3 {
            calendar.push(entry(day, ContentSource::Fallback)).unwrap();
        }
        let days: Vec<u32> = calendar.entries().iter().map(|e| e.day).collect();
        assert_eq!(days, vec![1, 2, 3]);
    }

    #[test]
    fn test_push_rejects_gap_and_duplicate() {
        let mut calendar = Calendar::new("hair", "Austin");
        calendar.push(entry(1, ContentSource::Ai)).unwrap();
        assert!(calendar.push(entry(1, ContentSource::Ai)).is_err());
        assert!(calendar.push(entry(3, ContentSource::Ai)).is_err());
        assert_eq!(calendar.len(), 1);
    }

    #[test]
    fn test_push_rejects_past_max_days() {
        let mut calendar = Calendar::new("hair", "Austin");
        for day in 1..=MAX_CALENDAR_DAYS {
            calendar.push(entry(day, ContentSource::Fallback)).unwrap();
        }
        assert!(calendar
            .push(entry(MAX_CALENDAR_DAYS + 1, ContentSource::Fallback))
            .is_err());
    }

    #[test]
    fn test_generation_method_summary() {
        let mut calendar = Calendar::new("nails", "Reno");
        assert_eq!(calendar.generation_method(), "fallback");
        calendar.push(entry(1, ContentSource::Ai)).unwrap();
        assert_eq!(calendar.generation_method(), "ai");
        calendar.push(entry(2, ContentSource::Fallback)).unwrap();
        assert_eq!(calendar.generation_method(), "mixed");
        assert!((calendar.success_rate(4) - 50.0).abs() < f64::EPSILON);
        assert_eq!(calendar.success_rate(0), 0.0);
    }

    #[test]
    fn test_signature_uses_script_prefix() {
        let sig = content_signature("Client Love", "Client love from the heart of Springfield and beyond");
        assert_eq!(sig, "client love_client love from the heart of ");
    }

    #[test]
    fn test_entry_json_field_names() {
        let json = serde_json::to_value(entry(1, ContentSource::Ai)).unwrap();
        assert_eq!(json["time"], "Morning");
        assert_eq!(json["cta"], "Book now");
        assert_eq!(json["ai_prompt"], "Salon interior");
        assert_eq!(json["source"], "ai");
    }

    #[test]
    fn test_business_defaults() {
        let business: Business = serde_json::from_str("{}").unwrap();
        assert_eq!(business.niche, "business");
        assert_eq!(business.city, "local");
    }
}
