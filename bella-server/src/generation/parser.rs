//! Record parsing and entry assembly
//!
//! Turns `Day | Activity | Script | Visual | Caption | Hashtags | Time | CTA | ImagePrompt`
//! text into a [`CalendarEntry`]. Parsing never fails: missing or blank fields
//! are filled with niche/city-derived defaults.

use bella_common::calendar::{CalendarEntry, ContentSource, RECORD_FIELD_COUNT};

use super::fallback::{hashtag_token, primary_niche};

/// Split a record into trimmed fields with newlines flattened
pub fn split_fields(record: &str) -> Vec<String> {
    record
        .trim()
        .split('|')
        .map(|field| field.replace(['\n', '\r'], " ").trim().to_string())
        .collect()
}

/// Pick the record line out of a free-text service response
///
/// Services sometimes wrap the record in prose or echo the header row. The
/// first line with enough separators that is not the header is used; when no
/// line qualifies the whole response is returned.
pub fn extract_record(response: &str) -> &str {
    response
        .lines()
        .map(str::trim)
        .filter(|line| line.matches('|').count() >= RECORD_FIELD_COUNT - 1)
        .find(|line| !is_header_row(line))
        .unwrap_or_else(|| response.trim())
}

fn is_header_row(line: &str) -> bool {
    let fields = split_fields(line);
    fields.len() >= 2
        && fields[0].eq_ignore_ascii_case("day")
        && fields[1].eq_ignore_ascii_case("activity")
}

/// Whether a response carries a complete record
pub fn is_complete(response: &str) -> bool {
    let record = extract_record(response);
    !record.is_empty() && split_fields(record).len() >= RECORD_FIELD_COUNT
}

/// Assemble an entry for `day`, padding missing fields with defaults
///
/// The day number always comes from the caller; the text of the first field
/// is not trusted. Fields past the ninth are ignored.
pub fn parse_record(
    record: &str,
    day: u32,
    niche: &str,
    city: &str,
    source: ContentSource,
) -> CalendarEntry {
    let fields = split_fields(record);
    let field = |idx: usize, default: String| -> String {
        fields
            .get(idx)
            .filter(|value| !value.is_empty())
            .cloned()
            .unwrap_or(default)
    };

    let niche_tag = hashtag_token(primary_niche(niche));
    let city_tag = hashtag_token(city);

    CalendarEntry {
        day,
        activity: field(1, "Social media post".to_string()),
        script: field(2, format!("Professional {} content", niche)),
        visual: field(3, "Professional visual".to_string()),
        caption: field(4, format!("Quality {} in {}", niche, city)),
        hashtags: field(5, format!("#{} #{}", niche_tag, city_tag)),
        time_slot: field(6, "Peak hours".to_string()),
        call_to_action: field(7, "Book now".to_string()),
        image_prompt: field(8, format!("Professional {} business in {}", niche, city)),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_record() {
        let entry = parse_record(
            "Day 2 | Tutorial | Learn this | Close-up | Great caption | #Hair | Morning | DM us | Salon photo",
            2,
            "hair",
            "Austin",
            ContentSource::Ai,
        );
        assert_eq!(entry.day, 2);
        assert_eq!(entry.activity, "Tutorial");
        assert_eq!(entry.call_to_action, "DM us");
        assert_eq!(entry.image_prompt, "Salon photo");
        assert_eq!(entry.source, ContentSource::Ai);
    }

    #[test]
    fn test_parse_pads_short_record() {
        let entry = parse_record("Day 5 | Reel | Hello", 5, "nails", "Reno", ContentSource::Ai);
        assert_eq!(entry.day, 5);
        assert_eq!(entry.activity, "Reel");
        assert_eq!(entry.script, "Hello");
        assert_eq!(entry.visual, "Professional visual");
        assert_eq!(entry.caption, "Quality nails in Reno");
        assert_eq!(entry.hashtags, "#Nails #Reno");
        assert_eq!(entry.time_slot, "Peak hours");
        assert_eq!(entry.call_to_action, "Book now");
        assert_eq!(entry.image_prompt, "Professional nails business in Reno");
    }

    #[test]
    fn test_parse_fills_blank_fields() {
        let entry = parse_record(" | | | | | | | | ", 1, "spa", "Boise", ContentSource::Fallback);
        assert_eq!(entry.activity, "Social media post");
        assert_eq!(entry.script, "Professional spa content");
    }

    #[test]
    fn test_parse_ignores_day_text_and_extra_fields() {
        let entry = parse_record(
            "Day 99 | A | B | C | D | E | F | G | H | extra",
            3,
            "hair",
            "Austin",
            ContentSource::Ai,
        );
        assert_eq!(entry.day, 3);
        assert_eq!(entry.image_prompt, "H");
    }

    #[test]
    fn test_parse_flattens_newlines() {
        let entry = parse_record("Day 1 | Multi\nline | x", 1, "hair", "Austin", ContentSource::Ai);
        assert_eq!(entry.activity, "Multi line");
    }

    #[test]
    fn test_extract_record_skips_prose_and_header() {
        let response = "Here is your post:\n\
            Day | Activity | Script | Visual | Caption | Hashtags | Time | CTA | Prompt\n\
            Day 1 | Reel | Hi | Shot | Cap | #Tag | Morning | Book | Image\n";
        assert_eq!(
            extract_record(response),
            "Day 1 | Reel | Hi | Shot | Cap | #Tag | Morning | Book | Image"
        );
        assert!(is_complete(response));
    }

    #[test]
    fn test_short_response_is_incomplete() {
        assert!(!is_complete("Day 1 | Reel | Hi"));
        assert!(!is_complete(""));
        assert!(!is_complete("I cannot help with that."));
    }
}
