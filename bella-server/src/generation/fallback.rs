//! Deterministic fallback content
//!
//! Produces 9-field pipe-delimited records from fixed candidate lists when the
//! text-generation service is unavailable or returns unusable output. Every
//! list is indexed with `(day - 1) mod len`, so the same inputs always yield
//! the same record.
//!
//! Two rotations exist:
//! - [`template_record`]: niche-adaptive templates, one rotation per field
//! - [`diverse_record`]: themed templates that advance past signatures already
//!   used earlier in the same calendar (bounded at [`MAX_COLLISION_RETRIES`])

use bella_common::calendar::{content_signature, RECORD_FIELD_COUNT};
use std::collections::HashSet;

/// Signatures already used within one calendar
pub type SignatureSet = HashSet<String>;

/// Attempts made to step past a used signature before accepting a repeat
pub const MAX_COLLISION_RETRIES: usize = 10;

/// Brand handle embedded in every image prompt
pub const BRAND_HANDLE: &str = "@salonsuitedigitalstudio";

/// Used when nothing else produced a usable record
pub const FINAL_FALLBACK_RECORD: &str = "Day 1 | Professional Service | Quality service available | Professional content | Book your appointment today! | #Professional #Local #Service | Peak hours | Call now | Professional business setup";

const BEAUTY_KEYWORDS: [&str; 8] = [
    "hair",
    "nail",
    "beauty",
    "salon",
    "spa",
    "microblading",
    "lash",
    "brow",
];

const TEMPLATE_TIMES: [&str; 8] = [
    "Morning (9-11am)",
    "Afternoon (2-4pm)",
    "Evening (6-8pm)",
    "Peak hours (10am-2pm)",
    "Weekend mornings",
    "Lunch break (12-1pm)",
    "After work (5-7pm)",
    "Early evening",
];

const TEMPLATE_CTAS: [&str; 8] = [
    "Book your appointment today!",
    "DM us to get started!",
    "Call now to schedule!",
    "Visit our website to book!",
    "Limited slots available!",
    "Book your consultation!",
    "Transform today!",
    "Schedule your session!",
];

const DIVERSE_TIMES: [&str; 6] = [
    "Peak hours",
    "Morning sessions",
    "Afternoon appointments",
    "Evening slots",
    "Weekend availability",
    "Flexible scheduling",
];

const DIVERSE_CTAS: [&str; 8] = [
    "Book your transformation!",
    "Schedule today!",
    "Call now!",
    "DM to book!",
    "Limited availability!",
    "Transform with us!",
    "Your appointment awaits!",
    "Book consultation!",
];

/// Remove characters that would break the record format
pub fn sanitize(value: &str) -> String {
    value
        .replace('|', "/")
        .replace(['\n', '\r'], " ")
        .trim()
        .to_string()
}

/// Title-case each whitespace-separated word
pub fn title_case(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(|c| c.to_lowercase()))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Hashtag-safe token: title-cased words with everything but letters and digits removed
pub fn hashtag_token(value: &str) -> String {
    title_case(value)
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// First niche of a comma-separated list
pub fn primary_niche(niche: &str) -> &str {
    niche.split(',').next().map(str::trim).unwrap_or(niche)
}

/// Whether the niche belongs to the beauty vertical
pub fn is_beauty_niche(niche: &str) -> bool {
    let lower = niche.to_lowercase();
    BEAUTY_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

fn rotate<T: AsRef<str>>(items: &[T], day: u32) -> &str {
    let idx = (day.max(1) as usize - 1) % items.len();
    items[idx].as_ref()
}

/// Join the nine fields into a record
fn join_record(fields: [&str; RECORD_FIELD_COUNT]) -> String {
    fields.join(" | ")
}

/// Niche-adaptive template rotation
pub fn template_record(niche: &str, city: &str, day: u32) -> String {
    let niche = sanitize(niche);
    let city = sanitize(city);
    let niche_title = title_case(&niche);

    let activities = [
        format!("{} showcase", niche_title),
        format!("{} tutorial", niche_title),
        format!("{} process video", niche_title),
        format!("Client {} experience", niche),
        format!("Behind-the-scenes {}", niche),
        format!("{} transformation", niche_title),
        format!("Professional {} work", niche),
        format!("{} techniques", niche_title),
        format!("Quality {} service", niche),
        format!("{} consultation", niche_title),
    ];
    let scripts = [
        format!("Experience exceptional {} quality and service", niche),
        format!("See our professional {} expertise in action", niche),
        format!("Your {} goals are our priority in {}", niche, city),
        format!("Professional {} services that exceed expectations", niche),
        format!("Behind the scenes of our {} process", niche),
        format!("Transform your {} experience with our experts", niche),
        format!("Quality {} services you can trust", niche),
        format!("Watch our {} professionals at work", niche),
        format!("Exceptional {} results for {} clients", niche, city),
        format!("Your satisfaction is our {} mission", niche),
    ];
    let visuals = [
        format!("High-quality {} photography", niche),
        format!("Professional {} video content", niche),
        format!("Before and after {} results", niche),
        "Process documentation".to_string(),
        "Client satisfaction moments".to_string(),
        format!("Detail shots of {} work", niche),
        "Professional workspace".to_string(),
        format!("Quality {} equipment", niche),
    ];
    let captions = [
        format!("Ready for exceptional {} service in {}? We deliver quality results every time!", niche, city),
        format!("Your {} experience matters to us. Book your {} appointment today!", niche, city),
        format!("Excellence in {} services, right here in {}. Experience the difference!", niche, city),
        format!("Professional {} solutions tailored for you. Welcome to quality service!", niche),
        format!("Transform your {} needs with our expert team in {}!", niche, city),
    ];

    let niche_tag = hashtag_token(primary_niche(&niche));
    let city_tag = hashtag_token(&city);
    let (image_prompt, location_tags) = if is_beauty_niche(&niche) {
        (
            format!(
                "Professional {} salon interior in {} with modern aesthetic, natural lighting, premium equipment, and '{}' subtly visible on signage, reflection, or background element",
                niche, city, BRAND_HANDLE
            ),
            format!("#{}Salon #{}Beauty #Local{}", city_tag, city_tag, niche_tag),
        )
    } else {
        (
            format!(
                "Professional {} business interior in {} with modern aesthetic, natural lighting, quality setup, and '{}' subtly visible on signage, reflection, or background element",
                niche, city, BRAND_HANDLE
            ),
            format!("#{}Business #{}{} #Local{}", city_tag, city_tag, niche_tag, niche_tag),
        )
    };
    let hashtags = format!(
        "#{niche} #{city}{niche} #Professional{niche} #{city}Business #{city}Local {location}",
        niche = niche_tag,
        city = city_tag,
        location = location_tags
    );

    let day_label = format!("Day {}", day);
    join_record([
        day_label.as_str(),
        rotate(&activities, day),
        rotate(&scripts, day),
        rotate(&visuals, day),
        rotate(&captions, day),
        hashtags.as_str(),
        rotate(&TEMPLATE_TIMES, day),
        rotate(&TEMPLATE_CTAS, day),
        image_prompt.as_str(),
    ])
}

struct Theme {
    activities: [&'static str; 5],
    scripts: [String; 3],
}

fn themes(niche: &str, city: &str) -> [Theme; 5] {
    [
        Theme {
            activities: [
                "Amazing Transformation Tuesday",
                "Makeover Magic",
                "Before & After Reveal",
                "Client Glow-Up Story",
                "Confidence Transformation",
            ],
            scripts: [
                format!("Watch this incredible {} transformation in {}", niche, city),
                format!("From ordinary to extraordinary - {} magic happens here", niche),
                format!("This {} client's transformation will inspire you", city),
            ],
        },
        Theme {
            activities: [
                "Tutorial Thursday",
                "Technique Breakdown",
                "Pro Tips Friday",
                "Educational Content",
                "How-To Guide",
            ],
            scripts: [
                format!("Learn professional {} techniques from our {} experts", niche, city),
                format!("Master these {} tips for amazing results", niche),
                format!("Behind-the-scenes {} education", niche),
            ],
        },
        Theme {
            activities: [
                "Behind the Scenes",
                "Day in the Life",
                "Process Video",
                "Studio Tour",
                "Artist at Work",
            ],
            scripts: [
                format!("See what happens behind the scenes at our {} studio", city),
                format!("A day in the life of {} professionals", niche),
                format!("The artistry behind every {} service", niche),
            ],
        },
        Theme {
            activities: [
                "Client Spotlight",
                "Success Story",
                "Testimonial Feature",
                "Happy Client Friday",
                "Client Love",
            ],
            scripts: [
                format!("Meet our amazing {} clients and their {} journey", city, niche),
                format!("Nothing makes us happier than satisfied {} clients", niche),
                format!("Client love from the heart of {}", city),
            ],
        },
        Theme {
            activities: [
                "Trending Now",
                "Style Forecast",
                "What's Hot",
                "Season's Best",
                "Latest Looks",
            ],
            scripts: [
                format!("The hottest {} trends taking over {}", niche, city),
                format!("Stay ahead with these {} style predictions", niche),
                format!("What's trending in {} this season", niche),
            ],
        },
    ]
}

/// Themed rotation that avoids signatures already present in `used`
///
/// The activity and script indices advance together on each collision, up to
/// [`MAX_COLLISION_RETRIES`] times.
pub fn diverse_record(niche: &str, city: &str, day: u32, used: &SignatureSet) -> String {
    let niche = sanitize(niche);
    let city = sanitize(city);
    let day_index = day.max(1) as usize - 1;

    let all_themes = themes(&niche, &city);
    let theme = &all_themes[day_index % all_themes.len()];

    let mut activity_index = day_index % theme.activities.len();
    let mut script_index = day_index % theme.scripts.len();
    let mut attempts = 0;
    while attempts < MAX_COLLISION_RETRIES
        && used.contains(&content_signature(
            theme.activities[activity_index],
            &theme.scripts[script_index],
        ))
    {
        attempts += 1;
        activity_index = (activity_index + 1) % theme.activities.len();
        script_index = (script_index + 1) % theme.scripts.len();
    }

    let visuals = [
        format!("High-quality {} photography", niche),
        format!("Professional {} video content", niche),
        format!("Before and after {} shots", niche),
        "Process documentation".to_string(),
        "Client reaction captures".to_string(),
        format!("Detail shots of {} work", niche),
        "Studio atmosphere photos".to_string(),
        "Tool and technique displays".to_string(),
    ];
    let captions = [
        format!("Ready to elevate your {} game in {}? We're here to make it happen!", niche, city),
        format!("Your {} journey starts with the right professionals. Book your {} appointment today!", niche, city),
        format!("Excellence in {} services, right here in {}. Experience the difference!", niche, city),
        format!("Transform your look, boost your confidence. That's the {} magic we create in {}!", niche, city),
        format!("Professional {} services that exceed expectations. Welcome to your {} destination!", niche, city),
    ];

    let niche_tag = hashtag_token(primary_niche(&niche));
    let city_tag = hashtag_token(&city);
    let hashtag_sets = [
        format!("#{} #{}Beauty #Transform #BookNow", niche_tag, city_tag),
        format!("#{}Goals #{}Salon #Professional #BeautyVibes", niche_tag, city_tag),
        format!("#{}Expert #{}Style #Confidence #GlowUp", niche_tag, city_tag),
        format!("#{}Art #{}Beauty #Precision #Results", niche_tag, city_tag),
        format!("#{}Magic #{}Professionals #Excellence #SalonLife", niche_tag, city_tag),
    ];

    let image_prompt = if is_beauty_niche(&niche) {
        format!(
            "Professional {} salon in {}, modern interior design, natural lighting, happy clients, premium equipment, '{}' subtly visible in background or signage",
            niche, city, BRAND_HANDLE
        )
    } else {
        format!(
            "Professional {} business in {}, modern interior design, natural lighting, satisfied customers, quality equipment, '{}' subtly visible in background or signage",
            niche, city, BRAND_HANDLE
        )
    };

    let day_label = format!("Day {}", day);
    join_record([
        day_label.as_str(),
        theme.activities[activity_index],
        theme.scripts[script_index].as_str(),
        rotate(&visuals, day),
        rotate(&captions, day),
        rotate(&hashtag_sets, day),
        rotate(&DIVERSE_TIMES, day),
        rotate(&DIVERSE_CTAS, day),
        image_prompt.as_str(),
    ])
}

/// Fallback record for a day, stepping to the themed rotation on repeats
///
/// The template rotation is tried first; if its signature was already used in
/// this calendar the themed rotation is used instead.
pub fn fallback_record(niche: &str, city: &str, day: u32, used: &SignatureSet) -> String {
    let record = template_record(niche, city, day);
    let repeats = signature_of_record(&record)
        .map(|sig| used.contains(&sig))
        .unwrap_or(false);
    let record = if repeats {
        diverse_record(niche, city, day, used)
    } else {
        record
    };

    if field_count(&record) == RECORD_FIELD_COUNT {
        record
    } else {
        emergency_record(niche, city, day)
    }
}

/// Minimal record substituted after an unexpected failure
pub fn emergency_record(niche: &str, city: &str, day: u32) -> String {
    let niche = sanitize(niche);
    let city = sanitize(city);
    if niche.is_empty() || city.is_empty() {
        return FINAL_FALLBACK_RECORD.replacen("Day 1", &format!("Day {}", day), 1);
    }
    format!(
        "Day {day} | {title} Content | Professional {niche} service in {city} | High-quality content | Quality {niche} services in {city} - book today! | #{niche_tag} #{city_tag}Business #Professional | Peak hours | Book now | Professional {niche} business in {city}, modern setup, '{brand}' visible",
        day = day,
        title = title_case(&niche),
        niche = niche,
        city = city,
        niche_tag = hashtag_token(primary_niche(&niche)),
        city_tag = hashtag_token(&city),
        brand = BRAND_HANDLE,
    )
}

/// Number of pipe-delimited fields in a record
pub fn field_count(record: &str) -> usize {
    record.split('|').count()
}

fn signature_of_record(record: &str) -> Option<String> {
    let mut fields = record.split('|').map(str::trim).skip(1);
    let activity = fields.next()?;
    let script = fields.next()?;
    Some(content_signature(activity, script))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NICHES: [&str; 5] = ["hair", "pizza", "hair, nails", "dog | grooming", "Lash\nStudio"];
    const CITIES: [&str; 3] = ["Austin", "New York", "São Paulo"];

    #[test]
    fn test_every_rotation_has_nine_fields() {
        let used = SignatureSet::new();
        for niche in NICHES {
            for city in CITIES {
                for day in 1..=30 {
                    assert_eq!(field_count(&template_record(niche, city, day)), 9);
                    assert_eq!(field_count(&diverse_record(niche, city, day, &used)), 9);
                    assert_eq!(field_count(&fallback_record(niche, city, day, &used)), 9);
                    assert_eq!(field_count(&emergency_record(niche, city, day)), 9);
                }
            }
        }
        assert_eq!(field_count(FINAL_FALLBACK_RECORD), 9);
    }

    #[test]
    fn test_rotation_is_deterministic() {
        let used = SignatureSet::new();
        for day in 1..=30 {
            assert_eq!(template_record("nails", "Reno", day), template_record("nails", "Reno", day));
            assert_eq!(
                fallback_record("nails", "Reno", day, &used),
                fallback_record("nails", "Reno", day, &used)
            );
        }
    }

    #[test]
    fn test_template_rotation_indexes_from_day_one() {
        let record = template_record("hair", "Austin", 1);
        let fields: Vec<&str> = record.split(" | ").collect();
        assert_eq!(fields[0], "Day 1");
        assert_eq!(fields[1], "Hair showcase");
        assert_eq!(fields[6], "Morning (9-11am)");
        assert_eq!(fields[7], "Book your appointment today!");

        let day_eleven = template_record("hair", "Austin", 11);
        assert!(day_eleven.contains("| Hair showcase |"));
    }

    #[test]
    fn test_beauty_niche_gets_salon_prompt() {
        let record = template_record("lash extensions", "Austin", 1);
        assert!(record.contains("salon interior"));
        assert!(record.contains("#AustinSalon"));
        assert!(record.contains(BRAND_HANDLE));

        let other = template_record("pizza", "Austin", 1);
        assert!(other.contains("business interior"));
        assert!(other.contains("#AustinBusiness"));
    }

    #[test]
    fn test_diverse_record_skips_used_signature() {
        let empty = SignatureSet::new();
        let first = diverse_record("hair", "Austin", 3, &empty);
        let first_sig = signature_of_record(&first).unwrap();

        let mut used = SignatureSet::new();
        used.insert(first_sig.clone());
        let second = diverse_record("hair", "Austin", 3, &used);
        assert_ne!(signature_of_record(&second).unwrap(), first_sig);
    }

    #[test]
    fn test_diverse_record_terminates_when_everything_is_used() {
        let mut used = SignatureSet::new();
        for day in 1..=60 {
            for step in 0..15 {
                let record = diverse_record("hair", "Austin", day + step, &SignatureSet::new());
                used.insert(signature_of_record(&record).unwrap());
            }
        }
        let record = diverse_record("hair", "Austin", 4, &used);
        assert_eq!(field_count(&record), 9);
    }

    #[test]
    fn test_fallback_switches_rotation_on_repeat() {
        let mut used = SignatureSet::new();
        let day_one = template_record("hair", "Austin", 1);
        used.insert(signature_of_record(&day_one).unwrap());

        // Day 11 wraps to the same template as day 1
        let day_eleven = fallback_record("hair", "Austin", 11, &used);
        assert_ne!(
            signature_of_record(&day_eleven).unwrap(),
            signature_of_record(&day_one).unwrap()
        );
        assert!(day_eleven.starts_with("Day 11 |"));
    }

    #[test]
    fn test_emergency_record_with_blank_inputs() {
        let record = emergency_record("", "", 4);
        assert!(record.starts_with("Day 4 |"));
        assert_eq!(field_count(&record), 9);
    }

    #[test]
    fn test_helpers() {
        assert_eq!(title_case("hair and NAILS"), "Hair And Nails");
        assert_eq!(hashtag_token("new york"), "NewYork");
        assert_eq!(hashtag_token("hair, nails"), "HairNails");
        assert_eq!(primary_niche("hair, nails"), "hair");
        assert_eq!(sanitize(" a|b\nc "), "a/b c");
        assert!(is_beauty_niche("Brow Studio"));
        assert!(!is_beauty_niche("plumbing"));
    }
}
