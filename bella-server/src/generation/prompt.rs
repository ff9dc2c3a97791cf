//! Prompt construction for the text-generation service

use bella_common::calendar::CalendarEntry;

use super::fallback::{primary_niche, BRAND_HANDLE};

/// Trend hint for a niche
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trend {
    pub audio: &'static str,
    pub hashtags: &'static str,
}

const DEFAULT_TREND: Trend = Trend {
    audio: "Trending transformation audio with engaging reveals",
    hashtags: "#SmallBusiness #Entrepreneur #LocalBusiness #Success #Growth",
};

/// Static trend table keyed by lowercase niche
pub fn trend_for(niche: &str) -> Trend {
    match primary_niche(niche).to_lowercase().as_str() {
        "hair" => Trend {
            audio: "Trending hair transformation audio with before/after transitions",
            hashtags: "#HairTransformation #HairGoals #SalonLife #HairTrends #BeautyTok",
        },
        "nails" => Trend {
            audio: "Nail art process audio with satisfying ASMR sounds",
            hashtags: "#NailArt #NailGoals #SalonNails #NailTrends #BeautyVibes",
        },
        "lashes" => Trend {
            audio: "Lash extension process with dramatic reveal audio",
            hashtags: "#LashGoals #LashExtensions #BeautyTrends #EyeLashes #SalonLife",
        },
        "makeup" => Trend {
            audio: "Makeup transformation with trending beauty audio",
            hashtags: "#MakeupArtist #MakeupGoals #BeautyMakeup #GlamSquad #MakeupTrends",
        },
        "skincare" => Trend {
            audio: "Skincare routine audio with calming background music",
            hashtags: "#SkinCare #GlowUp #HealthySkin #SkinGoals #BeautyRoutine",
        },
        "eyebrows" => Trend {
            audio: "Eyebrow shaping process with precision audio",
            hashtags: "#BrowGoals #EyebrowShaping #BrowArt #BeautyBrows #SalonBrows",
        },
        "microblading" => Trend {
            audio: "Precision microblading process with satisfying technique audio",
            hashtags: "#Microblading #BrowArt #PermanentMakeup #BeautyProfessional #BrowGoals",
        },
        "massage" => Trend {
            audio: "Relaxing spa music with peaceful ambience",
            hashtags: "#MassageTherapy #SelfCare #Wellness #Relaxation #SpaLife",
        },
        "fitness" => Trend {
            audio: "Motivational workout music with high energy beats",
            hashtags: "#FitnessMotivation #WorkoutGoals #HealthyLifestyle #FitLife #Wellness",
        },
        "photography" => Trend {
            audio: "Behind-the-scenes creative process audio",
            hashtags: "#Photography #CreativeProcess #PhotoShoot #ArtisticVision #BehindTheScenes",
        },
        "consulting" => Trend {
            audio: "Professional business development audio",
            hashtags: "#BusinessConsulting #ProfessionalDevelopment #Success #Strategy #Growth",
        },
        _ => DEFAULT_TREND,
    }
}

/// Summary of earlier days, asking the service not to repeat them
fn previous_context(prior: &[CalendarEntry]) -> String {
    let mut context = String::new();

    let activities: Vec<&str> = prior
        .iter()
        .map(|e| e.activity.as_str())
        .filter(|a| !a.is_empty())
        .collect();
    if !activities.is_empty() {
        context.push_str(&format!(
            "\n\nPREVIOUS ACTIVITIES USED (DO NOT REPEAT): {}",
            activities.join(", ")
        ));
    }

    let visuals: Vec<String> = prior
        .iter()
        .map(|e| e.visual.as_str())
        .filter(|v| v.chars().count() > 10)
        .map(|v| format!("{}...", v.chars().take(50).collect::<String>()))
        .collect();
    if !visuals.is_empty() {
        context.push_str(&format!(
            "\n\nPREVIOUS VISUAL CONCEPTS USED (CREATE SOMETHING DIFFERENT): {}",
            visuals.join("; ")
        ));
    }

    context
}

/// Build the post-idea prompt for one day
pub fn build_prompt(
    niche: &str,
    city: &str,
    day: u32,
    trend: &Trend,
    hashtags: &str,
    prior: &[CalendarEntry],
) -> String {
    let focus_instruction = if niche.contains(',') {
        format!(
            "Create content that can appeal to clients interested in any of these services: {}",
            niche
        )
    } else {
        format!("Focus on {} expertise while showcasing personality", niche)
    };

    format!(
        r#"
You are an expert AI social media strategist helping a {niche} professional in {city}.

Your task is to generate a single Instagram or TikTok post idea for Day {day} focused specifically on {niche}.

CONTENT STRATEGY:
- Mix content types: reels (2-3x/week), carousels, stories, client features, behind-scenes
- Each day should be UNIQUE and engaging - avoid repeating previous concepts
- {focus_instruction}
- Include local {city} appeal when relevant
- Current trend to incorporate: {audio}
{previous}

UNIQUENESS REQUIREMENTS:
- Create completely different activity types from previous days
- Use fresh visual concepts and angles
- Vary the content format (video vs photo, indoor vs outdoor, etc.)
- Ensure each day offers unique value to followers

OUTPUT FORMAT: Use exactly 9 fields separated by pipes (|), no extra text or labels:
Day | Activity | Script | Visual | Caption | Hashtags | Time | CTA | Prompt

GUIDELINES:
- Day: Write "Day {day}"
- Activity: Type of post (transformation reel, tutorial, client feature, behind-scenes, etc.) - MUST BE DIFFERENT from previous days
- Script: What they would say/text overlay (keep concise, 1-2 sentences)
- Visual: Describe the video/image concept in detail - MUST BE UNIQUE from previous posts
- Caption: Engaging caption with personality, no hashtags here (2-3 sentences)
- Hashtags: Mix of niche, location, trending tags: {hashtags}
- Time: Best posting time (morning/afternoon/evening)
- CTA: Clear call-to-action
- Prompt: AI image generation prompt for creating marketing background images. Always include "{brand}" subtly hidden in the image (on a sign, reflection, or background element). Make it photorealistic and professional.

Focus on authentic, engaging content that drives bookings and builds community while ensuring each day is completely unique.
"#,
        niche = niche,
        city = city,
        day = day,
        focus_instruction = focus_instruction,
        audio = trend.audio,
        previous = previous_context(prior),
        hashtags = hashtags,
        brand = BRAND_HANDLE,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bella_common::calendar::ContentSource;

    fn prior_entry(activity: &str, visual: &str) -> CalendarEntry {
        CalendarEntry {
            day: 1,
            activity: activity.to_string(),
            script: "script".to_string(),
            visual: visual.to_string(),
            caption: String::new(),
            hashtags: String::new(),
            time_slot: String::new(),
            call_to_action: String::new(),
            image_prompt: String::new(),
            source: ContentSource::Ai,
        }
    }

    #[test]
    fn test_trend_lookup_uses_primary_niche() {
        assert_eq!(trend_for("Hair, nails").hashtags, trend_for("hair").hashtags);
        assert_eq!(trend_for("plumbing"), DEFAULT_TREND);
    }

    #[test]
    fn test_prompt_mentions_inputs() {
        let trend = trend_for("nails");
        let prompt = build_prompt("nails", "Reno", 4, &trend, "#NailArt", &[]);
        assert!(prompt.contains("nails professional in Reno"));
        assert!(prompt.contains("Write \"Day 4\""));
        assert!(prompt.contains(trend.audio));
        assert!(prompt.contains("#NailArt"));
        assert!(!prompt.contains("PREVIOUS ACTIVITIES"));
    }

    #[test]
    fn test_prompt_multi_niche_focus() {
        let prompt = build_prompt("hair, nails", "Reno", 1, &DEFAULT_TREND, "", &[]);
        assert!(prompt.contains("any of these services: hair, nails"));
    }

    #[test]
    fn test_prompt_lists_previous_content() {
        let prior = vec![
            prior_entry("Tutorial", "Close-up of a balayage technique under studio lights"),
            prior_entry("Reel", "Short"),
        ];
        let prompt = build_prompt("hair", "Austin", 3, &trend_for("hair"), "", &prior);
        assert!(prompt.contains("PREVIOUS ACTIVITIES USED (DO NOT REPEAT): Tutorial, Reel"));
        assert!(prompt.contains("Close-up of a balayage technique under studio ligh..."));
        assert!(!prompt.contains("Short..."));
    }
}
