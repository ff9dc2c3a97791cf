//! HTML form pages
//!
//! The generator form, its result page and the image generator. Pages are
//! rendered inline; every user-supplied value is escaped before it is
//! written into markup.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use bella_common::calendar::Calendar;
use bella_common::db::DEFAULT_USER_ID;
use serde::Deserialize;
use std::time::Instant;
use tracing::{info, warn};

use crate::db::calendars;
use crate::generation::render::escape_html;
use crate::generation::{render_table, Pacing};
use crate::services::images::refine_prompt;
use crate::services::{ImageBatch, ImageSize};
use crate::AppState;

/// Niches offered on the generator form; "other" enables the free-text field
const NICHE_OPTIONS: [(&str, &str); 12] = [
    ("hair", "Hair"),
    ("nails", "Nails"),
    ("lashes", "Lashes"),
    ("makeup", "Makeup"),
    ("skincare", "Skincare"),
    ("eyebrows", "Eyebrows"),
    ("microblading", "Microblading"),
    ("massage", "Massage"),
    ("fitness", "Fitness"),
    ("photography", "Photography"),
    ("consulting", "Consulting"),
    ("other", "Other"),
];

const BUSY_MESSAGE: &str = "System busy, try again in a moment";
const EMPTY_RESULT_MESSAGE: &str =
    "No content was generated. Please check your input and try again.";

/// Wrap `body` in the shared page chrome
fn page(title: &str, body: &str) -> String {
    let version = env!("CARGO_PKG_VERSION");
    let git_hash = env!("GIT_HASH");
    let build_timestamp = env!("BUILD_TIMESTAMP");
    let build_profile = env!("BUILD_PROFILE");

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>
        body {{
            font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif;
            background-color: #faf7f5;
            color: #2a2a2a;
            line-height: 1.5;
            margin: 0;
        }}
        header {{
            display: flex;
            justify-content: space-between;
            align-items: center;
            background-color: #2a2a2a;
            color: #f0e6e0;
            padding: 16px 24px;
        }}
        header a {{
            color: #f0e6e0;
            margin-left: 16px;
        }}
        .build-info {{
            font-family: 'Courier New', monospace;
            font-size: 12px;
            color: #999;
        }}
        .container {{
            padding: 24px;
        }}
        .error {{
            background-color: #fde8e8;
            border: 1px solid #e0a0a0;
            padding: 12px;
            margin-bottom: 16px;
        }}
        .notice {{
            background-color: #fff6dd;
            border: 1px solid #e6cf8a;
            padding: 12px;
            margin-bottom: 16px;
        }}
        .styled-table {{
            border-collapse: collapse;
            width: 100%;
            font-size: 14px;
        }}
        .styled-table th, .styled-table td {{
            border-bottom: 1px solid #ddd;
            padding: 8px;
            text-align: left;
            vertical-align: top;
        }}
        .styled-table thead tr {{
            background-color: #c98b7a;
            color: #fff;
        }}
        .images {{
            display: flex;
            gap: 16px;
            flex-wrap: wrap;
        }}
        .images figure {{
            max-width: 320px;
            margin: 0;
        }}
        .images img {{
            max-width: 100%;
        }}
    </style>
</head>
<body>
    <header>
        <div>
            <strong>B.E.L.L.A.</strong>
            <a href="/">Content Calendar</a>
            <a href="/image-generator">Image Generator</a>
        </div>
        <div class="build-info">v{version} [{git_hash}] {build_timestamp} ({build_profile})</div>
    </header>
    <div class="container">
{body}
    </div>
</body>
</html>
"#
    )
}

fn error_block(message: &str) -> String {
    format!("<div class=\"error\">{}</div>", escape_html(message))
}

/// Generator form, optionally preceded by an error and followed by results
fn generator_page(error: Option<&str>, results: &str) -> String {
    let options: String = NICHE_OPTIONS
        .iter()
        .map(|(value, label)| {
            format!(
                "<label><input type=\"checkbox\" name=\"niches\" value=\"{}\"> {}</label>\n",
                value, label
            )
        })
        .collect();

    let body = format!(
        r#"{error}<h1>Content Calendar Generator</h1>
<form method="post" action="/generate">
    <fieldset>
        <legend>Niches</legend>
        {options}
        <input type="text" name="customNiche" placeholder="Other niche">
    </fieldset>
    <p><label>City <input type="text" name="city" required></label></p>
    <p><label>Days <input type="number" name="days" min="1" max="30" value="7"></label></p>
    <p><button type="submit">Generate calendar</button></p>
</form>
{results}"#,
        error = error.map(error_block).unwrap_or_default(),
    );
    page("B.E.L.L.A. Content Calendar", &body)
}

/// GET /
pub async fn root_page() -> Html<String> {
    Html(generator_page(None, ""))
}

/// Fields of the generator form
#[derive(Debug, Default, PartialEq, Eq)]
pub struct GenerateForm {
    pub niches: Vec<String>,
    pub custom_niche: String,
    pub city: String,
    pub days: String,
}

impl GenerateForm {
    /// Parse a urlencoded body, keeping every repeated `niches` value
    pub fn parse(body: &[u8]) -> Self {
        let mut form = GenerateForm {
            days: "7".to_string(),
            ..Default::default()
        };
        for (key, value) in url::form_urlencoded::parse(body) {
            match key.as_ref() {
                "niches" => form.niches.push(value.into_owned()),
                "customNiche" => form.custom_niche = value.trim().to_string(),
                "city" => form.city = value.trim().to_string(),
                "days" => form.days = value.trim().to_string(),
                _ => {}
            }
        }
        form
    }

    /// Selected niches joined with ", "; "other" is replaced by the custom niche
    pub fn niche(&self) -> String {
        let mut selected: Vec<&str> = self
            .niches
            .iter()
            .map(|n| n.trim())
            .filter(|n| !n.is_empty() && *n != "other")
            .collect();
        let wants_custom = self.niches.iter().any(|n| n.trim() == "other");
        if wants_custom && !self.custom_niche.is_empty() {
            selected.push(&self.custom_niche);
        }
        selected.join(", ")
    }
}

/// Image prompts from the calendar, each linked to the image generator
fn prompt_links(calendar: &Calendar) -> String {
    let items: String = calendar
        .entries()
        .iter()
        .filter(|entry| !entry.image_prompt.is_empty())
        .map(|entry| {
            let encoded: String =
                url::form_urlencoded::byte_serialize(entry.image_prompt.as_bytes()).collect();
            format!(
                "<li>Day {}: <a href=\"/image-generator?prompt={}\">{}</a></li>\n",
                entry.day,
                encoded,
                escape_html(&entry.image_prompt)
            )
        })
        .collect();
    if items.is_empty() {
        String::new()
    } else {
        format!("<h2>Image prompts</h2>\n<ul>\n{}</ul>", items)
    }
}

fn calendar_results(calendar: &Calendar) -> String {
    format!(
        "<h2>{} calendar for {}</h2>\n<p>{} posts, generated with {} content</p>\n{}\n{}",
        escape_html(&calendar.niche),
        escape_html(&calendar.city),
        calendar.len(),
        calendar.generation_method(),
        render_table(calendar),
        prompt_links(calendar),
    )
}

/// POST /generate
pub async fn generate_calendar(State(state): State<AppState>, body: Bytes) -> Response {
    let form = GenerateForm::parse(&body);

    let niche = form.niche();
    let Ok(days) = form.days.parse::<u32>() else {
        return (
            StatusCode::BAD_REQUEST,
            Html(generator_page(Some("Please enter a valid number of days."), "")),
        )
            .into_response();
    };

    let request = match state.pipeline.request(niche, form.city, days) {
        Ok(request) => request,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Html(generator_page(Some(&e.to_string()), "")),
            )
                .into_response()
        }
    };

    let Ok(_permit) = state.governor.admit() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Html(generator_page(Some(BUSY_MESSAGE), "")),
        )
            .into_response();
    };

    let started = Instant::now();
    let calendar = state
        .pipeline
        .generate(&request, Pacing::interactive(state.pipeline.config()))
        .await;
    state.governor.finish();

    if calendar.is_empty() {
        return Html(generator_page(Some(EMPTY_RESULT_MESSAGE), "")).into_response();
    }

    match calendars::save_calendar(
        &state.db,
        DEFAULT_USER_ID,
        &calendar,
        request.days,
        started.elapsed().as_secs_f64(),
    )
    .await
    {
        Ok(id) => info!(calendar_id = id, posts = calendar.len(), "Calendar generated via form"),
        Err(e) => warn!(error = %e, "Failed to save calendar"),
    }

    Html(generator_page(None, &calendar_results(&calendar))).into_response()
}

#[derive(Debug, Deserialize)]
pub struct PrefillParams {
    pub prompt: Option<String>,
}

/// Fields of the image generator form
#[derive(Debug, PartialEq, Eq)]
pub struct ImageForm {
    pub prompt: String,
    pub num_images: String,
    pub image_size: String,
    pub is_refinement: bool,
    pub base_prompt: String,
    pub refinement_details: String,
}

impl ImageForm {
    pub fn parse(body: &[u8]) -> Self {
        let mut form = ImageForm {
            prompt: String::new(),
            num_images: "1".to_string(),
            image_size: ImageSize::Square.as_str().to_string(),
            is_refinement: false,
            base_prompt: String::new(),
            refinement_details: String::new(),
        };
        for (key, value) in url::form_urlencoded::parse(body) {
            let value = value.trim().to_string();
            match key.as_ref() {
                "prompt" => form.prompt = value,
                "num_images" => form.num_images = value,
                "image_size" => form.image_size = value,
                "is_refinement" => form.is_refinement = value == "true",
                "base_prompt" => form.base_prompt = value,
                "refinement_details" => form.refinement_details = value,
                _ => {}
            }
        }
        form
    }

    /// Prompt to submit, with refinement details merged when requested
    pub fn effective_prompt(&self) -> String {
        if self.is_refinement {
            refine_prompt(&self.prompt, &self.base_prompt, &self.refinement_details)
        } else {
            self.prompt.clone()
        }
    }
}

fn image_page(prompt: &str, error: Option<&str>, results: &str) -> String {
    let sizes: String = [ImageSize::Square, ImageSize::Landscape, ImageSize::Portrait]
        .iter()
        .map(|size| format!("<option value=\"{0}\">{0}</option>", size.as_str()))
        .collect();

    let body = format!(
        r#"{error}<h1>Image Generator</h1>
<form method="post" action="/image-generator">
    <p><label>Prompt<br><textarea name="prompt" rows="4" cols="80">{prompt}</textarea></label></p>
    <p><label>Images <input type="number" name="num_images" min="1" max="4" value="1"></label>
       <label>Size <select name="image_size">{sizes}</select></label></p>
    <p><button type="submit">Generate images</button></p>
</form>
{results}"#,
        error = error.map(error_block).unwrap_or_default(),
        prompt = escape_html(prompt),
    );
    page("B.E.L.L.A. Image Generator", &body)
}

fn image_results(prompt: &str, batch: &ImageBatch) -> String {
    let notice = batch
        .notice
        .as_deref()
        .map(|n| format!("<div class=\"notice\">{}</div>\n", escape_html(n)))
        .unwrap_or_default();

    let figures: String = batch
        .images
        .iter()
        .map(|image| match &image.url {
            Some(url) => format!(
                "<figure><img src=\"{}\" alt=\"Generated image {}\"><figcaption>{}</figcaption></figure>\n",
                escape_html(url),
                image.index,
                escape_html(image.revised_prompt.as_deref().unwrap_or_default()),
            ),
            None => format!(
                "<figure class=\"placeholder\">Image {}: {}</figure>\n",
                image.index,
                escape_html(image.error.as_deref().unwrap_or_default()),
            ),
        })
        .collect();

    // Refinement form carries the original prompt forward
    let escaped = escape_html(prompt);
    format!(
        r#"{notice}<div class="images">
{figures}</div>
<h2>Refine</h2>
<form method="post" action="/image-generator">
    <input type="hidden" name="is_refinement" value="true">
    <input type="hidden" name="base_prompt" value="{escaped}">
    <input type="hidden" name="prompt" value="{escaped}">
    <p><label>Changes <input type="text" name="refinement_details" size="60"></label></p>
    <p><button type="submit">Refine</button></p>
</form>"#
    )
}

/// GET /image-generator
pub async fn image_generator_page(Query(params): Query<PrefillParams>) -> Html<String> {
    Html(image_page(params.prompt.as_deref().unwrap_or_default(), None, ""))
}

/// POST /image-generator
pub async fn generate_images(State(state): State<AppState>, body: Bytes) -> Response {
    let form = ImageForm::parse(&body);
    let prompt = form.effective_prompt();

    let fail = |status: StatusCode, message: &str| {
        (status, Html(image_page(&prompt, Some(message), ""))).into_response()
    };

    if prompt.trim().is_empty() {
        return fail(StatusCode::BAD_REQUEST, "Please enter an image prompt.");
    }
    let Ok(num_images) = form.num_images.parse::<u32>() else {
        return fail(StatusCode::BAD_REQUEST, "Please enter a valid number of images.");
    };
    let Some(size) = ImageSize::parse(&form.image_size) else {
        return fail(StatusCode::BAD_REQUEST, "Please choose a supported image size.");
    };
    let Some(images) = state.images.as_ref() else {
        return fail(
            StatusCode::SERVICE_UNAVAILABLE,
            "Image generation is not configured on this server.",
        );
    };
    let Ok(_permit) = state.governor.admit() else {
        return fail(StatusCode::SERVICE_UNAVAILABLE, BUSY_MESSAGE);
    };

    let outcome = images.generate(&prompt, num_images, size).await;
    state.governor.finish();

    match outcome {
        Ok(batch) => Html(image_page(&prompt, None, &image_results(&prompt, &batch))).into_response(),
        Err(e) => fail(StatusCode::BAD_REQUEST, &e.to_string()),
    }
}

/// Build HTML page routes
pub fn ui_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root_page))
        .route("/generate", post(generate_calendar))
        .route(
            "/image-generator",
            get(image_generator_page).post(generate_images),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_keeps_repeated_niches() {
        let form = GenerateForm::parse(b"niches=hair&niches=nails&city=+Austin+&days=5");
        assert_eq!(form.niches, vec!["hair", "nails"]);
        assert_eq!(form.city, "Austin");
        assert_eq!(form.days, "5");
        assert_eq!(form.niche(), "hair, nails");
    }

    #[test]
    fn test_other_niche_uses_custom_value() {
        let form = GenerateForm::parse(b"niches=hair&niches=other&customNiche=Dog+Grooming&city=Reno");
        assert_eq!(form.niche(), "hair, Dog Grooming");

        let form = GenerateForm::parse(b"niches=other&customNiche=&city=Reno");
        assert_eq!(form.niche(), "");
        assert_eq!(form.days, "7");
    }

    #[test]
    fn test_image_form_refinement() {
        let form = ImageForm::parse(
            b"prompt=ignored&is_refinement=true&base_prompt=Salon+chair&refinement_details=warmer+light",
        );
        assert!(form.is_refinement);
        assert_eq!(form.num_images, "1");
        assert_eq!(form.effective_prompt(), refine_prompt("ignored", "Salon chair", "warmer light"));
    }

    #[test]
    fn test_image_page_escapes_prefill() {
        let html = image_page("<script>x</script>", None, "");
        assert!(html.contains("&lt;script&gt;x&lt;/script&gt;"));
        assert!(!html.contains("<script>x"));
    }
}
