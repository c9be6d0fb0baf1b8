//! HTML rendering for the upload page.
//!
//! The page skeleton is compiled in from `templates/index.html`; the dynamic
//! blocks are built here and every interpolated value is HTML-escaped.

use crate::inference::PredictionResult;

const INDEX_TEMPLATE: &str = include_str!("../../templates/index.html");

/// Care advice for the known banana leaf labels
const ADVICE: [(&str, &str); 4] = [
    (
        "Healthy",
        "✅ Leaf looks healthy. Keep monitoring and maintain good field hygiene.",
    ),
    (
        "Black Sigatoka",
        "⚠️ Consider removing infected leaves and improving airflow; consult local guidance.",
    ),
    (
        "Cordana",
        "⚠️ Prune affected parts and avoid overhead irrigation; consider fungicide per guidance.",
    ),
    (
        "Fusarium Wilt",
        "⚠️ Isolate affected plants; sanitize tools; check resistant cultivars.",
    ),
];

const DEFAULT_ADVICE: &str = "ℹ️ Verify results with an expert before acting.";

/// Advice line shown under a prediction
pub fn advice_for(label: &str) -> &'static str {
    ADVICE
        .iter()
        .find(|(name, _)| *name == label)
        .map(|(_, tip)| *tip)
        .unwrap_or(DEFAULT_ADVICE)
}

/// Escape text for use in HTML content and quoted attributes
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Values shown on one rendering of the page
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    /// Result line: a class label or an input problem message
    pub result: String,
    /// Relative URL of the uploaded image, empty when there is none
    pub img_url: String,
    /// Full prediction, when one was made
    pub prediction: Option<PredictionResult>,
}

impl PageContext {
    /// Page showing only a message (no image, no prediction)
    pub fn message(result: impl Into<String>) -> Self {
        Self {
            result: result.into(),
            ..Self::default()
        }
    }

    /// Page showing a prediction for an uploaded image
    pub fn predicted(img_url: String, prediction: PredictionResult) -> Self {
        Self {
            result: prediction.label.clone(),
            img_url,
            prediction: Some(prediction),
        }
    }
}

fn image_block(img_url: &str) -> String {
    if img_url.is_empty() {
        return r#"<span class="subtitle">No image yet</span>"#.to_string();
    }
    format!(
        r#"<img class="leaf-preview" src="{0}" alt="Uploaded leaf">"#,
        escape_html(img_url)
    )
}

fn predictions_block(prediction: &Option<PredictionResult>) -> String {
    let Some(prediction) = prediction else {
        return String::new();
    };

    let mut out = String::from(r#"<div class="predictions">"#);
    for (i, ranked) in prediction.top_k.iter().enumerate() {
        let pct = ranked.probability * 100.0;
        out.push_str(&format!(
            concat!(
                r#"<div class="pred-item"><div><strong>{prefix}{label}</strong>"#,
                r#"<div class="bar"><span style="width:{pct:.1}%"></span></div></div>"#,
                r#"<div class="pct">{pct:.1}%</div></div>"#
            ),
            prefix = if i == 0 { "Top: " } else { "" },
            label = escape_html(&ranked.label),
            pct = pct,
        ));
    }
    out.push_str(&format!(
        r#"<div class="status advice">{}</div></div>"#,
        escape_html(advice_for(&prediction.label))
    ));
    out
}

/// Render the full page
pub fn render_page(ctx: &PageContext) -> String {
    let result_block = if ctx.result.is_empty() {
        String::new()
    } else {
        format!(
            r#"<p class="result">Result: <strong id="result">{}</strong></p>"#,
            escape_html(&ctx.result)
        )
    };

    INDEX_TEMPLATE
        .replace("{{version}}", crate::VERSION)
        .replace("{{result_block}}", &result_block)
        .replace("{{image_block}}", &image_block(&ctx.img_url))
        .replace("{{predictions_block}}", &predictions_block(&ctx.prediction))
}
