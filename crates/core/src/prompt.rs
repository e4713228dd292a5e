//! Prompt templates sent with every inference request.
//!
//! The text spells out the exact JSON shape the validator expects, including
//! the `{"error": true, ...}` escape hatch for unusable photos.

use crate::schema::{AnalysisKind, FieldSchema, CONCERNS_FIELD, ERROR_FIELD};

const SKIN_INTRO: &str = "You are a dermatology assistant. \
    Assess the facial skin visible in this photo. \
    This is a cosmetic assessment, not a medical diagnosis.";

const HAIR_INTRO: &str = "You are a trichology assistant. \
    Assess the hair and scalp visible in this photo. \
    This is a cosmetic assessment, not a medical diagnosis.";

/// Build the full prompt for `kind` from its [`FieldSchema`].
pub fn build_prompt(kind: AnalysisKind) -> String {
    let intro = match kind {
        AnalysisKind::Skin => SKIN_INTRO,
        AnalysisKind::Hair => HAIR_INTRO,
    };
    let schema = kind.schema();

    format!(
        "{intro}\n\n\
         Respond with exactly one JSON object and nothing else, using these keys:\n\
         {fields}\
         - \"{CONCERNS_FIELD}\": array of up to 5 short strings naming visible concerns\n\n\
         All numeric values are integers from 0 to 100.\n\
         If the photo cannot be assessed (no {subject} visible, too dark, too blurry), \
         respond with {{\"{ERROR_FIELD}\": true, \"message\": \"<reason>\"}} instead.",
        fields = describe_fields(schema),
        subject = match kind {
            AnalysisKind::Skin => "face",
            AnalysisKind::Hair => "hair",
        },
    )
}

fn describe_fields(schema: &FieldSchema) -> String {
    let mut out = String::new();
    for name in schema.numeric_fields() {
        out.push_str(&format!("- \"{name}\": integer 0-100\n"));
    }
    for field in schema.categorical {
        let options = field
            .vocabulary
            .iter()
            .map(|v| format!("\"{v}\""))
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!("- \"{}\": one of {options}\n", field.name));
    }
    out
}
