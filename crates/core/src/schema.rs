//! Analysis kinds and the field schema each kind expects back from the
//! inference service.
//!
//! The schema drives three things: the prompt sent with every request, the
//! required/optional split enforced by [`crate::validation`], and the
//! baselines used by [`crate::fallback`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::Score;

/// Which assessment domain a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    Skin,
    Hair,
}

impl AnalysisKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Skin => "skin",
            Self::Hair => "hair",
        }
    }

    /// Field schema for this kind.
    pub fn schema(self) -> &'static FieldSchema {
        match self {
            Self::Skin => &SKIN_SCHEMA,
            Self::Hair => &HAIR_SCHEMA,
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skin" => Ok(Self::Skin),
            "hair" => Ok(Self::Hair),
            other => Err(format!("Unknown analysis kind: '{other}'. Valid kinds: skin, hair")),
        }
    }
}

// ---------------------------------------------------------------------------
// Field schema
// ---------------------------------------------------------------------------

/// A categorical field and the vocabulary offered to the service.
pub struct CategoricalField {
    pub name: &'static str,
    pub vocabulary: &'static [&'static str],
}

/// Named fields expected in a response for one [`AnalysisKind`].
pub struct FieldSchema {
    /// Numeric fields that must be present.
    pub required_numeric: &'static [&'static str],
    /// Numeric fields that default to [`NEUTRAL_SCORE`] when absent.
    pub optional_numeric: &'static [&'static str],
    /// Categorical fields that must be present and non-empty.
    pub categorical: &'static [CategoricalField],
}

impl FieldSchema {
    /// Every numeric field, required first, in declaration order.
    pub fn numeric_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.required_numeric
            .iter()
            .chain(self.optional_numeric.iter())
            .copied()
    }
}

/// Value assigned to an optional numeric field the service left out.
pub const NEUTRAL_SCORE: Score = 50;

/// Key of the free-text concern list in a response.
pub const CONCERNS_FIELD: &str = "concerns";

/// Key of the "not analyzable" escape hatch in a response.
pub const ERROR_FIELD: &str = "error";

pub const SKIN_TYPES: &[&str] = &["Normal", "Trocken", "Fettig", "Mischhaut", "Empfindlich"];
pub const SKIN_TEXTURES: &[&str] = &["Glatt", "Uneben", "Rau", "Großporig"];
pub const HAIR_TYPES: &[&str] = &["Glatt", "Wellig", "Lockig", "Kraus"];
pub const SCALP_CONDITIONS: &[&str] = &["Normal", "Trocken", "Fettig", "Schuppig", "Gereizt"];

pub static SKIN_SCHEMA: FieldSchema = FieldSchema {
    required_numeric: &["hydration", "oiliness", "elasticity"],
    optional_numeric: &["pigmentation", "pore_visibility", "redness", "wrinkles"],
    categorical: &[
        CategoricalField {
            name: "skin_type",
            vocabulary: SKIN_TYPES,
        },
        CategoricalField {
            name: "texture",
            vocabulary: SKIN_TEXTURES,
        },
    ],
};

pub static HAIR_SCHEMA: FieldSchema = FieldSchema {
    required_numeric: &["moisture", "shine", "density"],
    optional_numeric: &["damage", "scalp_health", "split_ends", "elasticity"],
    categorical: &[
        CategoricalField {
            name: "hair_type",
            vocabulary: HAIR_TYPES,
        },
        CategoricalField {
            name: "scalp_condition",
            vocabulary: SCALP_CONDITIONS,
        },
    ],
};
