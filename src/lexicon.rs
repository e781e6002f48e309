// src/lexicon.rs
//! Category tables for the lexical scoring engine: ordered category
//! definitions (keywords, phrase patterns, weights), intensity-modifier
//! tiers, and the built-in Spanish feedback lexicons.
//!
//! Order matters. A table is an explicit `Vec`, never a map: the declared
//! order is the documented tie-break contract for `dominant` and must be
//! reproducible across runs.

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Fixed weight contributed by each matching phrase pattern, on top of
/// keyword contributions.
pub const PATTERN_WEIGHT: f64 = 2.0;

/// Which engine a table drives. The two kinds disagree on the "no match"
/// default: Emotion falls back to `{neutral: 1.0}`, Theme to an empty
/// vector. Downstream percentage math depends on this asymmetry, so it is
/// carried explicitly instead of unified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Emotion,
    Theme,
}

/// Name of the implicit fallback category for emotion tables.
pub const NEUTRAL_CATEGORY: &str = "neutral";

/// One category: keywords, compiled phrase patterns, and a base weight.
#[derive(Debug, Clone)]
pub struct CategoryDefinition {
    pub name: String,
    pub keywords: Vec<String>,
    pub patterns: Vec<Regex>,
    pub base_weight: f64,
    /// When false, intensity modifiers do not scale this category's
    /// keyword contributions.
    pub intensity: bool,
}

/// One amplifier/diminisher tier. Tiers are checked in declared order and
/// only the first matching tier applies to a keyword.
#[derive(Debug, Clone)]
pub struct ModifierTier {
    pub name: String,
    pub tokens: Vec<String>,
    pub factor: f64,
}

/// An ordered set of categories plus modifier tiers, shared read-only
/// across all workers.
#[derive(Debug, Clone)]
pub struct CategoryTable {
    pub kind: TableKind,
    pub categories: Vec<CategoryDefinition>,
    pub modifiers: Vec<ModifierTier>,
}

impl CategoryTable {
    /// Position of a category by name, in declared order.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.categories.iter().position(|c| c.name == name)
    }

    /// Load a table from a TOML string. Patterns are compiled eagerly so a
    /// bad regex fails at load time, with the category named in the error.
    pub fn from_toml_str(kind: TableKind, toml_str: &str) -> Result<Self> {
        let root: TableRoot = toml::from_str(toml_str)?;

        let categories = root
            .categories
            .into_iter()
            .map(|c| {
                let patterns = c
                    .patterns
                    .iter()
                    .map(|p| {
                        Regex::new(p).map_err(|e| {
                            anyhow::anyhow!("category `{}` pattern error: {}", c.name, e)
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(CategoryDefinition {
                    name: c.name,
                    keywords: c.keywords,
                    patterns,
                    base_weight: c.base_weight,
                    intensity: c.intensity,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let modifiers = root
            .modifiers
            .into_iter()
            .map(|m| ModifierTier {
                name: m.name,
                tokens: m.tokens,
                factor: m.factor,
            })
            .collect();

        Ok(Self {
            kind,
            categories,
            modifiers,
        })
    }

    /// Load a table from a TOML file.
    pub fn from_toml_file(kind: TableKind, path: &Path) -> Result<Self> {
        use anyhow::Context;
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading category table from {}", path.display()))?;
        Self::from_toml_str(kind, &content)
    }
}

/* ----------------------------
TOML schema
---------------------------- */

#[derive(Debug, Deserialize)]
struct TableRoot {
    #[serde(default)]
    categories: Vec<CategoryCfg>,
    #[serde(default)]
    modifiers: Vec<ModifierCfg>,
}

#[derive(Debug, Deserialize)]
struct CategoryCfg {
    name: String,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    patterns: Vec<String>,
    #[serde(default = "default_base_weight")]
    base_weight: f64,
    #[serde(default = "default_true")]
    intensity: bool,
}

#[derive(Debug, Deserialize)]
struct ModifierCfg {
    name: String,
    tokens: Vec<String>,
    factor: f64,
}

fn default_base_weight() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

/* ----------------------------
Built-in Spanish lexicons
---------------------------- */

fn kw(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

/// Shared modifier tiers: checked in this order, first match wins.
fn default_modifiers() -> Vec<ModifierTier> {
    vec![
        ModifierTier {
            name: "very_high".into(),
            tokens: kw(&["muy", "súper", "super", "extremadamente", "demasiado"]),
            factor: 1.5,
        },
        ModifierTier {
            name: "high".into(),
            tokens: kw(&["bastante", "realmente", "tan"]),
            factor: 1.2,
        },
        ModifierTier {
            name: "low".into(),
            tokens: kw(&["poco", "apenas", "algo", "casi"]),
            factor: 0.7,
        },
    ]
}

/// Built-in emotion table for Spanish-language customer feedback.
pub static EMOTION_TABLE: Lazy<Arc<CategoryTable>> = Lazy::new(|| {
    Arc::new(CategoryTable {
        kind: TableKind::Emotion,
        categories: vec![
            CategoryDefinition {
                name: "alegria".into(),
                keywords: kw(&[
                    "excelente",
                    "encantó",
                    "encanta",
                    "feliz",
                    "genial",
                    "maravilloso",
                    "perfecto",
                    "increíble",
                    "bueno",
                    "buena",
                    "contento",
                    "agradable",
                    "recomiendo",
                    "gracias",
                ]),
                patterns: vec![],
                base_weight: 1.0,
                intensity: true,
            },
            CategoryDefinition {
                name: "enojo".into(),
                keywords: kw(&[
                    "terrible",
                    "pésimo",
                    "horrible",
                    "molesto",
                    "indignado",
                    "furioso",
                    "inaceptable",
                    "malo",
                    "mala",
                    "queja",
                    "nunca más",
                    "estafa",
                ]),
                patterns: vec![],
                base_weight: 1.0,
                intensity: true,
            },
            CategoryDefinition {
                name: "tristeza".into(),
                keywords: kw(&[
                    "decepcionado",
                    "decepción",
                    "triste",
                    "lamentable",
                    "esperaba más",
                    "desilusión",
                ]),
                patterns: vec![],
                base_weight: 1.0,
                intensity: true,
            },
            CategoryDefinition {
                name: "sorpresa".into(),
                keywords: kw(&[
                    "sorprendió",
                    "sorprendente",
                    "inesperado",
                    "no esperaba",
                    "asombroso",
                ]),
                patterns: vec![],
                base_weight: 1.0,
                intensity: true,
            },
        ],
        modifiers: default_modifiers(),
    })
});

/// Built-in theme table for Spanish-language customer feedback. Phrase
/// patterns carry a fixed weight of 2 per match on top of keywords.
pub static THEME_TABLE: Lazy<Arc<CategoryTable>> = Lazy::new(|| {
    let pat = |p: &str| Regex::new(p).expect("builtin theme pattern");
    Arc::new(CategoryTable {
        kind: TableKind::Theme,
        categories: vec![
            CategoryDefinition {
                name: "atencion_cliente".into(),
                keywords: kw(&[
                    "servicio",
                    "atención",
                    "personal",
                    "amable",
                    "trato",
                    "empleado",
                    "respuesta",
                ]),
                patterns: vec![
                    pat(r"atenci[oó]n al cliente"),
                    pat(r"servicio al cliente"),
                ],
                base_weight: 1.0,
                intensity: true,
            },
            CategoryDefinition {
                name: "precio".into(),
                keywords: kw(&[
                    "precio", "caro", "cara", "barato", "barata", "costoso", "tarifa",
                    "cobraron",
                ]),
                patterns: vec![pat(r"relaci[oó]n calidad[- ]precio")],
                base_weight: 1.0,
                intensity: true,
            },
            CategoryDefinition {
                name: "calidad".into(),
                keywords: kw(&[
                    "calidad",
                    "producto",
                    "material",
                    "defecto",
                    "defectuoso",
                    "duradero",
                    "roto",
                ]),
                patterns: vec![],
                base_weight: 1.0,
                intensity: true,
            },
            CategoryDefinition {
                name: "entrega".into(),
                keywords: kw(&[
                    "entrega", "envío", "demora", "tarde", "rápido", "rápida", "pedido",
                    "paquete",
                ]),
                patterns: vec![pat(r"tiempo de (espera|entrega)")],
                base_weight: 1.0,
                intensity: true,
            },
            CategoryDefinition {
                name: "instalaciones".into(),
                keywords: kw(&[
                    "local", "limpieza", "limpio", "sucio", "ambiente", "instalaciones",
                    "espacio",
                ]),
                patterns: vec![],
                base_weight: 1.0,
                intensity: true,
            },
        ],
        modifiers: default_modifiers(),
    })
});
