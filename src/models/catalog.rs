//! Model catalog: which forms are candidates, in which order, and how they are
//! presented.
//!
//! The evaluators are fixed (`ModelKind`); everything else is data loaded from
//! JSON:
//!
//! ```json
//! { "models": [ { "key": "linear", "name": "Linear", "params": 2,
//!                 "equation": "y = a*x + b", "description": "...",
//!                 "initial_guess": [1.0, 0.0] } ] }
//! ```
//!
//! The default catalog (`config/models.json`) is compiled into the binary. A
//! process installs one catalog globally at startup and never reloads it.

use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::domain::ModelKind;
use crate::error::CatalogError;

const BUILTIN_JSON: &str = include_str!("../../config/models.json");

static GLOBAL: OnceLock<Catalog> = OnceLock::new();

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSpec {
    pub kind: ModelKind,
    pub name: String,
    /// Equation template over the symbols `a..f`.
    pub equation: String,
    pub description: String,
    /// Overrides the built-in starting point for forms without a data-driven one.
    pub initial_guess: Option<Vec<f64>>,
}

impl ModelSpec {
    pub fn key(&self) -> &'static str {
        self.kind.key()
    }

    pub fn param_count(&self) -> usize {
        self.kind.param_count()
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    models: Vec<RawSpec>,
}

#[derive(Debug, Deserialize)]
struct RawSpec {
    key: String,
    name: String,
    params: usize,
    equation: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    initial_guess: Option<Vec<f64>>,
}

/// An ordered, validated list of model specs.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    specs: Vec<ModelSpec>,
}

impl Catalog {
    /// The catalog shipped with the crate.
    pub fn builtin() -> Catalog {
        match Catalog::from_json(BUILTIN_JSON) {
            Ok(catalog) => catalog,
            Err(e) => unreachable!("embedded model catalog is invalid: {e}"),
        }
    }

    pub fn from_json(text: &str) -> Result<Catalog, CatalogError> {
        let file: CatalogFile = serde_json::from_str(text)?;
        if file.models.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut seen = HashSet::new();
        let mut specs = Vec::with_capacity(file.models.len());
        for raw in file.models {
            let kind = ModelKind::from_key(&raw.key).ok_or_else(|| CatalogError::UnknownKey(raw.key.clone()))?;
            if !seen.insert(kind) {
                return Err(CatalogError::DuplicateKey(raw.key));
            }
            let expected = kind.param_count();
            if raw.params != expected {
                return Err(CatalogError::ParamCount {
                    key: raw.key,
                    declared: raw.params,
                    expected,
                });
            }
            if let Some(guess) = &raw.initial_guess {
                if guess.len() != expected || guess.iter().any(|v| !v.is_finite()) {
                    return Err(CatalogError::InitialGuess {
                        key: raw.key,
                        found: guess.len(),
                        expected,
                    });
                }
            }
            specs.push(ModelSpec {
                kind,
                name: raw.name,
                equation: raw.equation,
                description: raw.description,
                initial_guess: raw.initial_guess,
            });
        }

        Ok(Catalog { specs })
    }

    pub fn from_path(path: &Path) -> Result<Catalog, CatalogError> {
        let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Catalog::from_json(&text)
    }

    /// Install `catalog` as the process-wide catalog.
    ///
    /// Fails if a catalog was already installed (explicitly or by a previous
    /// call to [`Catalog::global`]).
    pub fn install(catalog: Catalog) -> Result<&'static Catalog, CatalogError> {
        GLOBAL.set(catalog).map_err(|_| CatalogError::AlreadyInitialised)?;
        Ok(Catalog::global())
    }

    /// The process-wide catalog; the built-in one unless another was installed first.
    pub fn global() -> &'static Catalog {
        GLOBAL.get_or_init(Catalog::builtin)
    }

    pub fn specs(&self) -> &[ModelSpec] {
        &self.specs
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn get(&self, kind: ModelKind) -> Option<&ModelSpec> {
        self.specs.iter().find(|s| s.kind == kind)
    }

    /// Position of `kind` in catalog order (used for tie-breaking).
    pub fn position(&self, kind: ModelKind) -> Option<usize> {
        self.specs.iter().position(|s| s.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_lists_all_forms_in_order() {
        let cat = Catalog::builtin();
        let kinds: Vec<ModelKind> = cat.specs().iter().map(|s| s.kind).collect();
        assert_eq!(kinds, ModelKind::ALL.to_vec());
        assert_eq!(cat.get(ModelKind::Sine).unwrap().equation, "y = a*sin(b*x + c) + d");
        assert_eq!(cat.get(ModelKind::Quadratic).unwrap().initial_guess, Some(vec![1.0, 1.0, 1.0]));
    }

    #[test]
    fn catalog_may_subset_and_reorder() {
        let json = r#"{"models":[
            {"key":"sine","name":"Wave","params":4,"equation":"y = a*sin(b*x + c) + d"},
            {"key":"linear","name":"Line","params":2,"equation":"y = a*x + b"}
        ]}"#;
        let cat = Catalog::from_json(json).unwrap();
        assert_eq!(cat.len(), 2);
        assert_eq!(cat.position(ModelKind::Linear), Some(1));
        assert!(cat.get(ModelKind::Quadratic).is_none());
    }

    #[test]
    fn catalog_rejects_unknown_duplicate_and_miscounted_entries() {
        let unknown = r#"{"models":[{"key":"cubic","name":"C","params":4,"equation":"y"}]}"#;
        assert!(matches!(Catalog::from_json(unknown), Err(CatalogError::UnknownKey(_))));

        let dup = r#"{"models":[
            {"key":"linear","name":"A","params":2,"equation":"y"},
            {"key":"linear","name":"B","params":2,"equation":"y"}]}"#;
        assert!(matches!(Catalog::from_json(dup), Err(CatalogError::DuplicateKey(_))));

        let count = r#"{"models":[{"key":"sine","name":"S","params":3,"equation":"y"}]}"#;
        assert!(matches!(
            Catalog::from_json(count),
            Err(CatalogError::ParamCount { declared: 3, expected: 4, .. })
        ));

        let guess = r#"{"models":[{"key":"linear","name":"L","params":2,"equation":"y","initial_guess":[1.0]}]}"#;
        assert!(matches!(Catalog::from_json(guess), Err(CatalogError::InitialGuess { .. })));

        assert!(matches!(Catalog::from_json(r#"{"models":[]}"#), Err(CatalogError::Empty)));
    }
}
