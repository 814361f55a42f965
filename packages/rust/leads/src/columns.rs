//! Column resolution: map an arbitrary header row onto name/website/email.
//!
//! Resolution is two-tier. Every field first looks for an exact synonym;
//! fields still unresolved then fall back to substring probes over the
//! columns nobody has claimed yet. Within a tier the first column in
//! source order wins.

use pagepitch_shared::{CanonicalField, FieldMap, PagePitchError, ResolvedColumn, Result};

/// Declarative lookup rule for one canonical field.
#[derive(Debug, Clone, Copy)]
pub struct ColumnRule {
    pub field: CanonicalField,
    /// Exact header matches (already lowercase).
    pub synonyms: &'static [&'static str],
    /// Substrings tried in order when no synonym matches.
    pub probes: &'static [&'static str],
    /// Columns containing any of these substrings are never probe hits.
    pub deny: &'static [&'static str],
}

/// Rules applied by [`resolve_columns`].
pub const DEFAULT_RULES: [ColumnRule; 3] = [
    ColumnRule {
        field: CanonicalField::Name,
        synonyms: &["name", "full name", "contact name", "person", "lead name"],
        probes: &["name"],
        deny: &["mail"],
    },
    ColumnRule {
        field: CanonicalField::Website,
        synonyms: &["website", "site", "url", "domain"],
        probes: &["web", "site", "domain"],
        deny: &["mail"],
    },
    ColumnRule {
        field: CanonicalField::Email,
        synonyms: &["email", "e-mail", "mail", "email id", "emailid", "work email"],
        probes: &["email", "mail"],
        deny: &[],
    },
];

/// Rule-driven resolver over an ordered list of column names.
#[derive(Debug, Clone, Copy)]
pub struct ColumnResolver<'r> {
    rules: &'r [ColumnRule],
}

impl Default for ColumnResolver<'static> {
    fn default() -> Self {
        Self {
            rules: &DEFAULT_RULES,
        }
    }
}

impl<'r> ColumnResolver<'r> {
    pub fn new(rules: &'r [ColumnRule]) -> Self {
        Self { rules }
    }

    /// Resolve all three canonical fields or fail naming the missing ones.
    pub fn resolve(&self, columns: &[String]) -> Result<FieldMap> {
        let normalized: Vec<String> = columns.iter().map(|c| normalize_header(c)).collect();
        let mut picked: Vec<(CanonicalField, usize)> = Vec::new();
        let claimed = |picked: &[(CanonicalField, usize)], idx: usize| {
            picked.iter().any(|&(_, taken)| taken == idx)
        };

        for rule in self.rules {
            let hit = normalized
                .iter()
                .enumerate()
                .find(|(idx, col)| !claimed(&picked, *idx) && rule.synonyms.contains(&col.as_str()))
                .map(|(idx, _)| idx);
            if let Some(idx) = hit {
                picked.push((rule.field, idx));
            }
        }

        for rule in self.rules {
            if picked.iter().any(|&(field, _)| field == rule.field) {
                continue;
            }
            let hit = rule.probes.iter().find_map(|probe| {
                normalized
                    .iter()
                    .enumerate()
                    .find(|(idx, col)| {
                        !claimed(&picked, *idx)
                            && !rule.deny.iter().any(|bad| col.contains(bad))
                            && col.contains(probe)
                    })
                    .map(|(idx, _)| idx)
            });
            if let Some(idx) = hit {
                picked.push((rule.field, idx));
            }
        }

        let lookup = |field: CanonicalField| {
            picked
                .iter()
                .find(|&&(f, _)| f == field)
                .map(|&(_, idx)| ResolvedColumn {
                    index: idx,
                    header: normalized[idx].clone(),
                })
        };

        match (
            lookup(CanonicalField::Name),
            lookup(CanonicalField::Website),
            lookup(CanonicalField::Email),
        ) {
            (Some(name), Some(website), Some(email)) => Ok(FieldMap {
                name,
                website,
                email,
            }),
            (name, website, email) => {
                let missing = [
                    (CanonicalField::Name, name.is_none()),
                    (CanonicalField::Website, website.is_none()),
                    (CanonicalField::Email, email.is_none()),
                ]
                .into_iter()
                .filter(|&(_, absent)| absent)
                .map(|(field, _)| field.as_str())
                .collect();

                Err(PagePitchError::MissingColumns {
                    missing,
                    found: normalized,
                })
            }
        }
    }
}

/// Resolve columns with [`DEFAULT_RULES`].
pub fn resolve_columns(columns: &[String]) -> Result<FieldMap> {
    ColumnResolver::default().resolve(columns)
}

fn normalize_header(header: &str) -> String {
    header.trim().to_lowercase()
}
