// Field Normalizer - Canonical Tokens for Fact and Field Names
//
// Concept: Fact names from the extractor and field names from the form
// template are spelled inconsistently ("DOB", "Date of Birth", "dateOfBirth_2").
// Both sides are reduced to the same token form before matching.
//
// Algorithm:
// 1. Lower-case, collapse every run of non-alphanumerics into one '_'
// 2. Split off a trailing "_<digits>" variant index (age_2 -> age, 2)
// 3. Replace the base through the injected synonym table (dob -> date_of_birth)

use std::collections::HashMap;

/// Canonical matching form of a name (crate-internal, never exposed)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct NormalizedToken {
    pub(crate) base: String,
    /// Numbered variant index ("firstname_2" -> Some(2))
    pub(crate) variant: Option<u32>,
}

impl NormalizedToken {
    pub(crate) fn as_str(&self) -> &str {
        &self.base
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.base.is_empty()
    }
}

/// Alias token -> canonical token
///
/// Static configuration: built once, injected into the normalizer, never
/// learned at runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SynonymTable {
    aliases: HashMap<String, String>,
}

impl SynonymTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in table for civil registry and identity documents
    pub fn builtin() -> Self {
        let mut table = Self::new();
        let groups: &[(&str, &[&str])] = &[
            ("first_name", &["fname", "firstname", "given_name", "first"]),
            ("middle_name", &["mname", "middlename"]),
            ("last_name", &["surname", "lname", "lastname", "family_name"]),
            ("full_name", &["fullname", "complete_name", "name_of_applicant"]),
            (
                "date_of_birth",
                &["dob", "birth_date", "birthdate", "birthday", "date_birth"],
            ),
            ("place_of_birth", &["pob", "birth_place", "birthplace"]),
            (
                "address",
                &["addr", "home_address", "residential_address", "residence_address"],
            ),
            ("sex", &["gender"]),
            ("civil_status", &["marital_status"]),
            (
                "contact_number",
                &[
                    "phone",
                    "phone_number",
                    "mobile",
                    "mobile_number",
                    "contact_no",
                    "telephone",
                    "cellphone_number",
                ],
            ),
            ("id_number", &["id_no", "identification_number"]),
            ("nationality", &["citizenship"]),
            ("zip_code", &["zip", "zipcode", "postal_code"]),
            ("email", &["email_address", "e_mail"]),
        ];
        for (canonical, aliases) in groups {
            for alias in *aliases {
                table.insert(canonical, alias);
            }
        }
        table
    }

    /// Register `alias` as another spelling of `canonical`
    ///
    /// Both names are canonicalized first, so config entries may use any
    /// spelling ("Date of Birth", "DOB").
    pub fn insert(&mut self, canonical: &str, alias: &str) {
        let canonical = canonicalize(canonical);
        let alias = canonicalize(alias);
        if alias.is_empty() || canonical.is_empty() || alias == canonical {
            return;
        }
        self.aliases.insert(alias, canonical);
    }

    pub fn extend(&mut self, other: &SynonymTable) {
        for (alias, canonical) in &other.aliases {
            self.aliases.insert(alias.clone(), canonical.clone());
        }
    }

    fn lookup<'a>(&'a self, token: &'a str) -> &'a str {
        self.aliases.get(token).map(String::as_str).unwrap_or(token)
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

/// Maps raw names to [`NormalizedToken`]s
#[derive(Debug, Clone, Default)]
pub struct FieldNormalizer {
    synonyms: SynonymTable,
}

impl FieldNormalizer {
    pub fn new(synonyms: SynonymTable) -> Self {
        Self { synonyms }
    }

    pub fn synonyms(&self) -> &SynonymTable {
        &self.synonyms
    }

    /// Never fails: unknown names keep their canonicalized spelling
    pub(crate) fn normalize(&self, name: &str) -> NormalizedToken {
        let canonical = canonicalize(name);
        let (base, variant) = split_variant(&canonical);
        NormalizedToken {
            base: self.synonyms.lookup(base).to_string(),
            variant,
        }
    }

    /// Normalized spelling without the variant index, for diagnostics
    pub fn canonical_name(&self, name: &str) -> String {
        self.normalize(name).base
    }
}

/// Lower-case and collapse non-alphanumeric runs into single underscores
fn canonicalize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;
    for ch in name.chars() {
        if ch.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}

/// "age_2" -> ("age", Some(2)); "age" -> ("age", None); "2" -> ("2", None)
fn split_variant(token: &str) -> (&str, Option<u32>) {
    if let Some((base, suffix)) = token.rsplit_once('_') {
        if !base.is_empty() && !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(index) = suffix.parse::<u32>() {
                return (base, Some(index));
            }
        }
    }
    (token, None)
}
