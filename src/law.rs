//! # Law Code Registry
//!
//! ## Purpose
//! Fixed enumeration of the supported Azerbaijani law codes with their
//! Azerbaijani and English display names and source filename mapping.
//!
//! ## Input/Output Specification
//! - **Input**: Law code identifiers or extracted-text filenames
//! - **Output**: `LawCode` values with canonical identifier and display names
//!
//! The set is closed: documents arriving with an identifier outside this
//! registry are rejected before the pipeline runs.

use crate::errors::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported Azerbaijani law codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LawCode {
    Family,
    Criminal,
    Civil,
    CriminalProcedure,
    CivilProcedure,
    Labor,
    AdministrativeOffenses,
    AdministrativeProcedure,
    Competition,
    Customs,
    Election,
    Execution,
    Forest,
    Housing,
    Land,
    MerchantShipping,
    Migration,
    UrbanPlanning,
    Water,
}

/// (code, canonical id, Azerbaijani name, English name, source file stem)
const REGISTRY: &[(LawCode, &str, &str, &str, &str)] = &[
    (LawCode::Family, "family", "Ailə Məcəlləsi", "Family Law Code", "family-law-code"),
    (LawCode::Criminal, "criminal", "Cinayət Məcəlləsi", "Criminal Law Code", "criminal_law_code"),
    (LawCode::Civil, "civil", "Mülki Məcəllə", "Civil Law Code", "civil_law_code"),
    (
        LawCode::CriminalProcedure,
        "criminal_procedure",
        "Cinayət Prosessual Məcəlləsi",
        "Criminal Procedure Code",
        "criminal_procedure_law_code",
    ),
    (
        LawCode::CivilProcedure,
        "civil_procedure",
        "Mülki Prosessual Məcəllə",
        "Civil Procedure Code",
        "civil_procedure_law_code",
    ),
    (LawCode::Labor, "labor", "Əmək Məcəlləsi", "Labor Law Code", "labor_law_code"),
    (
        LawCode::AdministrativeOffenses,
        "administrative_offenses",
        "İnzibati Xətalar Məcəlləsi",
        "Administrative Offenses Code",
        "administrative_offenses_law_code",
    ),
    (
        LawCode::AdministrativeProcedure,
        "administrative_procedure",
        "İnzibati Prosedur Məcəlləsi",
        "Administrative Procedure Code",
        "administrative_procedure_law_code",
    ),
    (
        LawCode::Competition,
        "competition",
        "Rəqabət Məcəlləsi",
        "Competition Law Code",
        "competition_law_code",
    ),
    (LawCode::Customs, "customs", "Gömrük Məcəlləsi", "Customs Code", "customs_law_code"),
    (LawCode::Election, "election", "Seçki Məcəlləsi", "Election Code", "election_law_code"),
    (
        LawCode::Execution,
        "execution",
        "Cəzaların İcrası Məcəlləsi",
        "Execution of Sentences Code",
        "execution_of_sentences_law_code",
    ),
    (LawCode::Forest, "forest", "Meşə Məcəlləsi", "Forest Code", "forest_law_code"),
    (LawCode::Housing, "housing", "Mənzil Məcəlləsi", "Housing Code", "housing_law_code"),
    (LawCode::Land, "land", "Torpaq Məcəlləsi", "Land Code", "land_law_code"),
    (
        LawCode::MerchantShipping,
        "merchant_shipping",
        "Ticarət Gəmiçiliyi Məcəlləsi",
        "Merchant Shipping Code",
        "merchant_shipping_law_code",
    ),
    (
        LawCode::Migration,
        "migration",
        "Miqrasiya Məcəlləsi",
        "Migration Code",
        "migration_law_code",
    ),
    (
        LawCode::UrbanPlanning,
        "urban_planning",
        "Şəhərsalma və Tikinti Məcəlləsi",
        "Urban Planning and Construction Code",
        "urban_planning_and_construction_law_code",
    ),
    (LawCode::Water, "water", "Su Məcəlləsi", "Water Code", "water_law_code"),
];

impl LawCode {
    fn entry(&self) -> &'static (LawCode, &'static str, &'static str, &'static str, &'static str) {
        REGISTRY
            .iter()
            .find(|(code, ..)| code == self)
            .expect("every LawCode variant has a registry entry")
    }

    /// Canonical snake_case identifier used in metadata and chunk ids
    pub fn as_str(&self) -> &'static str {
        self.entry().1
    }

    /// Azerbaijani display name
    pub fn name_az(&self) -> &'static str {
        self.entry().2
    }

    /// English display name
    pub fn name_en(&self) -> &'static str {
        self.entry().3
    }

    /// Resolve a law code from an extracted-text filename stem, e.g.
    /// `civil_law_code.txt` or `civil_law_code.pdf`
    pub fn from_filename(filename: &str) -> Option<LawCode> {
        let stem = filename
            .rsplit('/')
            .next()
            .unwrap_or(filename)
            .trim_end_matches(".txt")
            .trim_end_matches(".pdf");
        REGISTRY
            .iter()
            .find(|(_, _, _, _, file_stem)| *file_stem == stem)
            .map(|(code, ..)| *code)
    }

    /// All supported codes in registry order
    pub fn all() -> impl Iterator<Item = LawCode> {
        REGISTRY.iter().map(|(code, ..)| *code)
    }
}

impl fmt::Display for LawCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LawCode {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        REGISTRY
            .iter()
            .find(|(_, id, ..)| *id == s)
            .map(|(code, ..)| *code)
            .ok_or_else(|| PipelineError::UnknownLawCode {
                value: s.to_string(),
            })
    }
}
