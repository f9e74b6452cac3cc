//! Artifact languages.

use serde::{Deserialize, Serialize};

/// Output language of an artifact.
///
/// # Examples
///
/// ```
/// use diptych_core::Lang;
/// use std::str::FromStr;
///
/// assert_eq!(Lang::Fr.to_string(), "fr");
/// assert_eq!(Lang::from_str("en").unwrap(), Lang::En);
/// assert!(Lang::from_str("de").is_err());
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Lang {
    /// French
    Fr,
    /// English
    En,
}

impl Lang {
    /// Both languages, in export and gate order.
    pub const ALL: [Lang; 2] = [Lang::Fr, Lang::En];
}
