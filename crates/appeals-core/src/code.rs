//! Registration code formatting.
//!
//! The code printed on correspondence looks like
//! `3-25-{index|e}/1-{middle}-{number}{/repeat}-{appeal index}/{year}`,
//! where the department sign decides both the prefix and the middle part.

use std::fmt::{Display, Formatter};

const ELECTRONIC_SIGN: &str = "e";
const KOL_SIGN: &str = "Kol";
const TVET_SIGN: &str = "T/Vət";

/// Department sign, classified by how it shapes the code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignKind {
    /// `e`: electronic intake; prefix uses `e` instead of the section index.
    Electronic,
    /// `Kol`: middle is the literal sign, no initial.
    Kol,
    /// `T/Vət`: middle is the literal sign, no initial.
    TVet,
    /// Any other sign: middle is `{sign}/{initial}`.
    Other(String),
    /// No department or no sign: middle is the initial alone.
    NoSign,
}

impl SignKind {
    pub fn classify(sign: Option<&str>) -> Self {
        match sign {
            None => Self::NoSign,
            Some(ELECTRONIC_SIGN) => Self::Electronic,
            Some(KOL_SIGN) => Self::Kol,
            Some(TVET_SIGN) => Self::TVet,
            // An empty sign carries no shape and behaves as absent.
            Some("") => Self::NoSign,
            Some(other) => Self::Other(other.to_string()),
        }
    }
}

/// First character of the submitted name as written, or empty.
pub fn person_initial(name: &str) -> &str {
    name.char_indices()
        .nth(1)
        .map_or(name, |(end, _)| &name[..end])
}

/// Everything a registration code is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeParts<'a> {
    pub sign: SignKind,
    pub section_index: i32,
    /// Original sequence number for repeats, the allocated one otherwise.
    pub number: u32,
    pub prior_count: u32,
    pub appeal_index_code: i32,
    pub year: i32,
    pub person_initial: &'a str,
}

impl Display for CodeParts<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.sign {
            SignKind::Electronic => f.write_str("3-25-e/1-")?,
            _ => write!(f, "3-25-{}/1-", self.section_index)?,
        }

        match &self.sign {
            SignKind::Kol => f.write_str(KOL_SIGN)?,
            SignKind::TVet => f.write_str(TVET_SIGN)?,
            SignKind::Other(sign) => write!(f, "{sign}/{}", self.person_initial)?,
            SignKind::Electronic | SignKind::NoSign => f.write_str(self.person_initial)?,
        }

        write!(f, "-{}", self.number)?;
        if self.prior_count > 0 {
            write!(f, "/{}-", u64::from(self.prior_count) + 1)?;
        } else {
            f.write_str("-")?;
        }
        write!(f, "{}/{}", self.appeal_index_code, self.year)
    }
}

/// Assemble the registration code.
pub fn format_registration_code(
    sign: Option<&str>,
    section_index: i32,
    number: u32,
    prior_count: u32,
    appeal_index_code: i32,
    year: i32,
    person_initial: &str,
) -> String {
    CodeParts {
        sign: SignKind::classify(sign),
        section_index,
        number,
        prior_count,
        appeal_index_code,
        year,
        person_initial,
    }
    .to_string()
}
