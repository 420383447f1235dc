use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::WorkspaceError;

/// Who summaries and explanations are written for.
///
/// The value is read when a request is issued; changing it never rewrites
/// results that were already delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    #[default]
    Clinician,
    Patient,
    Researcher,
}

impl Audience {
    pub fn as_str(&self) -> &'static str {
        match self {
            Audience::Clinician => "clinician",
            Audience::Patient => "patient",
            Audience::Researcher => "researcher",
        }
    }
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Audience {
    type Err = WorkspaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clinician" => Ok(Audience::Clinician),
            "patient" => Ok(Audience::Patient),
            "researcher" => Ok(Audience::Researcher),
            other => Err(WorkspaceError::Validation(format!(
                "unknown audience '{}', expected clinician, patient or researcher",
                other
            ))),
        }
    }
}
