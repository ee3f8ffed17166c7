use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The wizard steps, in their fixed linear order.
///
/// `Ord` follows declaration order, so `step_a < step_b` means `step_a`
/// comes first in the flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecipeStep {
    HealthConcern,
    Demographics,
    Causes,
    Symptoms,
    Properties,
    Oils,
}

impl RecipeStep {
    pub const ALL: [Self; 6] = [
        Self::HealthConcern,
        Self::Demographics,
        Self::Causes,
        Self::Symptoms,
        Self::Properties,
        Self::Oils,
    ];

    pub const FIRST: Self = Self::HealthConcern;
    pub const LAST: Self = Self::Oils;

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HealthConcern => "health-concern",
            Self::Demographics => "demographics",
            Self::Causes => "causes",
            Self::Symptoms => "symptoms",
            Self::Properties => "properties",
            Self::Oils => "oils",
        }
    }

    /// Zero-based position in the flow.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::HealthConcern => Some(Self::Demographics),
            Self::Demographics => Some(Self::Causes),
            Self::Causes => Some(Self::Symptoms),
            Self::Symptoms => Some(Self::Properties),
            Self::Properties => Some(Self::Oils),
            Self::Oils => None,
        }
    }

    #[must_use]
    pub const fn previous(self) -> Option<Self> {
        match self {
            Self::HealthConcern => None,
            Self::Demographics => Some(Self::HealthConcern),
            Self::Causes => Some(Self::Demographics),
            Self::Symptoms => Some(Self::Causes),
            Self::Properties => Some(Self::Symptoms),
            Self::Oils => Some(Self::Properties),
        }
    }

    /// Steps strictly after `self`.
    pub fn downstream(self) -> impl Iterator<Item = Self> {
        Self::ALL.into_iter().filter(move |step| *step > self)
    }

    /// Steps strictly before `self`.
    pub fn upstream(self) -> impl Iterator<Item = Self> {
        Self::ALL.into_iter().filter(move |step| *step < self)
    }
}

impl fmt::Display for RecipeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown step '{0}' (expected one of: health-concern, demographics, causes, symptoms, properties, oils)")]
pub struct ParseStepError(pub String);

impl FromStr for RecipeStep {
    type Err = ParseStepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|step| step.as_str() == normalized)
            .ok_or_else(|| ParseStepError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::RecipeStep;

    #[test]
    fn order_is_strict_and_linear() {
        for pair in RecipeStep::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
            assert_eq!(pair[0].next(), Some(pair[1]));
            assert_eq!(pair[1].previous(), Some(pair[0]));
        }
        assert_eq!(RecipeStep::FIRST.previous(), None);
        assert_eq!(RecipeStep::LAST.next(), None);
    }

    #[test]
    fn index_matches_position() {
        for (i, step) in RecipeStep::ALL.into_iter().enumerate() {
            assert_eq!(step.index(), i);
        }
    }

    #[test]
    fn parse_accepts_display_form_and_underscores() {
        for step in RecipeStep::ALL {
            assert_eq!(step.to_string().parse::<RecipeStep>(), Ok(step));
        }
        assert_eq!("Health_Concern".parse(), Ok(RecipeStep::HealthConcern));
        assert!("recipe".parse::<RecipeStep>().is_err());
    }

    #[test]
    fn downstream_excludes_self() {
        let after: Vec<_> = RecipeStep::Symptoms.downstream().collect();
        assert_eq!(after, vec![RecipeStep::Properties, RecipeStep::Oils]);
        assert_eq!(RecipeStep::Oils.downstream().count(), 0);
        assert_eq!(RecipeStep::Causes.upstream().count(), 2);
    }

    #[test]
    fn serde_uses_kebab_case() {
        let json = serde_json::to_string(&RecipeStep::HealthConcern).expect("serialize");
        assert_eq!(json, "\"health-concern\"");
    }
}
