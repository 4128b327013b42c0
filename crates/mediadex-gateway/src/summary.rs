//! Textual summary parameters, checked before any request is sent.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid length value: {0}. Allowed values are: Short, Medium, Long")]
    Length(String),
    #[error("Invalid style value: {0}. Allowed values are: Neutral, Casual, Formal")]
    Style(String),
    #[error("Invalid model name: {0}. Allowed values are: gpt-35-turbo, gpt-4")]
    Model(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SummaryLength {
    Short,
    Medium,
    #[default]
    Long,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SummaryStyle {
    #[default]
    Neutral,
    Casual,
    Formal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SummaryModel {
    #[default]
    #[serde(rename = "gpt-35-turbo")]
    Gpt35Turbo,
    #[serde(rename = "gpt-4")]
    Gpt4,
}

impl SummaryLength {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryLength::Short => "Short",
            SummaryLength::Medium => "Medium",
            SummaryLength::Long => "Long",
        }
    }
}

impl SummaryStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryStyle::Neutral => "Neutral",
            SummaryStyle::Casual => "Casual",
            SummaryStyle::Formal => "Formal",
        }
    }
}

impl SummaryModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryModel::Gpt35Turbo => "gpt-35-turbo",
            SummaryModel::Gpt4 => "gpt-4",
        }
    }
}

impl FromStr for SummaryLength {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Short" => Ok(SummaryLength::Short),
            "Medium" => Ok(SummaryLength::Medium),
            "Long" => Ok(SummaryLength::Long),
            other => Err(ValidationError::Length(other.to_string())),
        }
    }
}

impl FromStr for SummaryStyle {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Neutral" => Ok(SummaryStyle::Neutral),
            "Casual" => Ok(SummaryStyle::Casual),
            "Formal" => Ok(SummaryStyle::Formal),
            other => Err(ValidationError::Style(other.to_string())),
        }
    }
}

impl FromStr for SummaryModel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gpt-35-turbo" => Ok(SummaryModel::Gpt35Turbo),
            "gpt-4" => Ok(SummaryModel::Gpt4),
            other => Err(ValidationError::Model(other.to_string())),
        }
    }
}

impl fmt::Display for SummaryLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for SummaryStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for SummaryModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated parameters for a textual summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SummaryRequest {
    pub model: SummaryModel,
    pub length: SummaryLength,
    pub style: SummaryStyle,
}

impl SummaryRequest {
    /// Parse raw parameters; a missing one takes its default.
    pub fn parse(
        model: Option<&str>,
        length: Option<&str>,
        style: Option<&str>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            length: length.map(str::parse::<SummaryLength>).transpose()?.unwrap_or_default(),
            style: style.map(str::parse::<SummaryStyle>).transpose()?.unwrap_or_default(),
            model: model.map(str::parse::<SummaryModel>).transpose()?.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let req = SummaryRequest::parse(None, None, None).unwrap();
        assert_eq!(req.model, SummaryModel::Gpt35Turbo);
        assert_eq!(req.length, SummaryLength::Long);
        assert_eq!(req.style, SummaryStyle::Neutral);
    }

    #[test]
    fn test_parse_valid() {
        let req = SummaryRequest::parse(Some("gpt-4"), Some("Short"), Some("Formal")).unwrap();
        assert_eq!(req.model.as_str(), "gpt-4");
        assert_eq!(req.length.to_string(), "Short");
        assert_eq!(req.style, SummaryStyle::Formal);
    }

    #[test]
    fn test_rejects_unknown_values() {
        assert_eq!(
            SummaryRequest::parse(None, Some("Tiny"), None),
            Err(ValidationError::Length("Tiny".to_string()))
        );
        assert_eq!(
            SummaryRequest::parse(None, None, Some("Snarky")),
            Err(ValidationError::Style("Snarky".to_string()))
        );
        assert_eq!(
            SummaryRequest::parse(Some("gpt-5"), None, None),
            Err(ValidationError::Model("gpt-5".to_string()))
        );
    }

    #[test]
    fn test_values_are_case_sensitive() {
        assert!("short".parse::<SummaryLength>().is_err());
        assert!("GPT-4".parse::<SummaryModel>().is_err());
    }
}
