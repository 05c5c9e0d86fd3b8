//! Assembly and validation of per-label digit strings.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::calibration::Label;
use crate::error::ValidationError;
use crate::ocr::extract::is_exact_digits;
use crate::ocr::{Glyph, Recognition};

/// A label's recognized glyphs in reading order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DigitString {
    pub label: Label,
    pub glyphs: Vec<Glyph>,
    /// Exactly `label.digit_count()` glyphs, all digits.
    pub valid: bool,
}

impl DigitString {
    pub fn assemble(label: Label, recognitions: &[Recognition]) -> Self {
        let glyphs: Vec<Glyph> = recognitions.iter().map(|r| r.glyph).collect();
        let valid = check(label, &glyphs).is_ok();
        Self { label, glyphs, valid }
    }

    /// A label whose sub-pipeline produced nothing.
    pub fn failed(label: Label) -> Self {
        Self {
            label,
            glyphs: Vec::new(),
            valid: false,
        }
    }

    /// The digit string, or why it is not a valid pick.
    pub fn validate(&self) -> Result<String, ValidationError> {
        check(self.label, &self.glyphs)?;
        Ok(self.glyphs.iter().filter_map(Glyph::digit).collect())
    }

    pub fn value(&self) -> Option<String> {
        self.validate().ok()
    }
}

fn check(label: Label, glyphs: &[Glyph]) -> Result<(), ValidationError> {
    let expected = label.digit_count();
    if glyphs.len() != expected {
        return Err(ValidationError::WrongLength {
            expected,
            actual: glyphs.len(),
        });
    }
    match glyphs.iter().position(|g| g.digit().is_none()) {
        Some(position) => Err(ValidationError::Unknown { position }),
        None => Ok(()),
    }
}

/// Diagnostic rendering; unknown glyphs show as `?`. Never a pick value.
impl fmt::Display for DigitString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for glyph in &self.glyphs {
            write!(f, "{}", glyph)?;
        }
        Ok(())
    }
}

/// The candidate `{P2, P3, P4, P5}` set handed to a publisher.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickSet {
    #[serde(rename = "P2")]
    pub p2: Option<String>,
    #[serde(rename = "P3")]
    pub p3: Option<String>,
    #[serde(rename = "P4")]
    pub p4: Option<String>,
    #[serde(rename = "P5")]
    pub p5: Option<String>,
}

impl PickSet {
    /// Collects the valid values; invalid or missing labels stay `None`.
    pub fn from_digits(digits: &[DigitString]) -> Self {
        let mut set = Self::default();
        for d in digits {
            *set.slot_mut(d.label) = d.value();
        }
        set
    }

    pub fn get(&self, label: Label) -> Option<&str> {
        match label {
            Label::P2 => self.p2.as_deref(),
            Label::P3 => self.p3.as_deref(),
            Label::P4 => self.p4.as_deref(),
            Label::P5 => self.p5.as_deref(),
        }
    }

    fn slot_mut(&mut self, label: Label) -> &mut Option<String> {
        match label {
            Label::P2 => &mut self.p2,
            Label::P3 => &mut self.p3,
            Label::P4 => &mut self.p4,
            Label::P5 => &mut self.p5,
        }
    }

    /// Labels whose value is missing or not exactly `digit_count` ASCII digits.
    pub fn invalid_labels(&self) -> Vec<Label> {
        Label::ALL
            .into_iter()
            .filter(|&label| {
                !self
                    .get(label)
                    .is_some_and(|v| is_exact_digits(v, label.digit_count()))
            })
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.invalid_labels().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digits(s: &str) -> Vec<Recognition> {
        s.chars()
            .map(|c| match c {
                '?' => Recognition::unknown(),
                c => Recognition::digit(c, None),
            })
            .collect()
    }

    #[test]
    fn test_valid_string() {
        let d = DigitString::assemble(Label::P3, &digits("805"));
        assert!(d.valid);
        assert_eq!(d.validate(), Ok("805".to_string()));
    }

    #[test]
    fn test_unknown_glyph_is_invalid_not_placeholder() {
        let d = DigitString::assemble(Label::P3, &digits("8?5"));
        assert!(!d.valid);
        assert_eq!(d.validate(), Err(ValidationError::Unknown { position: 1 }));
        assert_eq!(d.value(), None);
        assert_eq!(d.to_string(), "8?5");
    }

    #[test]
    fn test_wrong_length() {
        let short = DigitString::assemble(Label::P4, &digits("123"));
        assert_eq!(
            short.validate(),
            Err(ValidationError::WrongLength {
                expected: 4,
                actual: 3
            })
        );

        let long = DigitString::assemble(Label::P2, &digits("123"));
        assert!(!long.valid);
    }

    #[test]
    fn test_leading_zero_kept() {
        let d = DigitString::assemble(Label::P2, &digits("07"));
        assert_eq!(d.value().as_deref(), Some("07"));
    }

    #[test]
    fn test_failed_label() {
        let d = DigitString::failed(Label::P5);
        assert!(!d.valid);
        assert!(matches!(d.validate(), Err(ValidationError::WrongLength { actual: 0, .. })));
    }

    #[test]
    fn test_pick_set_excludes_invalid_labels() {
        let set = PickSet::from_digits(&[
            DigitString::assemble(Label::P2, &digits("12")),
            DigitString::assemble(Label::P3, &digits("8?5")),
            DigitString::assemble(Label::P4, &digits("0001")),
        ]);

        assert_eq!(set.get(Label::P2), Some("12"));
        assert_eq!(set.get(Label::P3), None);
        assert_eq!(set.invalid_labels(), vec![Label::P3, Label::P5]);
        assert!(!set.is_complete());
    }

    #[test]
    fn test_pick_set_json_keys() {
        let set = PickSet {
            p2: Some("12".into()),
            p3: Some("345".into()),
            p4: Some("6789".into()),
            p5: Some("01234".into()),
        };
        assert!(set.is_complete());

        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(json["P2"], "12");
        assert_eq!(json["P5"], "01234");
    }

    #[test]
    fn test_hand_built_set_checked_against_lengths() {
        let set = PickSet {
            p2: Some("123".into()),
            p3: Some("3a5".into()),
            p4: Some("6789".into()),
            p5: Some("01234".into()),
        };
        assert_eq!(set.invalid_labels(), vec![Label::P2, Label::P3]);
    }
}
