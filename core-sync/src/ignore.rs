//! Fields an operator pins during fixup

use crate::error::{Result, SyncError};
use core_catalog::MetadataField;
use std::collections::BTreeSet;
use std::fmt;

/// Set of curated fields fixup must leave untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreFields(BTreeSet<MetadataField>);

impl IgnoreFields {
    pub fn none() -> Self {
        Self::default()
    }

    /// Parse a comma separated list such as `"logo, tvg_group"`.
    ///
    /// Blank items are skipped. Every unknown name is collected so the error
    /// lists all of them at once.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut fields = BTreeSet::new();
        let mut invalid = Vec::new();

        for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match item.parse::<MetadataField>() {
                Ok(field) => {
                    fields.insert(field);
                }
                Err(_) => invalid.push(item.to_string()),
            }
        }

        if !invalid.is_empty() {
            let valid: Vec<&str> = MetadataField::ALL.iter().map(|f| f.column()).collect();
            return Err(SyncError::Validation(format!(
                "invalid ignore field(s): {}; valid fields are: {}",
                invalid.join(", "),
                valid.join(", ")
            )));
        }

        Ok(Self(fields))
    }

    pub fn contains(&self, field: MetadataField) -> bool {
        self.0.contains(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Curated fields fixup is allowed to write, in column order.
    pub fn writable_fields(&self) -> Vec<MetadataField> {
        MetadataField::ALL
            .into_iter()
            .filter(|field| !self.contains(*field))
            .collect()
    }
}

impl FromIterator<MetadataField> for IgnoreFields {
    fn from_iter<I: IntoIterator<Item = MetadataField>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for IgnoreFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("none");
        }
        let names: Vec<&str> = self.0.iter().map(|field| field.column()).collect();
        f.write_str(&names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_list() {
        let ignore = IgnoreFields::parse("logo, tvg_group,,").unwrap();
        assert!(ignore.contains(MetadataField::Logo));
        assert!(ignore.contains(MetadataField::TvgGroup));
        assert!(!ignore.contains(MetadataField::Name));
        assert_eq!(
            ignore.writable_fields(),
            vec![MetadataField::TvgId, MetadataField::Name, MetadataField::Channel]
        );
        assert_eq!(ignore.to_string(), "logo, tvg_group");
    }

    #[test]
    fn test_parse_reports_every_invalid_name() {
        let err = IgnoreFields::parse("logo,stream_uri,bogus").unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, SyncError::Validation(_)));
        assert!(message.contains("stream_uri"));
        assert!(message.contains("bogus"));
        assert!(message.contains("tvg_id, logo, tvg_group, name, channel"));
    }

    #[test]
    fn test_empty_input_ignores_nothing() {
        let ignore = IgnoreFields::parse("  ").unwrap();
        assert!(ignore.is_empty());
        assert_eq!(ignore.writable_fields().len(), 5);
        assert_eq!(ignore.to_string(), "none");
    }

    #[test]
    fn test_from_iterator() {
        let ignore: IgnoreFields = [MetadataField::Channel].into_iter().collect();
        assert!(ignore.contains(MetadataField::Channel));
    }
}
