//! Community key resolution across datasets with inconsistent schemas.
//!
//! Each dataset declares an ordered list of candidate field names. A record
//! resolves to the first candidate carrying a non-blank value; crime-style
//! datasets that store short codes are translated to names through a
//! [`CommunityCodes`] table built from the demographics dataset.

use crate::analyzers::types::CommunityKey;
use crate::record::Record;
use std::collections::HashMap;

/// Sentinel for records with no resolvable community. Such records are
/// excluded from every aggregation.
pub const UNKNOWN: &str = "Unknown";

/// Ordered candidate field names holding the community for one dataset type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyFields(&'static [&'static str]);

impl KeyFields {
    pub const PERMITS: KeyFields = KeyFields(&["communityname", "community_name", "community"]);
    pub const ASSESSMENTS: KeyFields = KeyFields(&["comm_name"]);
    pub const CRIME: KeyFields = KeyFields(&["community"]);
    pub const DEMOGRAPHICS: KeyFields = KeyFields(&["name"]);
    pub const DEMOGRAPHIC_CODES: KeyFields = KeyFields(&["comm_code"]);
    /// Union used when one resolver has to cover every dataset at once.
    pub const ANY: KeyFields = KeyFields(&[
        "communityname",
        "comm_name",
        "community_name",
        "name",
        "community",
    ]);

    pub fn fields(&self) -> &'static [&'static str] {
        self.0
    }
}

/// Returns the first present non-blank value among `fields`, or [`UNKNOWN`].
pub fn resolve_field(record: &Record, fields: KeyFields) -> String {
    record
        .first_text(fields.fields())
        .map_or_else(|| UNKNOWN.to_string(), |v| v.into_owned())
}

/// Side table translating community codes to human names.
#[derive(Debug, Clone, Default)]
pub struct CommunityCodes {
    names: HashMap<String, String>,
}

impl CommunityCodes {
    /// Builds the table from a dataset carrying both a code and a name per
    /// row. Rows missing either side are ignored; later rows win on
    /// conflicting codes.
    pub fn from_records<'a, I>(records: I, code_fields: KeyFields, name_fields: KeyFields) -> Self
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let mut names = HashMap::new();
        for record in records {
            let code = resolve_field(record, code_fields);
            let name = resolve_field(record, name_fields);
            if code != UNKNOWN && name != UNKNOWN {
                names.insert(code, name);
            }
        }
        Self { names }
    }

    /// Name for `code`, or `code` itself when the table has no entry.
    pub fn resolve<'a>(&'a self, code: &'a str) -> &'a str {
        self.names.get(code).map_or(code, String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Resolves records of one dataset type to community keys.
#[derive(Debug, Clone, Copy)]
pub struct KeyResolver<'a> {
    fields: KeyFields,
    codes: Option<&'a CommunityCodes>,
}

impl<'a> KeyResolver<'a> {
    pub fn new(fields: KeyFields) -> Self {
        Self {
            fields,
            codes: None,
        }
    }

    /// Translates resolved values through `codes` before keying.
    pub fn with_codes(mut self, codes: &'a CommunityCodes) -> Self {
        self.codes = Some(codes);
        self
    }

    /// Key for `record`, or `None` when the record has no resolvable
    /// community.
    pub fn key(&self, record: &Record) -> Option<CommunityKey> {
        let raw = resolve_field(record, self.fields);
        if raw == UNKNOWN {
            return None;
        }
        let resolved = match self.codes {
            Some(codes) => codes.resolve(&raw).to_string(),
            None => raw,
        };
        Some(CommunityKey::new(resolved))
    }
}
