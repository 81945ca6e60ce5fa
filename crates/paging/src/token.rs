//! Opaque resumption cursors.

use serde::{Deserialize, Serialize};

/// A server-issued cursor resuming a paged enumeration.
///
/// Tokens are produced only by the page-fetch components in this crate
/// (or by deserializing a previously issued token) and are carried back
/// into the next page request unmodified. Client code never inspects or
/// edits one. An absent token means the enumeration is finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuationToken(TokenFields);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum TokenFields {
    /// Cursor of an object listing.
    Marker { marker: String },
    /// Cursor of a table/row enumeration.
    TableKeys {
        next_partition_key: Option<String>,
        next_row_key: Option<String>,
        next_table_name: Option<String>,
    },
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl ContinuationToken {
    /// Wraps a listing marker. Absent or empty markers mean the server
    /// issued no cursor, so no token exists.
    pub(crate) fn from_marker(marker: Option<String>) -> Option<Self> {
        non_empty(marker).map(|marker| Self(TokenFields::Marker { marker }))
    }

    /// Wraps a table cursor triple; all fields empty means done.
    pub(crate) fn from_table_keys(
        next_partition_key: Option<String>,
        next_row_key: Option<String>,
        next_table_name: Option<String>,
    ) -> Option<Self> {
        let next_partition_key = non_empty(next_partition_key);
        let next_row_key = non_empty(next_row_key);
        let next_table_name = non_empty(next_table_name);
        if next_partition_key.is_none() && next_row_key.is_none() && next_table_name.is_none() {
            return None;
        }
        Some(Self(TokenFields::TableKeys { next_partition_key, next_row_key, next_table_name }))
    }

    pub(crate) fn marker(&self) -> Option<&str> {
        match &self.0 {
            TokenFields::Marker { marker } => Some(marker),
            TokenFields::TableKeys { .. } => None,
        }
    }

    pub(crate) fn table_keys(&self) -> Option<(Option<&str>, Option<&str>, Option<&str>)> {
        match &self.0 {
            TokenFields::Marker { .. } => None,
            TokenFields::TableKeys { next_partition_key, next_row_key, next_table_name } => Some((
                next_partition_key.as_deref(),
                next_row_key.as_deref(),
                next_table_name.as_deref(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_marker_is_no_token() {
        assert!(ContinuationToken::from_marker(None).is_none());
        assert!(ContinuationToken::from_marker(Some(String::new())).is_none());
    }

    #[test]
    fn marker_roundtrips() {
        let token = ContinuationToken::from_marker(Some("item-42".into())).unwrap();
        assert_eq!(token.marker(), Some("item-42"));
        assert!(token.table_keys().is_none());
    }

    #[test]
    fn all_empty_table_keys_is_no_token() {
        assert!(ContinuationToken::from_table_keys(None, None, None).is_none());
        assert!(
            ContinuationToken::from_table_keys(
                Some(String::new()),
                Some(String::new()),
                None
            )
            .is_none()
        );
    }

    #[test]
    fn table_keys_roundtrip() {
        let token =
            ContinuationToken::from_table_keys(Some("pk7".into()), Some("rk3".into()), None)
                .unwrap();
        assert_eq!(token.table_keys(), Some((Some("pk7"), Some("rk3"), None)));
        assert!(token.marker().is_none());
    }

    #[test]
    fn serde_preserves_the_cursor() {
        let token = ContinuationToken::from_marker(Some("after/x.bin".into())).unwrap();
        let json = serde_json::to_string(&token).unwrap();
        let back: ContinuationToken = serde_json::from_str(&json).unwrap();
        assert_eq!(back, token);
    }
}
