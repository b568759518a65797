//! Closed action sets for action-multiplexed tools.
//!
//! A multi-action tool models its operations as an enum deriving strum's
//! `EnumString` and `VariantNames`. The variant names double as the
//! advertised `action` enum in the tool's input schema, so what the
//! catalog shows and what the handler accepts cannot drift apart.

use std::str::FromStr;

use serde_json::{Value, json};
use strum::VariantNames;
use thiserror::Error;

/// Rejection of an action outside a tool's declared set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported action {requested:?}; expected one of: {}", .supported.join(", "))]
pub struct UnsupportedAction {
    pub requested: Option<String>,
    pub supported: Vec<String>,
}

impl UnsupportedAction {
    pub fn new(requested: Option<&str>, supported: &[&str]) -> Self {
        Self {
            requested: requested.map(str::to_owned),
            supported: supported.iter().map(|s| (*s).to_owned()).collect(),
        }
    }
}

/// An exhaustive set of operations behind one public tool name.
pub trait ToolAction: FromStr + VariantNames + Copy {
    /// Wire names of every supported action, in declaration order.
    fn supported() -> &'static [&'static str] {
        Self::VARIANTS
    }

    fn parse_action(raw: Option<&str>) -> Result<Self, UnsupportedAction> {
        raw.and_then(|name| name.parse().ok())
            .ok_or_else(|| UnsupportedAction::new(raw, Self::VARIANTS))
    }

    /// JSON schema fragment for the `action` property.
    fn schema() -> Value {
        json!({ "type": "string", "enum": Self::VARIANTS })
    }
}

/// The single, documented order in which a tool probes the places a target
/// may live.
///
/// Tools declare this once as a constant instead of re-deriving
/// "try each collection until one matches" per call.
#[derive(Debug, Clone, Copy)]
pub struct ResolutionOrder<S: 'static> {
    scopes: &'static [S],
}

impl<S: Copy + 'static> ResolutionOrder<S> {
    pub const fn new(scopes: &'static [S]) -> Self {
        Self { scopes }
    }

    pub const fn scopes(&self) -> &'static [S] {
        self.scopes
    }

    /// First scope whose probe yields a value.
    pub fn resolve<T>(&self, mut probe: impl FnMut(S) -> Option<T>) -> Option<(S, T)> {
        self.scopes
            .iter()
            .copied()
            .find_map(|scope| probe(scope).map(|found| (scope, found)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::{EnumString, VariantNames};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, VariantNames)]
    #[strum(serialize_all = "camelCase")]
    enum Sample {
        Insert,
        SetValue,
    }

    impl ToolAction for Sample {}

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Scope {
        Body,
        Header,
        Footer,
    }

    #[test]
    fn test_parse_known_action() {
        assert_eq!(Sample::parse_action(Some("setValue")), Ok(Sample::SetValue));
        assert_eq!(Sample::supported(), &["insert", "setValue"]);
    }

    #[test]
    fn test_unknown_and_missing_actions_list_valid_set() {
        let err = Sample::parse_action(Some("frobnicate")).unwrap_err();
        assert_eq!(err.requested.as_deref(), Some("frobnicate"));
        assert_eq!(err.supported, vec!["insert", "setValue"]);

        let err = Sample::parse_action(None).unwrap_err();
        assert_eq!(err.requested, None);
        assert!(err.to_string().contains("insert, setValue"));
    }

    #[test]
    fn test_schema_fragment() {
        assert_eq!(
            Sample::schema(),
            json!({"type": "string", "enum": ["insert", "setValue"]})
        );
    }

    #[test]
    fn test_resolution_order_stops_at_first_hit() {
        const ORDER: ResolutionOrder<Scope> =
            ResolutionOrder::new(&[Scope::Body, Scope::Header, Scope::Footer]);
        let mut probed = Vec::new();
        let hit = ORDER.resolve(|scope| {
            probed.push(scope);
            (scope == Scope::Header).then_some("title")
        });
        assert_eq!(hit, Some((Scope::Header, "title")));
        assert_eq!(probed, vec![Scope::Body, Scope::Header]);
    }
}
