// src/dag/expression.rs

//! Task ordering expressions.
//!
//! An expression is either a single string such as `"a|b|c,d|e,f"` or an
//! ordered list of group strings such as `["a|b|c", "d|e", "f"]`. Commas
//! separate groups that run in series; pipes separate names inside a group
//! that run in parallel. Only one level of nesting is supported: a series of
//! parallel groups, never a parallel of series.

use std::fmt;

use serde::Deserialize;

/// An ordering expression as written in a manifest or passed by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OrderingExpr {
    /// `"a|b,c"`: split on `,` into groups, then on `|` into names.
    Text(String),
    /// `["a|b", "c"]`: each element is one group, split on `|`.
    Groups(Vec<String>),
}

impl OrderingExpr {
    /// Split the expression into its series groups.
    ///
    /// Names are trimmed; empty names are dropped and groups left with no
    /// names are dropped entirely.
    pub fn groups(&self) -> Vec<Vec<String>> {
        let raw: Vec<&str> = match self {
            OrderingExpr::Text(s) => s.split(',').collect(),
            OrderingExpr::Groups(list) => list.iter().map(String::as_str).collect(),
        };

        raw.into_iter()
            .map(split_group)
            .filter(|group| !group.is_empty())
            .collect()
    }

    /// `true` if the expression names no tasks at all.
    pub fn is_empty(&self) -> bool {
        self.groups().is_empty()
    }
}

fn split_group(group: &str) -> Vec<String> {
    group
        .split('|')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

impl fmt::Display for OrderingExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderingExpr::Text(s) => write!(f, "\"{s}\""),
            OrderingExpr::Groups(list) => {
                f.write_str("[")?;
                for (i, g) in list.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "\"{g}\"")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<&str> for OrderingExpr {
    fn from(s: &str) -> Self {
        OrderingExpr::Text(s.to_string())
    }
}

impl From<String> for OrderingExpr {
    fn from(s: String) -> Self {
        OrderingExpr::Text(s)
    }
}

impl From<Vec<String>> for OrderingExpr {
    fn from(list: Vec<String>) -> Self {
        OrderingExpr::Groups(list)
    }
}

impl From<Vec<&str>> for OrderingExpr {
    fn from(list: Vec<&str>) -> Self {
        OrderingExpr::Groups(list.into_iter().map(str::to_string).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn names(groups: &[Vec<String>]) -> Vec<Vec<&str>> {
        groups
            .iter()
            .map(|g| g.iter().map(String::as_str).collect())
            .collect()
    }

    #[test]
    fn text_splits_into_series_of_parallel_groups() {
        let expr = OrderingExpr::from("a|b|c,d|e,f");
        assert_eq!(
            names(&expr.groups()),
            vec![vec!["a", "b", "c"], vec!["d", "e"], vec!["f"]]
        );
    }

    #[test]
    fn list_form_matches_text_form() {
        let text = OrderingExpr::from("a|b,c");
        let list = OrderingExpr::from(vec!["a|b", "c"]);
        assert_eq!(text.groups(), list.groups());
    }

    #[test]
    fn whitespace_and_empty_entries_are_dropped() {
        let expr = OrderingExpr::from(" a | ,, |b ,c||d");
        assert_eq!(
            names(&expr.groups()),
            vec![vec!["a"], vec!["b"], vec!["c", "d"]]
        );
    }

    #[test]
    fn empty_expressions() {
        assert!(OrderingExpr::from("").is_empty());
        assert!(OrderingExpr::from(",|,").is_empty());
        assert!(OrderingExpr::Groups(vec![]).is_empty());
        assert!(!OrderingExpr::from("a").is_empty());
    }

    #[test]
    fn display_round_trips_the_written_form() {
        assert_eq!(OrderingExpr::from("a|b,c").to_string(), "\"a|b,c\"");
        assert_eq!(
            OrderingExpr::from(vec!["a|b", "c"]).to_string(),
            "[\"a|b\", \"c\"]"
        );
    }

    #[test]
    fn deserializes_both_forms() {
        #[derive(Deserialize)]
        struct Holder {
            r#do: OrderingExpr,
        }

        let text: Holder = toml::from_str(r#"do = "a|b,c""#).unwrap();
        assert_eq!(text.r#do, OrderingExpr::from("a|b,c"));

        let list: Holder = toml::from_str(r#"do = ["a|b", "c"]"#).unwrap();
        assert_eq!(list.r#do, OrderingExpr::from(vec!["a|b", "c"]));
    }

    fn name_strategy() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,6}"
    }

    fn groups_strategy() -> impl Strategy<Value = Vec<Vec<String>>> {
        prop::collection::vec(prop::collection::vec(name_strategy(), 1..4), 1..5)
    }

    proptest! {
        /// Joining groups with `|` and `,` and splitting again yields the same groups.
        #[test]
        fn joined_text_parses_back_to_groups(groups in groups_strategy()) {
            let text = groups
                .iter()
                .map(|g| g.join("|"))
                .collect::<Vec<_>>()
                .join(",");
            let parsed = OrderingExpr::Text(text).groups();
            prop_assert_eq!(parsed, groups);
        }

        /// The list form with the same groups parses identically to the text form.
        #[test]
        fn sequence_form_equals_text_form(groups in groups_strategy()) {
            let joined: Vec<String> = groups.iter().map(|g| g.join("|")).collect();
            let list = OrderingExpr::Groups(joined.clone());
            let text = OrderingExpr::Text(joined.join(","));
            prop_assert_eq!(list.groups(), text.groups());
        }
    }
}
