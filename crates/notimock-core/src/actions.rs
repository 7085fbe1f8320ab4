//! Action-id assignment: turns the ordered `--action [ID=]LABEL` list into
//! the canonical action list for either protocol. The client and the test
//! expectations both call into this module, so the two sides can never
//! disagree on ids.

use crate::value::Value;

/// One `--action` argument: a label plus an optional explicit id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionSpec {
    pub label: String,
    pub id: Option<String>,
}

impl ActionSpec {
    /// Parse an `[ID=]LABEL` argument. Both sides of the `=` are trimmed.
    pub fn parse(raw: &str) -> Self {
        match raw.split_once('=') {
            Some((id, label)) => Self {
                label: label.trim().to_string(),
                id: Some(id.trim().to_string()),
            },
            None => Self {
                label: raw.trim().to_string(),
                id: None,
            },
        }
    }

    pub fn unnamed(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            id: None,
        }
    }

    pub fn named(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            id: Some(id.into()),
        }
    }
}

/// A resolved `(id, label)` entry. Ids are unique within one list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub id: String,
    pub label: String,
}

/// Compute the canonical ordered action list.
///
/// An entry without an explicit id gets the decimal string of the number of
/// entries emitted so far (not its raw input position). A duplicate id
/// rewrites the existing entry's label in place; order stays first-seen.
pub fn assign(specs: &[ActionSpec]) -> Vec<Action> {
    let mut out: Vec<Action> = Vec::new();
    for spec in specs {
        let id = match &spec.id {
            Some(id) => id.clone(),
            None => out.len().to_string(),
        };
        if let Some(existing) = out.iter_mut().find(|a| a.id == id) {
            existing.label = spec.label.clone();
        } else {
            out.push(Action {
                id,
                label: spec.label.clone(),
            });
        }
    }
    out
}

/// Direct-service form: flat `[id, label, id, label, ...]`.
pub fn direct_list(specs: &[ActionSpec]) -> Vec<String> {
    assign(specs)
        .into_iter()
        .flat_map(|a| [a.id, a.label])
        .collect()
}

/// Portal form: an `Array` of `{label, action}` dicts in append order.
pub fn portal_buttons(specs: &[ActionSpec]) -> Value {
    Value::Array(
        assign(specs)
            .into_iter()
            .map(|a| {
                Value::dict([
                    ("action", Value::Str(a.id)),
                    ("label", Value::Str(a.label)),
                ])
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs(raws: &[&str]) -> Vec<ActionSpec> {
        raws.iter().map(|r| ActionSpec::parse(r)).collect()
    }

    #[test]
    fn parse_forms() {
        assert_eq!(ActionSpec::parse("Foo"), ActionSpec::unnamed("Foo"));
        assert_eq!(
            ActionSpec::parse("bar-action=Bar"),
            ActionSpec::named("bar-action", "Bar")
        );
        assert_eq!(
            ActionSpec::parse(" id = spaced label "),
            ActionSpec::named("id", "spaced label")
        );
    }

    #[test]
    fn auto_ids_count_emitted_entries() {
        // An explicit-id entry still advances the auto counter: the third
        // unnamed action lands on "2", not "1".
        let list = assign(&specs(&["foo", "id=default", "baz"]));
        assert_eq!(
            list,
            vec![
                Action {
                    id: "0".into(),
                    label: "foo".into()
                },
                Action {
                    id: "id".into(),
                    label: "default".into()
                },
                Action {
                    id: "2".into(),
                    label: "baz".into()
                },
            ]
        );
    }

    #[test]
    fn duplicate_id_rewrites_label_in_place() {
        let list = assign(&specs(&["foo-action=Foo", "foo-action=FooBar"]));
        assert_eq!(
            list,
            vec![Action {
                id: "foo-action".into(),
                label: "FooBar".into()
            }]
        );
    }

    #[test]
    fn direct_form_flattens_pairs() {
        assert_eq!(
            direct_list(&specs(&["Foo", "bar-action=Bar"])),
            vec!["0", "Foo", "bar-action", "Bar"]
        );
    }

    #[test]
    fn ids_unique_in_first_occurrence_order() {
        let list = assign(&specs(&["a", "x=b", "x=c", "d", "a=z"]));
        let ids: Vec<&str> = list.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["0", "x", "2", "a"]);
        let mut dedup = ids.clone();
        dedup.dedup();
        assert_eq!(dedup, ids);
        // "x" keeps its slot but carries the later label.
        assert_eq!(list[1].label, "c");
    }

    #[test]
    fn idempotent_on_own_output() {
        let first = assign(&specs(&["foo", "id=default", "baz", "id=other"]));
        let explicit: Vec<ActionSpec> = first
            .iter()
            .map(|a| ActionSpec::named(a.id.clone(), a.label.clone()))
            .collect();
        assert_eq!(assign(&explicit), first);
    }

    #[test]
    fn portal_buttons_shape() {
        let buttons = portal_buttons(&specs(&["Foo", "bar-action=Bar"]));
        assert_eq!(
            buttons,
            Value::Array(vec![
                Value::dict([("action", Value::str("0")), ("label", Value::str("Foo"))]),
                Value::dict([
                    ("action", Value::str("bar-action")),
                    ("label", Value::str("Bar"))
                ]),
            ])
        );
    }
}
