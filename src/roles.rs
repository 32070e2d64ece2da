//! Pure classification of raw directory group names into role attributes.

use serde::Serialize;
use tracing::warn;

/// Structured role attributes distilled from group membership.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RoleAttrs {
    pub year: String,
    pub degree: String,
    pub cohort: String,
    pub modules: Vec<String>,
    pub is_student: bool,
}

const STUDENT_GROUP: &str = "role/student";

/// Prefix classes in fixed order. Scalar fields are last-writer-wins;
/// modules accumulate in input order with duplicates kept.
const PREFIX_TABLE: &[(&str, fn(&mut RoleAttrs, &str))] = &[
    ("role/year-", |a, v| a.year = v.to_string()),
    ("role/degree-", |a, v| a.degree = v.to_string()),
    ("role/cohort-", |a, v| a.cohort = v.to_string()),
    ("role/module-", |a, v| a.modules.push(v.to_string())),
];

/// Classify group common names into role attributes.
///
/// The classes are mutually exclusive by directory-schema convention; a
/// group matching more than one is a schema violation and gets logged, with
/// every matching setter still applied in table order.
pub fn classify(groups: &[String]) -> RoleAttrs {
    let mut attrs = RoleAttrs::default();
    for group in groups {
        let mut hits = 0;
        if group.as_str() == STUDENT_GROUP {
            attrs.is_student = true;
            hits += 1;
        }
        for (prefix, set) in PREFIX_TABLE {
            if let Some(rest) = group.strip_prefix(prefix) {
                set(&mut attrs, rest);
                hits += 1;
            }
        }
        if hits > 1 {
            warn!(group = %group, "group name matches more than one role class");
        }
    }

    // Postgraduate-research cohorts are never counted as students. The
    // cohort group may arrive after the student group, so this override has
    // to run after the full scan, never inside it.
    if attrs.is_student && attrs.cohort == "pgr" {
        attrs.is_student = false;
    }

    attrs
}
