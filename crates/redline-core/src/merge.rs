//! Priority-ordered reconciliation of base and QA finding sets.
//!
//! Recheck ("QA") runs re-analyze a document that may already carry
//! accepted annotations, so their output cannot simply replace the base
//! set: previously accepted entries must keep their positions, superseded
//! entries are replaced in place, and only genuinely new findings append.
//! The result is never globally re-sorted, and merging the same QA payload
//! twice is a no-op.

use crate::finding::{agenda_group_rank, merge_key, severity_rank, Finding};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

/// Total-order priority comparator; `Greater` means `a` outranks `b`.
///
/// Precedence: severity rank (higher wins), then salience (missing ranks
/// below every number), then agenda-group rank (lower wins, so `law`
/// beats `grammar`), then case-insensitive numeric-aware `rule_id`
/// collation (lexicographically smaller wins), else equal.
pub fn priority_compare(a: &Finding, b: &Finding) -> Ordering {
    let severity = severity_rank(a.severity).cmp(&severity_rank(b.severity));
    if severity != Ordering::Equal {
        return severity;
    }

    let sa = a.salience.unwrap_or(f64::NEG_INFINITY);
    let sb = b.salience.unwrap_or(f64::NEG_INFINITY);
    let salience = sa.total_cmp(&sb);
    if salience != Ordering::Equal {
        return salience;
    }

    let ga = agenda_group_rank(a.agenda_group.as_deref());
    let gb = agenda_group_rank(b.agenda_group.as_deref());
    if ga != gb {
        return gb.cmp(&ga);
    }

    match natural_caseless_cmp(&a.rule_id, &b.rule_id) {
        Ordering::Equal => Ordering::Equal,
        other => other.reverse(),
    }
}

/// Merges a QA finding set into a base set.
///
/// Builds a key-to-index map over `base` (the first occurrence of a key
/// claims its slot), then walks `qa` in arrival order: a candidate whose
/// key exists replaces the incumbent **at its existing index** only when
/// it strictly outranks it (the incumbent wins ties); an unseen key
/// appends at the end and registers its new slot. Replacement winners
/// inherit the displaced entry's `source` when they have none of their
/// own, defaulting to `"qa"`; appended entries default their `source` to
/// `"qa"` likewise.
///
/// `base` is never mutated; the result is a fresh vector, linear in
/// `base.len() + qa.len()`.
pub fn merge_qa_findings(base: &[Finding], qa: &[Finding]) -> Vec<Finding> {
    let mut merged: Vec<Finding> = base.to_vec();
    let mut index: HashMap<String, usize> = HashMap::with_capacity(merged.len());
    for (slot, finding) in merged.iter().enumerate() {
        index.entry(merge_key(finding)).or_insert(slot);
    }

    let mut replaced = 0usize;
    let mut appended = 0usize;
    for candidate in qa {
        let key = merge_key(candidate);
        match index.get(&key).copied() {
            Some(slot) => {
                if priority_compare(candidate, &merged[slot]) == Ordering::Greater {
                    let mut winner = candidate.clone();
                    if winner.source.is_none() {
                        winner.source = merged[slot]
                            .source
                            .clone()
                            .or_else(|| Some("qa".to_string()));
                    }
                    merged[slot] = winner;
                    replaced += 1;
                }
            }
            None => {
                let mut fresh = candidate.clone();
                if fresh.source.is_none() {
                    fresh.source = Some("qa".to_string());
                }
                index.insert(key, merged.len());
                merged.push(fresh);
                appended += 1;
            }
        }
    }

    debug!(
        base = base.len(),
        qa = qa.len(),
        replaced,
        appended,
        "merged qa findings"
    );
    merged
}

/// Case-insensitive comparison with numeric-aware collation: digit runs
/// compare by value (`rule-9` sorts before `rule-10`), leading zeros
/// break value ties, and everything else compares per lowercased char.
fn natural_caseless_cmp(a: &str, b: &str) -> Ordering {
    let a: Vec<char> = a.chars().flat_map(char::to_lowercase).collect();
    let b: Vec<char> = b.chars().flat_map(char::to_lowercase).collect();

    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i].is_ascii_digit() && b[j].is_ascii_digit() {
            let run_a = i;
            while i < a.len() && a[i].is_ascii_digit() {
                i += 1;
            }
            let run_b = j;
            while j < b.len() && b[j].is_ascii_digit() {
                j += 1;
            }

            let digits_a = trim_leading_zeros(&a[run_a..i]);
            let digits_b = trim_leading_zeros(&b[run_b..j]);
            // more significant digits = larger value; no overflow possible
            let by_value = digits_a
                .len()
                .cmp(&digits_b.len())
                .then_with(|| digits_a.cmp(digits_b));
            if by_value != Ordering::Equal {
                return by_value;
            }
            // equal values: fewer leading zeros first
            let by_width = (i - run_a).cmp(&(j - run_b));
            if by_width != Ordering::Equal {
                return by_width;
            }
        } else {
            match a[i].cmp(&b[j]) {
                Ordering::Equal => {
                    i += 1;
                    j += 1;
                }
                other => return other,
            }
        }
    }
    (a.len() - i).cmp(&(b.len() - j))
}

fn trim_leading_zeros(digits: &[char]) -> &[char] {
    let first = digits.iter().position(|&c| c != '0').unwrap_or(digits.len());
    &digits[first..]
}
