/// Risk classifier: maps triggered factors to an ordinal level.
///
/// Counts distinct factor codes, so a rule set that ever emitted the same
/// code twice could not inflate the level. The mapping is shared by the
/// historical and forecast views; only the factor vocabulary differs.
///
/// | distinct factors | level      | meaning  |
/// |------------------|------------|----------|
/// | 0                | `SAFE`     |          |
/// | 1                | `WATCH`    | prepare  |
/// | 2+               | `CRITICAL` | evacuate |
///
/// `WARNING` sits between `WATCH` and `CRITICAL` in the ordering but is
/// not produced by these counts; it is headroom for finer-grained rules.

use std::collections::BTreeSet;

use crate::model::{RiskFactor, RiskLevel};

pub fn classify(factors: &[RiskFactor]) -> RiskLevel {
    let distinct: BTreeSet<_> = factors.iter().map(|f| f.code()).collect();
    level_for_count(distinct.len())
}

pub fn level_for_count(count: usize) -> RiskLevel {
    match count {
        0 => RiskLevel::Safe,
        1 => RiskLevel::Watch,
        _ => RiskLevel::Critical,
    }
}
