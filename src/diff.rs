use serde::Serialize;

use crate::buffers::{BufferStore, CodeBuffers, PartialBuffers, Slot};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LineStats {
    pub additions: usize,
    pub deletions: usize,
}

impl std::ops::Add for LineStats {
    type Output = LineStats;

    fn add(self, rhs: LineStats) -> LineStats {
        LineStats {
            additions: self.additions + rhs.additions,
            deletions: self.deletions + rhs.deletions,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DiffRecord {
    pub slot: Slot,
    pub before: String,
    pub after: String,
    pub changed: bool,
}

impl DiffRecord {
    pub fn stats(&self) -> LineStats {
        line_stats(&self.before, &self.after)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DiffResult {
    pub records: Vec<DiffRecord>,
    pub has_any_changes: bool,
    pub changed_slots: Vec<Slot>,
}

/// Compares `before` against a possibly partial `after`. A slot omitted from
/// `after` keeps its `before` value and is reported unchanged.
pub fn generate_diff(before: &CodeBuffers, after: &PartialBuffers) -> DiffResult {
    let records: Vec<DiffRecord> = Slot::ALL
        .iter()
        .map(|&slot| {
            let old = before.get(slot);
            let new = after.get(slot).unwrap_or(old);
            DiffRecord {
                slot,
                before: old.to_string(),
                after: new.to_string(),
                changed: old != new,
            }
        })
        .collect();
    let changed_slots: Vec<Slot> = records.iter().filter(|r| r.changed).map(|r| r.slot).collect();

    DiffResult {
        has_any_changes: !changed_slots.is_empty(),
        changed_slots,
        records,
    }
}

impl DiffResult {
    pub fn record(&self, slot: Slot) -> Option<&DiffRecord> {
        self.records.iter().find(|r| r.slot == slot)
    }

    pub fn total_stats(&self) -> LineStats {
        self.records
            .iter()
            .map(DiffRecord::stats)
            .fold(LineStats::default(), |acc, s| acc + s)
    }

    pub fn proposed(&self) -> CodeBuffers {
        let mut buffers = CodeBuffers::default();
        for record in &self.records {
            buffers.set(record.slot, record.after.clone());
        }
        buffers
    }

    pub fn apply_changed(&self, store: &mut BufferStore) -> bool {
        self.apply_slots(store, &self.changed_slots)
    }

    pub fn apply_all(&self, store: &mut BufferStore) -> bool {
        self.apply_slots(store, &Slot::ALL)
    }

    pub fn apply_slots(&self, store: &mut BufferStore, slots: &[Slot]) -> bool {
        let partial = self
            .records
            .iter()
            .filter(|r| slots.contains(&r.slot))
            .fold(PartialBuffers::default(), |acc, r| acc.with(r.slot, r.after.clone()));
        store.update(&partial)
    }
}

pub fn line_count(text: &str) -> usize {
    if text.is_empty() {
        0
    } else {
        text.split('\n').count()
    }
}

/// Positive line-count difference. Rewriting lines in place reports nothing.
pub fn line_stats(before: &str, after: &str) -> LineStats {
    let old = line_count(before);
    let new = line_count(after);
    LineStats {
        additions: new.saturating_sub(old),
        deletions: old.saturating_sub(new),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fence;
    use pretty_assertions::assert_eq;

    #[test]
    fn identical_sets_have_no_changes() {
        let x = CodeBuffers::new("<p>a</p>", "p {}", "run();");
        let diff = generate_diff(&x, &x.clone().into());
        assert!(!diff.has_any_changes);
        assert!(diff.changed_slots.is_empty());
    }

    #[test]
    fn omitted_slots_keep_before_values() {
        let before = CodeBuffers::new("<p>a</p>", "p {}", "old();");
        let diff = generate_diff(&before, &PartialBuffers::one(Slot::Logic, "new"));
        assert_eq!(diff.changed_slots, vec![Slot::Logic]);

        let markup = diff.record(Slot::Markup).unwrap();
        assert_eq!(markup.after, "<p>a</p>");
        assert!(!markup.changed);
        assert!(!diff.record(Slot::Style).unwrap().changed);
    }

    #[test]
    fn parsed_fences_against_empty_set() {
        let parsed = fence::parse("```html\n<b>x</b>\n```\n```ts\nlet y = 1;\n```");
        let diff = generate_diff(&CodeBuffers::default(), &parsed.to_editor_buffers());
        assert_eq!(diff.changed_slots, vec![Slot::Markup, Slot::Logic]);
        assert!(!diff.record(Slot::Style).unwrap().changed);
    }

    #[test]
    fn line_stats_only_count_length_differences() {
        assert_eq!(line_stats("", "a\nb"), LineStats { additions: 2, deletions: 0 });
        assert_eq!(line_stats("a\nb\nc", "a"), LineStats { additions: 0, deletions: 2 });
        assert_eq!(line_stats("a\nb", "x\ny"), LineStats::default());
    }

    #[test]
    fn totals_sum_all_slots() {
        let before = CodeBuffers::new("a", "", "x\ny\nz");
        let after = PartialBuffers::default().with(Slot::Markup, "a\nb").with(Slot::Logic, "x");
        let diff = generate_diff(&before, &after);
        assert_eq!(diff.total_stats(), LineStats { additions: 1, deletions: 2 });
    }

    #[test]
    fn applies_only_selected_slots() {
        let mut store = BufferStore::new();
        store.import(CodeBuffers::new("<i></i>", "i {}", "i();"));
        let diff = generate_diff(
            &store.export(),
            &PartialBuffers::default().with(Slot::Markup, "<u></u>").with(Slot::Logic, "u();"),
        );

        assert!(diff.apply_slots(&mut store, &[Slot::Logic]));
        assert_eq!(store.get(), &CodeBuffers::new("<i></i>", "i {}", "u();"));

        assert!(diff.apply_changed(&mut store));
        assert_eq!(store.get(), &diff.proposed());
        assert!(!diff.apply_all(&mut store));
    }
}
