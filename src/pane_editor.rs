use thiserror::Error;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    pub start: usize,
    pub end: usize,
}

impl Selection {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start: start.min(end),
            end: start.max(end),
        }
    }

    pub fn caret(pos: usize) -> Self {
        Self { start: pos, end: pos }
    }

    pub fn is_caret(self) -> bool {
        self.start == self.end
    }

    fn clamp_to(self, text: &str) -> Self {
        Self::new(floor_boundary(text, self.start), floor_boundary(text, self.end))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Edit {
    pub start: usize,
    pub end: usize,
    pub insert: String,
}

impl Edit {
    pub fn new(start: usize, end: usize, insert: impl Into<String>) -> Self {
        Self {
            start,
            end,
            insert: insert.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub edits: Vec<Edit>,
    pub selection_after: Selection,
    pub label: &'static str,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EditError {
    #[error("edit range {start}..{end} is outside 0..{len} or splits a character")]
    InvalidRange { start: usize, end: usize, len: usize },

    #[error("edits {first_start}..{first_end} and {next_start}..{next_end} overlap")]
    Overlapping {
        first_start: usize,
        first_end: usize,
        next_start: usize,
        next_end: usize,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PaneSnapshot {
    pub text: String,
    pub selection: Selection,
    pub revision: u64,
}

impl PaneSnapshot {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let len = text.len();
        Self {
            text,
            selection: Selection::caret(len),
            revision: 0,
        }
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = selection.clamp_to(&self.text);
    }

    pub fn apply(&mut self, transaction: Transaction) -> Result<bool, EditError> {
        let edits = sorted_edits(&transaction.edits, &self.text)?;
        let mut next = String::with_capacity(self.text.len());
        let mut cursor = 0;
        for edit in &edits {
            next.push_str(&self.text[cursor..edit.start]);
            next.push_str(&edit.insert);
            cursor = edit.end;
        }
        next.push_str(&self.text[cursor..]);

        let changed = next != self.text;
        self.text = next;
        self.selection = transaction.selection_after.clamp_to(&self.text);
        if changed {
            self.revision += 1;
        }
        Ok(changed)
    }
}

fn sorted_edits(edits: &[Edit], text: &str) -> Result<Vec<Edit>, EditError> {
    let mut sorted = edits.to_vec();
    sorted.sort_by_key(|edit| (edit.start, edit.end));

    for edit in &sorted {
        if edit.start > edit.end
            || edit.end > text.len()
            || !text.is_char_boundary(edit.start)
            || !text.is_char_boundary(edit.end)
        {
            return Err(EditError::InvalidRange {
                start: edit.start,
                end: edit.end,
                len: text.len(),
            });
        }
    }
    for pair in sorted.windows(2) {
        if pair[1].start < pair[0].end {
            return Err(EditError::Overlapping {
                first_start: pair[0].start,
                first_end: pair[0].end,
                next_start: pair[1].start,
                next_end: pair[1].end,
            });
        }
    }
    Ok(sorted)
}

const INDENT: &str = "    ";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaneCommand {
    Indent,
    Outdent,
    Newline,
    AutoPair { open: char, close: char },
}

impl PaneCommand {
    pub fn pair_for(ch: char) -> Option<Self> {
        let close = match ch {
            '{' => '}',
            '(' => ')',
            '[' => ']',
            '"' => '"',
            '\'' => '\'',
            '`' => '`',
            _ => return None,
        };
        Some(Self::AutoPair { open: ch, close })
    }
}

pub fn run_command(snapshot: &mut PaneSnapshot, command: PaneCommand) -> Result<bool, EditError> {
    let Some(transaction) = build_transaction(snapshot, command) else {
        return Ok(false);
    };
    snapshot.apply(transaction)
}

fn build_transaction(snapshot: &PaneSnapshot, command: PaneCommand) -> Option<Transaction> {
    let sel = snapshot.selection.clamp_to(&snapshot.text);
    match command {
        PaneCommand::Indent if sel.is_caret() => Some(Transaction {
            edits: vec![Edit::new(sel.start, sel.end, INDENT)],
            selection_after: Selection::caret(sel.start + INDENT.len()),
            label: "indent",
        }),
        PaneCommand::Indent => Some(reindent_block(&snapshot.text, sel, false)),
        PaneCommand::Outdent if sel.is_caret() => outdent_line(&snapshot.text, sel.start),
        PaneCommand::Outdent => Some(reindent_block(&snapshot.text, sel, true)),
        PaneCommand::Newline => Some(newline(&snapshot.text, sel)),
        PaneCommand::AutoPair { open, close } => Some(auto_pair(&snapshot.text, sel, open, close)),
    }
}

fn leading_indent_len(line: &str) -> usize {
    if line.starts_with('\t') {
        return 1;
    }
    line.bytes().take_while(|b| *b == b' ').take(INDENT.len()).count()
}

fn outdent_line(text: &str, caret: usize) -> Option<Transaction> {
    let ls = line_start(text, caret);
    let remove = leading_indent_len(&text[ls..line_end(text, caret)]);
    if remove == 0 {
        return None;
    }
    let caret_after = if caret - ls >= remove { caret - remove } else { ls };
    Some(Transaction {
        edits: vec![Edit::new(ls, ls + remove, "")],
        selection_after: Selection::caret(caret_after),
        label: "outdent",
    })
}

fn reindent_block(text: &str, sel: Selection, outdent: bool) -> Transaction {
    let start = line_start(text, sel.start);
    let end = line_end(text, sel.end);
    let block: Vec<String> = text[start..end]
        .split('\n')
        .map(|line| {
            if outdent {
                line[leading_indent_len(line)..].to_string()
            } else {
                format!("{INDENT}{line}")
            }
        })
        .collect();
    let replaced = block.join("\n");
    let selection_after = Selection::new(start, start + replaced.len());
    Transaction {
        edits: vec![Edit::new(start, end, replaced)],
        selection_after,
        label: if outdent { "outdent-block" } else { "indent-block" },
    }
}

fn newline(text: &str, sel: Selection) -> Transaction {
    let ls = line_start(text, sel.start);
    let line = &text[ls..sel.start];
    let indent: String = line.chars().take_while(|c| *c == ' ' || *c == '\t').collect();
    let opens_block = matches!(line.trim_end().chars().last(), Some('{' | '(' | '['));
    let closes_next = matches!(text[sel.end..].chars().next(), Some('}' | ')' | ']'));

    let mut insert = format!("\n{indent}");
    if opens_block {
        insert.push_str(INDENT);
    }
    let caret = sel.start + insert.len();
    if opens_block && closes_next {
        insert.push('\n');
        insert.push_str(&indent);
    }
    Transaction {
        edits: vec![Edit::new(sel.start, sel.end, insert)],
        selection_after: Selection::caret(caret),
        label: "newline",
    }
}

fn auto_pair(text: &str, sel: Selection, open: char, close: char) -> Transaction {
    let mut insert = String::new();
    insert.push(open);
    insert.push_str(&text[sel.start..sel.end]);
    insert.push(close);
    let selection_after = if sel.is_caret() {
        Selection::caret(sel.start + open.len_utf8())
    } else {
        Selection::new(sel.start + open.len_utf8(), sel.end + open.len_utf8())
    };
    Transaction {
        edits: vec![Edit::new(sel.start, sel.end, insert)],
        selection_after,
        label: "autopair",
    }
}

fn line_start(text: &str, pos: usize) -> usize {
    text[..pos.min(text.len())].rfind('\n').map(|i| i + 1).unwrap_or(0)
}

fn line_end(text: &str, pos: usize) -> usize {
    let pos = pos.min(text.len());
    text[pos..].find('\n').map(|i| pos + i).unwrap_or(text.len())
}

fn floor_boundary(text: &str, pos: usize) -> usize {
    let mut pos = pos.min(text.len());
    while !text.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

pub fn utf16_to_byte(text: &str, utf16: usize) -> usize {
    let mut units = 0;
    for (idx, ch) in text.char_indices() {
        if units >= utf16 {
            return idx;
        }
        units += ch.len_utf16();
    }
    text.len()
}

pub fn byte_to_utf16(text: &str, byte: usize) -> usize {
    text[..floor_boundary(text, byte)].encode_utf16().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn at(text: &str, caret: usize) -> PaneSnapshot {
        let mut snapshot = PaneSnapshot::new(text);
        snapshot.set_selection(Selection::caret(caret));
        snapshot
    }

    #[test]
    fn applies_multi_edit_transaction() {
        let mut snapshot = PaneSnapshot::new("let a = 1;");
        let changed = snapshot
            .apply(Transaction {
                edits: vec![Edit::new(10, 10, " // b"), Edit::new(0, 3, "const")],
                selection_after: Selection::caret(0),
                label: "test",
            })
            .unwrap();
        assert!(changed);
        assert_eq!(snapshot.text, "const a = 1; // b");
        assert_eq!(snapshot.revision, 1);
    }

    #[test]
    fn rejects_bad_ranges() {
        let mut snapshot = PaneSnapshot::new("abcdef");
        let overlapping = Transaction {
            edits: vec![Edit::new(1, 4, "x"), Edit::new(3, 5, "y")],
            selection_after: Selection::default(),
            label: "bad",
        };
        assert!(matches!(
            snapshot.apply(overlapping),
            Err(EditError::Overlapping { .. })
        ));

        let outside = Transaction {
            edits: vec![Edit::new(2, 99, "")],
            selection_after: Selection::default(),
            label: "bad",
        };
        assert_eq!(
            snapshot.apply(outside),
            Err(EditError::InvalidRange { start: 2, end: 99, len: 6 })
        );
        assert_eq!(snapshot.text, "abcdef");
    }

    #[test]
    fn tab_inserts_indent_at_caret() {
        let mut snapshot = at("x", 0);
        run_command(&mut snapshot, PaneCommand::Indent).unwrap();
        assert_eq!(snapshot.text, "    x");
        assert_eq!(snapshot.selection, Selection::caret(4));
    }

    #[test]
    fn indents_and_outdents_selected_lines() {
        let mut snapshot = PaneSnapshot::new("a\nb");
        snapshot.set_selection(Selection::new(0, 3));
        run_command(&mut snapshot, PaneCommand::Indent).unwrap();
        assert_eq!(snapshot.text, "    a\n    b");

        snapshot.set_selection(Selection::new(0, snapshot.text.len()));
        run_command(&mut snapshot, PaneCommand::Outdent).unwrap();
        assert_eq!(snapshot.text, "a\nb");
    }

    #[test]
    fn outdent_without_indent_is_a_no_op() {
        let mut snapshot = at("plain", 2);
        assert!(!run_command(&mut snapshot, PaneCommand::Outdent).unwrap());
    }

    #[test]
    fn newline_keeps_indent() {
        let mut snapshot = at("    let a = 1;", 14);
        run_command(&mut snapshot, PaneCommand::Newline).unwrap();
        assert_eq!(snapshot.text, "    let a = 1;\n    ");
        assert_eq!(snapshot.selection, Selection::caret(19));
    }

    #[test]
    fn newline_between_braces_opens_block() {
        let mut snapshot = at("if (x) {}", 8);
        run_command(&mut snapshot, PaneCommand::Newline).unwrap();
        assert_eq!(snapshot.text, "if (x) {\n    \n}");
        assert_eq!(snapshot.selection, Selection::caret(13));
    }

    #[test]
    fn auto_pair_wraps_selection() {
        let mut snapshot = PaneSnapshot::new("value");
        snapshot.set_selection(Selection::new(0, 5));
        let pair = PaneCommand::pair_for('(').unwrap();
        run_command(&mut snapshot, pair).unwrap();
        assert_eq!(snapshot.text, "(value)");
        assert_eq!(snapshot.selection, Selection::new(1, 6));
        assert_eq!(PaneCommand::pair_for('a'), None);
    }

    #[test]
    fn converts_textarea_offsets() {
        let text = "é😀x";
        assert_eq!(utf16_to_byte(text, 0), 0);
        assert_eq!(utf16_to_byte(text, 1), 2);
        assert_eq!(utf16_to_byte(text, 3), 6);
        assert_eq!(utf16_to_byte(text, 10), text.len());
        assert_eq!(byte_to_utf16(text, 6), 3);
    }
}
