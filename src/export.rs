use tracing::warn;

use crate::buffers::{CodeBuffers, Slot};
use crate::preview;

pub const BUFFERS_STORAGE_KEY: &str = "codepilot.buffers";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportFile {
    pub name: String,
    pub mime: &'static str,
    pub contents: String,
}

fn slot_file_suffix(slot: Slot) -> (&'static str, &'static str) {
    match slot {
        Slot::Markup => ("component.html", "text/html"),
        Slot::Style => ("component.scss", "text/x-scss"),
        Slot::Logic => ("component.ts", "text/typescript"),
    }
}

pub fn export_files(buffers: &CodeBuffers, base_name: &str) -> Vec<ExportFile> {
    let base = sanitize_base_name(base_name);
    Slot::ALL
        .iter()
        .filter(|slot| !buffers.get(**slot).trim().is_empty())
        .map(|&slot| {
            let (suffix, mime) = slot_file_suffix(slot);
            ExportFile {
                name: format!("{base}.{suffix}"),
                mime,
                contents: buffers.get(slot).to_string(),
            }
        })
        .collect()
}

pub fn export_document(buffers: &CodeBuffers, base_name: &str) -> Option<ExportFile> {
    let contents = preview::build_document(buffers)?;
    Some(ExportFile {
        name: format!("{}.preview.html", sanitize_base_name(base_name)),
        mime: "text/html",
        contents,
    })
}

fn sanitize_base_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('-').to_string();
    if cleaned.is_empty() {
        "generated".to_string()
    } else {
        cleaned
    }
}

pub fn to_snapshot_json(buffers: &CodeBuffers) -> Result<String, serde_json::Error> {
    serde_json::to_string(buffers)
}

pub fn from_snapshot_json(raw: &str) -> Option<CodeBuffers> {
    match serde_json::from_str::<CodeBuffers>(raw) {
        Ok(buffers) => Some(buffers),
        Err(err) => {
            warn!(error = %err, "ignoring malformed buffer snapshot");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn exports_only_populated_slots() {
        let buffers = CodeBuffers::new("<p>x</p>", "  ", "run();");
        let names: Vec<String> = export_files(&buffers, "Pricing Card")
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(
            names,
            vec!["pricing-card.component.html", "pricing-card.component.ts"]
        );
    }

    #[test]
    fn blank_base_name_gets_default() {
        let files = export_files(&CodeBuffers::new("", "a {}", ""), "  !! ");
        assert_eq!(files[0].name, "generated.component.scss");
        assert_eq!(files[0].contents, "a {}");
    }

    #[test]
    fn document_export_skips_blank_sets() {
        assert_eq!(export_document(&CodeBuffers::default(), "x"), None);
        let doc = export_document(&CodeBuffers::new("<i>a</i>", "", ""), "x").unwrap();
        assert_eq!(doc.name, "x.preview.html");
        assert!(doc.contents.contains("<i>a</i>"));
    }

    #[test]
    fn snapshot_json_restores_buffers() {
        let buffers = CodeBuffers::new("<a></a>", "a {}", "a();");
        let raw = to_snapshot_json(&buffers).unwrap();
        assert_eq!(from_snapshot_json(&raw), Some(buffers));
        assert_eq!(
            from_snapshot_json(r#"{"logic":"only"}"#),
            Some(CodeBuffers::new("", "", "only"))
        );
        assert_eq!(from_snapshot_json("not json"), None);
    }
}
