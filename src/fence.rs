use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

use crate::buffers::PartialBuffers;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FenceLanguage {
    TypeScript,
    JavaScript,
    Html,
    Scss,
    Css,
    Other(String),
}

impl FenceLanguage {
    pub fn from_tag(tag: &str) -> Self {
        let tag = tag.trim().to_lowercase();
        match tag.as_str() {
            "ts" | "tsx" | "typescript" | "logic" => Self::TypeScript,
            "js" | "jsx" | "javascript" => Self::JavaScript,
            "html" | "htm" | "markup" => Self::Html,
            "scss" | "sass" | "less" | "style" => Self::Scss,
            "css" => Self::Css,
            "" => Self::Other("text".to_string()),
            _ => Self::Other(tag),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodeFence {
    pub tag: String,
    pub language: FenceLanguage,
    pub body: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedFences {
    pub markup: Option<String>,
    pub style: Option<String>,
    pub logic: Option<String>,
    pub css: Option<String>,
    pub javascript: Option<String>,
    pub has_code: bool,
    pub original: String,
}

impl ParsedFences {
    pub fn to_editor_buffers(&self) -> PartialBuffers {
        PartialBuffers {
            markup: self.markup.clone(),
            style: self.style.clone(),
            logic: self.logic.clone(),
        }
    }
}

fn fence_regex() -> &'static Regex {
    static RE_FENCE: OnceLock<Regex> = OnceLock::new();
    RE_FENCE.get_or_init(|| Regex::new(r"```([^\n`]*)\n([\s\S]*?)```").unwrap())
}

pub fn extract_fences(text: &str) -> Vec<CodeFence> {
    fence_regex()
        .captures_iter(text)
        .filter_map(|cap| {
            let info = cap.get(1).map(|m| m.as_str()).unwrap_or_default();
            let body = cap.get(2).map(|m| m.as_str()).unwrap_or_default().trim();
            if body.is_empty() {
                return None;
            }
            let tag = info
                .split_whitespace()
                .next()
                .map(str::to_lowercase)
                .unwrap_or_else(|| "text".to_string());
            Some(CodeFence {
                language: FenceLanguage::from_tag(&tag),
                tag,
                body: body.to_string(),
            })
        })
        .collect()
}

/// Buckets fences into slots. Typed fences overwrite (last wins); `css` and
/// `js` fences only fill `style`/`logic` while those are still unset.
pub fn parse(text: &str) -> ParsedFences {
    let mut parsed = ParsedFences {
        original: text.to_string(),
        ..ParsedFences::default()
    };

    for fence in extract_fences(text) {
        parsed.has_code = true;
        match fence.language {
            FenceLanguage::TypeScript => parsed.logic = Some(fence.body),
            FenceLanguage::Html => parsed.markup = Some(fence.body),
            FenceLanguage::Scss => parsed.style = Some(fence.body),
            FenceLanguage::Css => {
                if parsed.style.is_none() {
                    parsed.style = Some(fence.body.clone());
                }
                parsed.css = Some(fence.body);
            }
            FenceLanguage::JavaScript => {
                if parsed.logic.is_none() {
                    parsed.logic = Some(fence.body.clone());
                }
                parsed.javascript = Some(fence.body);
            }
            FenceLanguage::Other(_) => {}
        }
    }

    parsed
}

pub fn has_fences(text: &str) -> bool {
    fence_regex().is_match(text)
}

/// Removes fence regions and collapses the leftover blank runs to a single
/// blank line. Text without fences comes back untouched.
pub fn strip_fences(text: &str) -> Cow<'_, str> {
    static RE_BLANKS: OnceLock<Regex> = OnceLock::new();

    if !has_fences(text) {
        return Cow::Borrowed(text);
    }
    let re_blanks = RE_BLANKS.get_or_init(|| Regex::new(r"\n[ \t]*(?:\n[ \t]*)+\n").unwrap());
    let stripped = fence_regex().replace_all(text, "");
    let collapsed = re_blanks.replace_all(&stripped, "\n\n");
    Cow::Owned(collapsed.trim().to_string())
}

pub fn is_explanation_only(text: &str) -> bool {
    if !has_fences(text) || text.is_empty() {
        return true;
    }
    let removed = text.len().saturating_sub(strip_fences(text).len());
    (removed as f64) < text.len() as f64 * 0.2
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_typescript_and_html() {
        let input = "```typescript\nconst x = 1;\n```\n```html\n<div>Hi</div>\n```";
        let parsed = parse(input);
        assert_eq!(parsed.logic.as_deref(), Some("const x = 1;"));
        assert_eq!(parsed.markup.as_deref(), Some("<div>Hi</div>"));
        assert_eq!(parsed.style, None);
        assert!(parsed.has_code);
        assert_eq!(parsed.original, input);
    }

    #[test]
    fn plain_text_has_no_code() {
        let parsed = parse("just text, no code");
        assert_eq!(
            parsed,
            ParsedFences {
                original: "just text, no code".to_string(),
                ..ParsedFences::default()
            }
        );
        assert_eq!(strip_fences("just text, no code"), "just text, no code");
    }

    #[test]
    fn logic_slot_ignores_surrounding_prose() {
        let parsed = parse("Here you go:\n```ts\n\n  let a = 2;  \n\n```\nEnjoy!");
        assert_eq!(parsed.logic.as_deref(), Some("let a = 2;"));
    }

    #[test]
    fn later_fence_of_same_type_wins() {
        let parsed = parse("```html\n<p>one</p>\n```\n```htm\n<p>two</p>\n```");
        assert_eq!(parsed.markup.as_deref(), Some("<p>two</p>"));
    }

    #[test]
    fn css_fills_style_only_when_unset() {
        let css_only = parse("```css\n.a { color: red; }\n```");
        assert_eq!(css_only.style.as_deref(), Some(".a { color: red; }"));
        assert_eq!(css_only.css.as_deref(), Some(".a { color: red; }"));

        let both = parse("```scss\n.a { b: c; }\n```\n```css\n.x { y: z; }\n```");
        assert_eq!(both.style.as_deref(), Some(".a { b: c; }"));
        assert_eq!(both.css.as_deref(), Some(".x { y: z; }"));
    }

    #[test]
    fn javascript_is_fallback_for_logic() {
        let js_only = parse("```js\nconsole.log(1)\n```");
        assert_eq!(js_only.logic.as_deref(), Some("console.log(1)"));
        assert_eq!(js_only.javascript.as_deref(), Some("console.log(1)"));

        let ts_first = parse("```tsx\nlet a: number = 1;\n```\n```jsx\nlet b = 2;\n```");
        assert_eq!(ts_first.logic.as_deref(), Some("let a: number = 1;"));
        assert_eq!(ts_first.javascript.as_deref(), Some("let b = 2;"));
    }

    #[test]
    fn empty_and_unterminated_fences_are_ignored() {
        let parsed = parse("```ts\n   \n```\nand then\n```html\n<div>");
        assert_eq!(parsed.logic, None);
        assert_eq!(parsed.markup, None);
        assert!(!parsed.has_code);
    }

    #[test]
    fn untagged_fence_counts_as_code_without_slot() {
        let fences = extract_fences("```\nplain\n```");
        assert_eq!(fences.len(), 1);
        assert_eq!(fences[0].tag, "text");
        assert_eq!(fences[0].language, FenceLanguage::Other("text".to_string()));

        let parsed = parse("```\nplain\n```");
        assert!(parsed.has_code);
        assert!(parsed.to_editor_buffers().is_empty());
    }

    #[test]
    fn language_tags_are_normalized() {
        assert_eq!(FenceLanguage::from_tag(" TS "), FenceLanguage::TypeScript);
        assert_eq!(FenceLanguage::from_tag("sass"), FenceLanguage::Scss);
        assert_eq!(FenceLanguage::from_tag("less"), FenceLanguage::Scss);
        assert_eq!(FenceLanguage::from_tag("JSX"), FenceLanguage::JavaScript);
        assert_eq!(
            FenceLanguage::from_tag("python"),
            FenceLanguage::Other("python".to_string())
        );
    }

    #[test]
    fn strips_fences_and_collapses_blank_lines() {
        let input = "Intro line.\n\n```ts\nlet a = 1;\n```\n\n\nOutro line.";
        assert_eq!(strip_fences(input), "Intro line.\n\nOutro line.");
        assert!(has_fences(input));
        assert!(!has_fences("no fences `inline` only"));
    }

    #[test]
    fn classifies_explanation_only_responses() {
        assert!(is_explanation_only("Nothing but words here."));

        let mostly_code = "Code:\n```ts\nexport class Widget { render() { return 42; } }\n```";
        assert!(!is_explanation_only(mostly_code));

        let prose = "A long explanation of the approach. ".repeat(20);
        let mostly_prose = format!("{prose}\n```ts\nx()\n```");
        assert!(is_explanation_only(&mostly_prose));
    }
}
