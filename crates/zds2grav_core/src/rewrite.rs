//! Content rewriter: relocates in-document links and image references.
//!
//! Rewriting is a pure function of the body, the link and media indexes, and
//! the path of the page the body lands on. Nothing is shared between calls,
//! so extracts can be rewritten in any order.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;
use std::sync::LazyLock;

use grav_logging::{grav_debug, grav_error};
use regex::{Captures, Regex};

use crate::error::ConversionWarning;
use crate::media::{MediaIndex, MediaReference};

static IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    compile(r#"!\[(?P<alt>[^\]]*)\]\(\s*(?P<src><[^>]*>|[^\s)]+)(?P<title>\s+"[^"]*")?\s*\)"#)
});

static LINK: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r#"(?P<bang>!?)\[(?P<text>(?:[^\[\]]|\[[^\]]*\])*)\]\(\s*(?P<target>[^\s)]+)(?P<title>\s+"[^"]*")?\s*\)"#,
    )
});

/// `![alt][label]`, `![alt][]` and `![label]`; inline images are filtered
/// out by the caller.
static IMAGE_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    compile(r#"!\[(?P<alt>[^\]]*)\](?:\[(?P<label>[^\]]*)\])?"#)
});

/// Link reference definition: `[label]: destination "title"`.
static DEFINITION: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r#"(?m)^(?P<indent> {0,3})\[(?P<label>[^\]]+)\]:[ \t]*(?P<dest><[^>\n]*>|[^\s]+)(?P<rest>[^\n]*)$"#,
    )
});

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|err| {
        grav_error!("failed to compile markdown pattern: {err}");
        // A word boundary that is also a non-boundary never matches.
        Regex::new(r"\b\B").expect("never-matching pattern compiles")
    })
}

/// Where an in-document identifier lands after projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTarget {
    pub segments: Vec<String>,
    /// Heading anchor inside the page, for extracts merged into a flat page.
    pub anchor: Option<String>,
}

/// Legacy identifier → projected location, for every node of a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkIndex {
    targets: BTreeMap<String, LinkTarget>,
}

impl LinkIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, target: LinkTarget) {
        self.targets.insert(id.into(), target);
    }

    pub fn get(&self, id: &str) -> Option<&LinkTarget> {
        self.targets.get(id)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Everything a body needs to be relocated onto one page.
#[derive(Debug, Clone, Copy)]
pub struct RewriteContext<'a> {
    pub links: &'a LinkIndex,
    pub media: &'a MediaIndex,
    pub page: &'a [String],
}

/// Result of rewriting one body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rewritten {
    pub body: String,
    pub assets: BTreeSet<MediaReference>,
    pub warnings: Vec<ConversionWarning>,
}

/// Rewrite fragment links and image references of `body` for `ctx.page`.
///
/// Inline forms and reference definitions are both handled. Unknown fragment
/// targets stay as written and produce an
/// [`ConversionWarning::UnresolvedLink`]. Code blocks and code spans are
/// untouched.
pub fn rewrite_body(body: &str, ctx: RewriteContext<'_>) -> Rewritten {
    let mut rewriter = Rewriter {
        ctx,
        page_path: ctx.page.join("/"),
        image_labels: image_reference_labels(body),
        assets: BTreeSet::new(),
        warnings: Vec::new(),
    };
    let body = map_prose(body, |chunk| rewriter.prose(chunk));

    Rewritten {
        body,
        assets: rewriter.assets,
        warnings: rewriter.warnings,
    }
}

struct Rewriter<'a> {
    ctx: RewriteContext<'a>,
    page_path: String,
    image_labels: BTreeSet<String>,
    assets: BTreeSet<MediaReference>,
    warnings: Vec<ConversionWarning>,
}

impl Rewriter<'_> {
    fn prose(&mut self, chunk: &str) -> String {
        let spans = code_spans(chunk);
        let with_images = IMAGE.replace_all(chunk, |caps: &Captures<'_>| {
            if starts_in_code(&spans, caps) {
                return caps[0].to_string();
            }
            match self.image(unbracket(&caps["src"])) {
                Some(name) => {
                    let title = caps.name("title").map_or("", |m| m.as_str());
                    format!("![{}]({name}{title})", &caps["alt"])
                }
                None => caps[0].to_string(),
            }
        });

        let spans = code_spans(&with_images);
        let with_links = LINK.replace_all(&with_images, |caps: &Captures<'_>| {
            if starts_in_code(&spans, caps) || !caps["bang"].is_empty() {
                return caps[0].to_string();
            }
            match self.fragment(&caps["target"]) {
                Some(href) => {
                    let title = caps.name("title").map_or("", |m| m.as_str());
                    format!("[{}]({href}{title})", &caps["text"])
                }
                None => caps[0].to_string(),
            }
        });

        let spans = code_spans(&with_links);
        DEFINITION
            .replace_all(&with_links, |caps: &Captures<'_>| {
                if starts_in_code(&spans, caps) {
                    return caps[0].to_string();
                }
                let dest = unbracket(&caps["dest"]);
                let replaced = if self.image_labels.contains(&normalize_label(&caps["label"])) {
                    self.image(dest)
                } else {
                    self.fragment(dest)
                };
                match replaced {
                    Some(dest) => format!(
                        "{}[{}]: {dest}{}",
                        &caps["indent"], &caps["label"], &caps["rest"]
                    ),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    /// Resolved file name of an image source, recorded as a page asset.
    fn image(&mut self, src: &str) -> Option<String> {
        let reference = self.ctx.media.get(src)?;
        self.assets.insert(reference.clone());
        Some(reference.resolved_name.clone())
    }

    /// New href for a `#id` target; `None` leaves the target as written.
    fn fragment(&mut self, target: &str) -> Option<String> {
        let id = target.strip_prefix('#').filter(|id| !id.is_empty())?;
        match self.ctx.links.get(id) {
            Some(found) => {
                let href = href_between(self.ctx.page, found);
                grav_debug!("link #{id} on /{} now points at {href}", self.page_path);
                Some(href)
            }
            None => {
                self.warnings.push(ConversionWarning::UnresolvedLink {
                    page: self.page_path.clone(),
                    target: target.to_string(),
                });
                None
            }
        }
    }
}

/// Every image source referenced outside code, in order of appearance:
/// inline images first, then definitions used by image references.
/// `data:` URIs are skipped.
pub fn image_sources(body: &str) -> Vec<String> {
    let labels = image_reference_labels(body);
    let mut sources = Vec::new();
    for text in prose_chunks(body) {
        let spans = code_spans(text);
        for caps in IMAGE.captures_iter(text) {
            if !starts_in_code(&spans, &caps) {
                sources.push(unbracket(&caps["src"]).to_string());
            }
        }
        for caps in DEFINITION.captures_iter(text) {
            if !starts_in_code(&spans, &caps) && labels.contains(&normalize_label(&caps["label"])) {
                sources.push(unbracket(&caps["dest"]).to_string());
            }
        }
    }
    sources.retain(|src| !src.is_empty() && !src.to_ascii_lowercase().starts_with("data:"));
    sources
}

/// Normalized labels of the reference-style images of `body`.
fn image_reference_labels(body: &str) -> BTreeSet<String> {
    let mut labels = BTreeSet::new();
    for text in prose_chunks(body) {
        let spans = code_spans(text);
        for caps in IMAGE_REFERENCE.captures_iter(text) {
            if starts_in_code(&spans, &caps) {
                continue;
            }
            let label = match caps.name("label") {
                Some(label) if !label.as_str().trim().is_empty() => label.as_str(),
                Some(_) => &caps["alt"],
                None => {
                    let end = caps.get(0).map_or(0, |m| m.end());
                    if text[end..].starts_with('(') {
                        continue;
                    }
                    &caps["alt"]
                }
            };
            labels.insert(normalize_label(label));
        }
    }
    labels
}

/// Labels match case-insensitively with inner whitespace collapsed.
fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Relative path from one page directory to another.
///
/// Each segment of `from` that is not shared with `to` becomes `..`, then the
/// remaining segments of `to` follow. Identical pages give `./`.
pub fn relative_path(from: &[String], to: &[String]) -> String {
    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let parts: Vec<&str> = std::iter::repeat("..")
        .take(from.len() - common)
        .chain(to[common..].iter().map(String::as_str))
        .collect();
    if parts.is_empty() {
        "./".to_string()
    } else {
        parts.join("/")
    }
}

fn href_between(page: &[String], target: &LinkTarget) -> String {
    match &target.anchor {
        Some(anchor) if page == target.segments.as_slice() => format!("#{anchor}"),
        Some(anchor) => format!("{}#{anchor}", relative_path(page, &target.segments)),
        None => relative_path(page, &target.segments),
    }
}

fn unbracket(src: &str) -> &str {
    src.strip_prefix('<')
        .and_then(|s| s.strip_suffix('>'))
        .unwrap_or(src)
        .trim()
}

/// Demote every heading by one level, as needed when an extract body is
/// nested under a generated `# title` heading.
///
/// ATX headings gain a `#` (level 6 stays 6). Setext level 1 underlines
/// (`===`) become `---`, and setext level 2 headings become `### ` headings.
pub fn shift_headings(body: &str) -> String {
    map_prose(body, shift_prose_headings)
}

fn shift_prose_headings(chunk: &str) -> String {
    let lines: Vec<&str> = chunk.split_inclusive('\n').collect();
    let mut out = String::with_capacity(chunk.len() + 16);
    let mut i = 0;
    while i < lines.len() {
        let (content, ending) = split_line_ending(lines[i]);
        let next = lines.get(i + 1).map(|line| split_line_ending(line));

        if let Some(level) = atx_level(content) {
            if level < 6 {
                out.push('#');
            }
            out.push_str(lines[i]);
            i += 1;
            continue;
        }

        if !content.trim().is_empty() {
            if let Some((underline, next_ending)) = next {
                if is_underline(underline, '=') {
                    out.push_str(lines[i]);
                    out.push_str(&"-".repeat(underline.len()));
                    out.push_str(next_ending);
                    i += 2;
                    continue;
                }
                if is_underline(underline, '-') {
                    out.push_str("### ");
                    out.push_str(content);
                    out.push_str(next_ending);
                    i += 2;
                    continue;
                }
            }
        }

        out.push_str(content);
        out.push_str(ending);
        i += 1;
    }
    out
}

fn atx_level(line: &str) -> Option<usize> {
    let hashes = line.chars().take_while(|&c| c == '#').count();
    let rest = &line[hashes..];
    ((1..=6).contains(&hashes) && rest.starts_with(' ')).then_some(hashes)
}

fn is_underline(line: &str, marker: char) -> bool {
    line.len() >= 2 && line.chars().all(|c| c == marker)
}

fn split_line_ending(line: &str) -> (&str, &str) {
    if let Some(content) = line.strip_suffix("\r\n") {
        (content, "\r\n")
    } else if let Some(content) = line.strip_suffix('\n') {
        (content, "\n")
    } else {
        (line, "")
    }
}

enum Chunk<'a> {
    Prose(&'a str),
    Code(&'a str),
}

#[derive(Clone, Copy)]
enum Block {
    Fenced(char, usize),
    Indented,
}

/// Split markdown into prose runs and code blocks. Fenced blocks keep their
/// fences. Indented blocks open after a blank line, unless the indentation
/// continues a list item.
fn chunks(body: &str) -> Vec<Chunk<'_>> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut offset = 0;
    let mut open: Option<Block> = None;
    let mut after_blank = true;
    let mut in_list = false;

    for line in body.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        let blank = line.trim().is_empty();

        match open {
            Some(Block::Fenced(fence, len)) => {
                if let Some((closing, closing_len, true)) = fence_marker(line) {
                    if closing == fence && closing_len >= len {
                        chunks.push(Chunk::Code(&body[start..offset]));
                        start = offset;
                        open = None;
                    }
                }
                after_blank = false;
                continue;
            }
            Some(Block::Indented) if blank || is_indented(line) => continue,
            Some(Block::Indented) => {
                chunks.push(Chunk::Code(&body[start..line_start]));
                start = line_start;
                open = None;
            }
            None => {}
        }

        let opens = match fence_marker(line) {
            Some((fence, len, _)) => Some(Block::Fenced(fence, len)),
            None if !blank && after_blank && !in_list && is_indented(line) => Some(Block::Indented),
            None => None,
        };
        if let Some(block) = opens {
            if line_start > start {
                chunks.push(Chunk::Prose(&body[start..line_start]));
            }
            start = line_start;
            open = Some(block);
        } else if !blank {
            in_list = is_list_item(line) || (in_list && (is_indented(line) || !after_blank));
        }
        after_blank = blank;
    }

    if start < body.len() {
        let rest = &body[start..];
        chunks.push(if open.is_some() {
            Chunk::Code(rest)
        } else {
            Chunk::Prose(rest)
        });
    }
    chunks
}

fn prose_chunks(body: &str) -> impl Iterator<Item = &str> {
    chunks(body).into_iter().filter_map(|chunk| match chunk {
        Chunk::Prose(text) => Some(text),
        Chunk::Code(_) => None,
    })
}

fn is_indented(line: &str) -> bool {
    line.starts_with("    ") || line.starts_with('\t')
}

/// `- `, `* `, `+ `, `1. ` or `1) ` after at most three spaces.
fn is_list_item(line: &str) -> bool {
    let trimmed = line.trim_start_matches(' ');
    if line.len() - trimmed.len() > 3 {
        return false;
    }
    if ["- ", "* ", "+ "].iter().any(|bullet| trimmed.starts_with(bullet)) {
        return true;
    }
    let digits = trimmed.chars().take_while(char::is_ascii_digit).count();
    digits > 0 && (trimmed[digits..].starts_with(". ") || trimmed[digits..].starts_with(") "))
}

/// Byte ranges of the code spans of a prose run. A backtick run opens a span
/// closed by the next run of the same length in the same paragraph;
/// unmatched runs are literal backticks.
fn code_spans(text: &str) -> Vec<Range<usize>> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'`' {
            i += 1;
            continue;
        }
        let run = backtick_run(bytes, i);
        match closing_run(bytes, i + run, run) {
            Some(end) => {
                spans.push(i..end);
                i = end;
            }
            None => i += run,
        }
    }
    spans
}

fn backtick_run(bytes: &[u8], at: usize) -> usize {
    bytes[at..].iter().take_while(|&&b| b == b'`').count()
}

fn closing_run(bytes: &[u8], from: usize, len: usize) -> Option<usize> {
    let mut j = from;
    while j < bytes.len() {
        match bytes[j] {
            b'`' => {
                let run = backtick_run(bytes, j);
                if run == len {
                    return Some(j + run);
                }
                j += run;
            }
            b'\n' if next_line_is_blank(&bytes[j + 1..]) => return None,
            _ => j += 1,
        }
    }
    None
}

fn next_line_is_blank(rest: &[u8]) -> bool {
    rest.iter()
        .find(|&&b| !matches!(b, b' ' | b'\t' | b'\r'))
        .is_none_or(|&b| b == b'\n')
}

fn starts_in_code(spans: &[Range<usize>], caps: &Captures<'_>) -> bool {
    let start = caps.get(0).map_or(0, |m| m.start());
    spans.iter().any(|span| span.contains(&start))
}

/// `(fence char, run length, nothing but whitespace after the run)`.
fn fence_marker(line: &str) -> Option<(char, usize, bool)> {
    let trimmed = line.trim_start_matches(' ');
    let fence = trimmed.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let len = trimmed.chars().take_while(|&c| c == fence).count();
    (len >= 3).then(|| (fence, len, trimmed[len..].trim().is_empty()))
}

fn map_prose(body: &str, mut f: impl FnMut(&str) -> String) -> String {
    let mut out = String::with_capacity(body.len());
    for chunk in chunks(body) {
        match chunk {
            Chunk::Prose(text) => out.push_str(&f(text)),
            Chunk::Code(text) => out.push_str(text),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn segs(path: &str) -> Vec<String> {
        path.split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn relative_path_between_pages() {
        assert_eq!(relative_path(&segs("01.a/01.x"), &segs("02.b")), "../../02.b");
        assert_eq!(relative_path(&segs("01.a/01.x"), &segs("01.a/02.y")), "../02.y");
        assert_eq!(relative_path(&segs("01.a"), &segs("01.a/02.y")), "02.y");
        assert_eq!(relative_path(&segs("01.a"), &segs("01.a")), "./");
        assert_eq!(relative_path(&[], &segs("01.a")), "01.a");
    }

    #[test]
    fn shifts_atx_headings() {
        let body = "# Header 1\n\nLorem ipsum\n\n## Header 2\n\n##### Header 5\n\n###### Header 6\n";
        assert_eq!(
            shift_headings(body),
            "## Header 1\n\nLorem ipsum\n\n### Header 2\n\n###### Header 5\n\n###### Header 6\n"
        );
    }

    #[test]
    fn shifts_setext_headings() {
        let body = "\nHeader 1\n========\n\nHeader 2\n--------\n";
        assert_eq!(shift_headings(body), "\nHeader 1\n--------\n\n### Header 2\n");
    }

    #[test]
    fn horizontal_rules_are_not_headings() {
        let body = "Paragraph\n\n------\n\nMore";
        assert_eq!(shift_headings(body), body);
    }

    #[test]
    fn code_blocks_are_left_alone() {
        let body = "# Title\n```bash\n# comment\n![x](y.png)\n```\n![a](b.png)\n";
        assert_eq!(
            shift_headings(body),
            "## Title\n```bash\n# comment\n![x](y.png)\n```\n![a](b.png)\n"
        );
        assert_eq!(image_sources(body), vec!["b.png".to_string()]);
    }

    #[test]
    fn image_sources_skip_data_uris_and_unwrap_brackets() {
        let body = "![a](<images/a b.png>) ![b](data:image/png;base64,AAAA) ![c](/media/c.jpg \"C\")";
        assert_eq!(
            image_sources(body),
            vec!["images/a b.png".to_string(), "/media/c.jpg".to_string()]
        );
    }

    #[test]
    fn rewrites_links_and_images() {
        let mut links = LinkIndex::new();
        links.insert(
            "other",
            LinkTarget {
                segments: segs("02.other"),
                anchor: None,
            },
        );
        let media = MediaIndex::resolve(["img/pic.png"]);
        let page = segs("01.intro/01.first");
        let ctx = RewriteContext {
            links: &links,
            media: &media,
            page: &page,
        };

        let out = rewrite_body(
            "See [there](#other \"Other\"), [web](https://x.org) and ![pic](img/pic.png).",
            ctx,
        );

        assert_eq!(
            out.body,
            "See [there](../../02.other \"Other\"), [web](https://x.org) and ![pic](pic.png)."
        );
        assert_eq!(out.assets.len(), 1);
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn images_inside_links_are_rewritten() {
        let links = LinkIndex::new();
        let media = MediaIndex::resolve(["https://cdn.example/big.png"]);
        let page = segs("01.a");
        let ctx = RewriteContext {
            links: &links,
            media: &media,
            page: &page,
        };
        let out = rewrite_body(
            "[![thumb](https://cdn.example/big.png)](https://cdn.example/big.png)",
            ctx,
        );
        assert_eq!(out.body, "[![thumb](big.png)](https://cdn.example/big.png)");
    }

    #[test]
    fn unknown_fragments_are_reported_and_kept() {
        let links = LinkIndex::new();
        let media = MediaIndex::default();
        let page = segs("01.a");
        let ctx = RewriteContext {
            links: &links,
            media: &media,
            page: &page,
        };
        let out = rewrite_body("Hello [link](#other)", ctx);
        assert_eq!(out.body, "Hello [link](#other)");
        assert_eq!(
            out.warnings,
            vec![ConversionWarning::UnresolvedLink {
                page: "01.a".to_string(),
                target: "#other".to_string(),
            }]
        );
    }

    #[test]
    fn anchors_on_the_same_page_stay_fragments() {
        let mut links = LinkIndex::new();
        links.insert(
            "part",
            LinkTarget {
                segments: segs("01.doc"),
                anchor: Some("part".to_string()),
            },
        );
        let media = MediaIndex::default();
        let page = segs("01.doc");
        let ctx = RewriteContext {
            links: &links,
            media: &media,
            page: &page,
        };
        assert_eq!(rewrite_body("[p](#part)", ctx).body, "[p](#part)");
    }

    #[test]
    fn code_spans_and_indented_code_are_literal() {
        let links = LinkIndex::new();
        let media = MediaIndex::resolve(["real.png"]);
        let page = segs("01.a");
        let ctx = RewriteContext {
            links: &links,
            media: &media,
            page: &page,
        };
        let body = "Write `[x](#nowhere)` or ``![a](`fake.png`)`` literally.\n\n    [y](#missing)\n    ![b](other.png)\n\nThen ![r](real.png).\n";

        assert_eq!(image_sources(body), vec!["real.png".to_string()]);
        let out = rewrite_body(body, ctx);
        assert_eq!(
            out.body,
            "Write `[x](#nowhere)` or ``![a](`fake.png`)`` literally.\n\n    [y](#missing)\n    ![b](other.png)\n\nThen ![r](real.png).\n"
        );
        assert!(out.warnings.is_empty());
        assert_eq!(out.assets.len(), 1);
    }

    #[test]
    fn list_continuations_are_not_code() {
        let body = "- item\n\n    ![nested](in-list.png)\n\nUnclosed ` tick and ![after](after.png)\n";
        assert_eq!(
            image_sources(body),
            vec!["in-list.png".to_string(), "after.png".to_string()]
        );
    }

    #[test]
    fn reference_definitions_are_rewritten() {
        let mut links = LinkIndex::new();
        links.insert(
            "part",
            LinkTarget {
                segments: segs("02.part"),
                anchor: None,
            },
        );
        let media = MediaIndex::resolve(["img/logo.png"]);
        let page = segs("01.intro");
        let ctx = RewriteContext {
            links: &links,
            media: &media,
            page: &page,
        };
        let body = "See ![logo][L] and [part][p].\n\n[l]: img/logo.png \"Logo\"\n[p]: #part\n[gone]: #gone\n";

        assert_eq!(image_sources(body), vec!["img/logo.png".to_string()]);
        let out = rewrite_body(body, ctx);
        assert_eq!(
            out.body,
            "See ![logo][L] and [part][p].\n\n[l]: logo.png \"Logo\"\n[p]: ../02.part\n[gone]: #gone\n"
        );
        assert_eq!(out.assets.len(), 1);
        assert_eq!(
            out.warnings,
            vec![ConversionWarning::UnresolvedLink {
                page: "01.intro".to_string(),
                target: "#gone".to_string(),
            }]
        );
    }

    #[test]
    fn shortcut_image_references_use_the_alt_text() {
        let body = "![Schema] and ![Chart][]\n\n[schema]: <figures/schema one.png>\n[chart]: chart.svg\n[site]: https://example.org\n";
        assert_eq!(
            image_sources(body),
            vec!["figures/schema one.png".to_string(), "chart.svg".to_string()]
        );
    }
}
