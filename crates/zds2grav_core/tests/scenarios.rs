use std::collections::BTreeMap;

use pretty_assertions::assert_eq;
use serde_json::json;
use zds2grav_core::{
    convert, ConversionConfig, ConversionError, ConversionWarning, DocumentType, ExternalMetadata,
    PageRole, RawDocument,
};

fn raw(manifest: serde_json::Value, texts: &[(&str, &str)]) -> RawDocument {
    RawDocument {
        manifest: manifest.to_string(),
        texts: texts
            .iter()
            .map(|(path, text)| (path.to_string(), text.to_string()))
            .collect::<BTreeMap<_, _>>(),
        external: ExternalMetadata::default(),
    }
}

fn flat_article() -> RawDocument {
    raw(
        json!({
            "version": 2.1,
            "type": "ARTICLE",
            "title": "Un article",
            "slug": "un-article",
            "licence": "CC BY-SA",
            "authors": ["Alice"],
            "tags": ["rust", "grav"],
            "pubdate": "2020-05-17T14:30:00",
            "introduction": "introduction.md",
            "conclusion": "conclusion.md",
            "children": [
                { "object": "extract", "title": "Premier point", "slug": "premier-point", "text": "premier.md" },
                { "object": "extract", "title": "Second point", "slug": "second-point", "text": "second.md" }
            ]
        }),
        &[
            ("introduction.md", "Intro text\n"),
            ("conclusion.md", "\nThe end\n"),
            ("premier.md", "## Sub\n\nSee [next](#second-point)"),
            ("second.md", "![schema](/media/galleries/1/schema.png)"),
        ],
    )
}

#[test]
fn flat_article_becomes_a_single_page() {
    let conversion = convert(&flat_article(), &ConversionConfig::default()).unwrap();

    assert_eq!(conversion.pages.len(), 1);
    let page = &conversion.pages[0];
    assert_eq!(page.path(), "01.un-article");
    assert_eq!(page.role, PageRole::Document);
    assert_eq!(
        page.body,
        "Intro text\n\n\n# Premier point\n\n### Sub\n\nSee [next](#second-point)\n\n\n\
         # Second point\n\n![schema](schema.png)\n\n\n------\n\n\nThe end"
    );
    assert_eq!(
        page.assets
            .iter()
            .map(|asset| asset.resolved_name.as_str())
            .collect::<Vec<_>>(),
        vec!["schema.png"]
    );

    let header = &page.header;
    assert_eq!(header.title, "Un article");
    assert_eq!(header.author.name, "Alice");
    assert_eq!(header.taxonomy.tag, vec!["rust".to_string(), "grav".to_string()]);
    assert_eq!(header.date.as_deref(), Some("14:30 17-05-2020"));
    assert_eq!(header.license.as_deref(), Some("by-sa"));
    assert!(header.visible);

    assert_eq!(conversion.document.kind, DocumentType::Article);
    assert_eq!(conversion.media.len(), 1);
    assert!(conversion.report.is_empty());
}

#[test]
fn flat_article_reports_links_to_missing_targets() {
    let document = raw(
        json!({
            "type": "ARTICLE",
            "title": "Lien perdu",
            "slug": "lien-perdu",
            "children": [
                { "object": "extract", "title": "Seul point", "slug": "seul-point", "text": "seul.md" }
            ]
        }),
        &[("seul.md", "Hello [link](#other)")],
    );

    let conversion = convert(&document, &ConversionConfig::default()).unwrap();

    assert_eq!(conversion.pages.len(), 1);
    let page = &conversion.pages[0];
    assert_eq!(page.path(), "01.lien-perdu");
    assert!(page.body.ends_with("Hello [link](#other)"));
    assert_eq!(
        conversion.report.warnings(),
        &[ConversionWarning::UnresolvedLink {
            page: "01.lien-perdu".to_string(),
            target: "#other".to_string(),
        }]
    );
}

#[test]
fn repeated_extract_titles_get_numbered_anchors() {
    let document = raw(
        json!({
            "type": "ARTICLE",
            "title": "Exemples",
            "slug": "exemples",
            "introduction": "introduction.md",
            "children": [
                { "object": "extract", "title": "Exemple", "slug": "exemple-a", "text": "a.md" },
                { "object": "extract", "title": "Exemple", "slug": "exemple-b", "text": "b.md" },
                { "object": "extract", "title": "Exemple", "slug": "exemple-c", "text": "c.md" }
            ]
        }),
        &[
            ("introduction.md", "[A](#exemple-a), [B](#exemple-b) and [C](#exemple-c)"),
            ("a.md", "first"),
            ("b.md", "second"),
            ("c.md", "third"),
        ],
    );

    let conversion = convert(&document, &ConversionConfig::default()).unwrap();

    let page = &conversion.pages[0];
    assert!(page
        .body
        .starts_with("[A](#exemple), [B](#exemple-1) and [C](#exemple-2)"));
    assert!(conversion.report.is_empty());
}

fn sectioned_opinion() -> RawDocument {
    raw(
        json!({
            "type": "opinion",
            "title": "Une tribune",
            "slug": "une-tribune",
            "children": [
                {
                    "object": "container",
                    "title": "Part one",
                    "slug": "part-one",
                    "introduction": "p1/introduction.md",
                    "children": [
                        { "title": "Details", "slug": "details", "text": "p1/details.md" }
                    ]
                },
                {
                    "object": "container",
                    "title": "Part two",
                    "slug": "part-two",
                    "children": [
                        { "title": "Details", "slug": "details", "text": "p2/details.md", "authors": ["Bob"] }
                    ]
                }
            ]
        }),
        &[
            ("p1/introduction.md", "Intro of part one"),
            ("p1/details.md", "Back to [part two](#part-two)"),
            ("p2/details.md", "[first](#1-1-details) and [ambiguous](#details)"),
        ],
    )
}

#[test]
fn sectioned_opinion_nests_extracts_under_containers() {
    let conversion = convert(&sectioned_opinion(), &ConversionConfig::default()).unwrap();

    let layout: Vec<(String, PageRole)> = conversion
        .pages
        .iter()
        .map(|page| (page.path(), page.role))
        .collect();
    assert_eq!(
        layout,
        vec![
            ("01.part-one".to_string(), PageRole::Container),
            ("01.part-one/01.details".to_string(), PageRole::Extract),
            ("02.part-two".to_string(), PageRole::Container),
            ("02.part-two/01.details".to_string(), PageRole::Extract),
        ]
    );

    assert_eq!(conversion.pages[0].body, "Intro of part one");
    assert_eq!(conversion.pages[1].body, "Back to [part two](../../02.part-two)");
    assert_eq!(
        conversion.pages[3].body,
        "[first](../../01.part-one/01.details) and [ambiguous](#details)"
    );
    assert_eq!(conversion.pages[2].body, "");

    assert_eq!(conversion.pages[1].header.author.name, "Anonymous");
    assert_eq!(conversion.pages[3].header.author.name, "Bob");
    assert!(conversion.pages.iter().all(|page| page.header.visible));

    assert_eq!(
        conversion.report.warnings(),
        &[ConversionWarning::UnresolvedLink {
            page: "02.part-two/01.details".to_string(),
            target: "#details".to_string(),
        }]
    );
}

#[test]
fn tutorial_with_introduction_gets_an_unnumbered_landing_page() {
    let document = raw(
        json!({
            "type": "TUTORIAL",
            "title": "Apprendre Rust",
            "slug": "apprendre-rust",
            "description": "Tout sur Rust",
            "introduction": "introduction.md",
            "conclusion": "conclusion.md",
            "children": [
                {
                    "title": "Les bases",
                    "slug": "les-bases",
                    "children": [
                        {
                            "title": "Variables",
                            "slug": "variables",
                            "children": [
                                { "title": "Mutabilité", "slug": "mutabilite", "text": "mut.md" }
                            ]
                        }
                    ]
                }
            ]
        }),
        &[
            ("introduction.md", "Bienvenue"),
            ("conclusion.md", "Au revoir"),
            ("mut.md", "Go to [the start](#les-bases)"),
        ],
    );
    let mut document = document;
    document.external.canonical_url =
        Some("https://zestedesavoir.com/tutoriels/1/apprendre-rust/".to_string());

    let conversion = convert(&document, &ConversionConfig::default()).unwrap();

    let landing = &conversion.pages[0];
    assert!(landing.path_segments.is_empty());
    assert_eq!(landing.role, PageRole::Document);
    assert!(!landing.header.visible);
    assert_eq!(landing.body, "Bienvenue\n\n\n------\n\n\nAu revoir");
    assert_eq!(landing.header.summary.as_deref(), Some("Tout sur Rust"));
    assert_eq!(
        landing.header.canonical.as_deref(),
        Some("https://zestedesavoir.com/tutoriels/1/apprendre-rust/")
    );

    let deepest = conversion.pages.last().unwrap();
    assert_eq!(deepest.path(), "01.les-bases/01.variables/01.mutabilite");
    assert_eq!(deepest.body, "Go to [the start](../..)");
    assert_eq!(deepest.header.canonical, None);
}

#[test]
fn missing_title_fails_without_output() {
    let document = raw(
        json!({
            "type": "ARTICLE",
            "slug": "sans-titre",
            "children": [ { "title": "A", "slug": "a", "text": "a.md" } ]
        }),
        &[("a.md", "text")],
    );
    assert_eq!(
        convert(&document, &ConversionConfig::default()).unwrap_err(),
        ConversionError::MissingRequiredMetadata { field: "title" }
    );
}

fn three_levels(kind: &str) -> RawDocument {
    raw(
        json!({
            "type": kind,
            "title": "Deep",
            "slug": "deep",
            "children": [
                {
                    "title": "Level one",
                    "slug": "level-one",
                    "children": [
                        {
                            "title": "Level two",
                            "slug": "level-two",
                            "children": [
                                { "title": "Leaf", "slug": "leaf", "text": "leaf.md" }
                            ]
                        }
                    ]
                }
            ]
        }),
        &[("leaf.md", "leaf")],
    )
}

#[test]
fn articles_deeper_than_two_levels_are_rejected() {
    let err = convert(&three_levels("ARTICLE"), &ConversionConfig::default()).unwrap_err();
    assert_eq!(
        err,
        ConversionError::UnsupportedStructure {
            kind: DocumentType::Article,
            depth: 3,
            limit: 2,
        }
    );
}

#[test]
fn tutorial_depth_follows_configuration() {
    assert!(convert(&three_levels("TUTORIAL"), &ConversionConfig::default()).is_ok());

    let shallow = ConversionConfig {
        max_nesting_depth: 2,
        ..ConversionConfig::default()
    };
    assert!(matches!(
        convert(&three_levels("TUTORIAL"), &shallow),
        Err(ConversionError::UnsupportedStructure { depth: 3, limit: 2, .. })
    ));
}

#[test]
fn duplicate_sibling_order_is_malformed() {
    let document = raw(
        json!({
            "type": "ARTICLE",
            "title": "Dup",
            "slug": "dup",
            "children": [
                { "title": "A", "slug": "a", "order": 1, "text": "a.md" },
                { "title": "B", "slug": "b", "order": 1, "text": "b.md" }
            ]
        }),
        &[("a.md", "a"), ("b.md", "b")],
    );
    assert!(matches!(
        convert(&document, &ConversionConfig::default()),
        Err(ConversionError::MalformedDocument { .. })
    ));
}

#[test]
fn old_manifest_versions_are_refused() {
    let document = raw(
        json!({
            "version": 1,
            "type": "ARTICLE",
            "title": "Old",
            "slug": "old",
            "children": [ { "title": "A", "slug": "a", "text": "a.md" } ]
        }),
        &[("a.md", "a")],
    );
    assert_eq!(
        convert(&document, &ConversionConfig::default()).unwrap_err(),
        ConversionError::UnsupportedVersion {
            found: "1".to_string()
        }
    );
}

#[test]
fn scraped_metadata_fills_gaps_in_the_manifest() {
    let mut document = sectioned_opinion();
    document.external = ExternalMetadata {
        authors: vec!["Clem".to_string()],
        tags: vec!["scraped".to_string()],
        categories: vec!["Informatique".to_string()],
        published: Some("2019-01-02T08:00:00+01:00".to_string()),
        canonical_url: None,
    };
    let conversion = convert(&document, &ConversionConfig::default()).unwrap();
    let header = &conversion.pages[1].header;
    assert_eq!(header.author.name, "Clem");
    assert_eq!(header.taxonomy.tag, vec!["scraped".to_string()]);
    assert_eq!(header.taxonomy.category, vec!["Informatique".to_string()]);
    assert_eq!(header.date.as_deref(), Some("08:00 02-01-2019"));
}
