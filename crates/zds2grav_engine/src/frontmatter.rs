use zds2grav_core::PageHeader;

#[derive(Debug, thiserror::Error)]
#[error("cannot serialize page header: {0}")]
pub struct FrontMatterError(#[from] serde_yaml::Error);

/// `---\n<yaml header>---\n\n<body>\n`, the layout Grav expects in a page file.
pub fn build_markdown_document(header: &PageHeader, body: &str) -> Result<String, FrontMatterError> {
    let yaml = serde_yaml::to_string(header)?;
    let body = body.trim_end();
    Ok(format!("---\n{yaml}---\n\n{body}\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use zds2grav_core::{Author, Taxonomy};

    #[test]
    fn header_is_fenced_yaml_followed_by_body() {
        let header = PageHeader {
            title: "Un titre: avec deux-points".to_string(),
            summary: None,
            taxonomy: Taxonomy {
                tag: vec!["rust".to_string()],
                category: vec![],
                author: vec!["Alice".to_string()],
            },
            author: Author {
                name: "Alice".to_string(),
            },
            date: Some("09:05 04-03-2021".to_string()),
            license: Some("by-sa".to_string()),
            visible: true,
            canonical: None,
        };

        let doc = build_markdown_document(&header, "Corps\n").unwrap();
        assert!(doc.starts_with("---\ntitle: "));
        assert!(doc.ends_with("---\n\nCorps\n"));

        let yaml = doc
            .strip_prefix("---\n")
            .and_then(|rest| rest.split("---\n\n").next())
            .unwrap();
        let parsed: serde_yaml::Value = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(parsed["title"].as_str(), Some("Un titre: avec deux-points"));
        assert_eq!(parsed["taxonomy"]["tag"][0].as_str(), Some("rust"));
        assert_eq!(parsed["author"]["name"].as_str(), Some("Alice"));
        assert_eq!(parsed["date"].as_str(), Some("09:05 04-03-2021"));
        assert_eq!(parsed["visible"].as_bool(), Some(true));
        assert!(parsed.get("abstract").is_none());
        assert!(parsed["taxonomy"].get("category").is_none());
    }
}
