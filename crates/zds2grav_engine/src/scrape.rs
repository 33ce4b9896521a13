use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Metadata read from a published content page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentPage {
    /// Absolute URL of the export archive.
    pub download_link: String,
    pub tags: Vec<String>,
    pub authors: Vec<String>,
    pub categories: Vec<String>,
    /// Raw `datetime` attribute of the publication date.
    pub published: Option<String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ScrapeError {
    #[error("no download link on the page; it may not come from Zeste de Savoir")]
    MissingDownloadLink,
    #[error("download link {0} is not a valid url")]
    InvalidDownloadLink(String),
    #[error("invalid selector {0}")]
    Selector(&'static str),
}

fn selector(css: &'static str) -> Result<Selector, ScrapeError> {
    Selector::parse(css).map_err(|_| ScrapeError::Selector(css))
}

fn text_of(element: ElementRef<'_>) -> Option<String> {
    let text = element.text().collect::<String>();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Pull the archive link and the header metadata out of a content page.
///
/// Only the download link is required; every other field is best effort.
/// Root-relative links are resolved against `base`.
pub fn scrape_content_page(html: &str, base: &Url) -> Result<ContentPage, ScrapeError> {
    let doc = Html::parse_document(html);

    let href = doc
        .select(&selector("aside.sidebar a.download")?)
        .find_map(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .ok_or(ScrapeError::MissingDownloadLink)?;
    let download_link = base
        .join(href)
        .map_err(|_| ScrapeError::InvalidDownloadLink(href.to_string()))?
        .to_string();

    let tags = doc
        .select(&selector("ul.taglist li")?)
        .filter_map(text_of)
        .collect();

    let mut authors = Vec::new();
    let mut categories = Vec::new();
    let header_authors = selector("article.content-wrapper header div.authors")?;
    if let Some(block) = doc.select(&header_authors).next() {
        let lists: Vec<ElementRef<'_>> = block.select(&selector("ul")?).collect();
        if let Some(list) = lists.first() {
            authors = list
                .select(&selector("li a span")?)
                .filter_map(text_of)
                .collect();
        }
        if let Some(list) = lists.get(1) {
            categories = list.select(&selector("a")?).filter_map(text_of).collect();
        }
    }

    let published = doc
        .select(&selector("article.content-wrapper header span.pubdate time")?)
        .find_map(|time| time.value().attr("datetime"))
        .map(|datetime| datetime.trim().to_string())
        .filter(|datetime| !datetime.is_empty());

    Ok(ContentPage {
        download_link,
        tags,
        authors,
        categories,
        published,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PAGE: &str = r#"
<html><body>
  <article class="content-wrapper">
    <header>
      <h1>Un article</h1>
      <div class="authors">
        <ul>
          <li><a href="/membres/voir/alice/"><span>Alice</span></a></li>
          <li><a href="/membres/voir/bob/"><span> Bob </span></a></li>
        </ul>
        <ul>
          <li><a href="/bibliotheque/?category=info">Informatique</a></li>
          <li><a href="/bibliotheque/?category=sci">Sciences</a></li>
        </ul>
      </div>
      <span class="pubdate">Publié le <time datetime="2021-03-04T09:05:00">4 mars</time></span>
    </header>
  </article>
  <ul class="taglist"><li>rust</li><li> grav </li></ul>
  <aside class="sidebar">
    <a class="download" href="/articles/telecharger/42/un-article.zip">Télécharger</a>
  </aside>
</body></html>"#;

    #[test]
    fn scrapes_link_and_header_metadata() {
        let base = Url::parse("https://zestedesavoir.com").unwrap();
        let page = scrape_content_page(PAGE, &base).unwrap();
        assert_eq!(
            page,
            ContentPage {
                download_link: "https://zestedesavoir.com/articles/telecharger/42/un-article.zip"
                    .to_string(),
                tags: vec!["rust".to_string(), "grav".to_string()],
                authors: vec!["Alice".to_string(), "Bob".to_string()],
                categories: vec!["Informatique".to_string(), "Sciences".to_string()],
                published: Some("2021-03-04T09:05:00".to_string()),
            }
        );
    }

    #[test]
    fn page_without_download_link_is_rejected() {
        let base = Url::parse("https://zestedesavoir.com").unwrap();
        let err = scrape_content_page("<html><body><p>nothing</p></body></html>", &base)
            .unwrap_err();
        assert_eq!(err, ScrapeError::MissingDownloadLink);
    }

    #[test]
    fn metadata_is_optional() {
        let html = r#"<aside class="sidebar"><a class="download" href="https://cdn.example/a.zip">zip</a></aside>"#;
        let base = Url::parse("https://zestedesavoir.com").unwrap();
        let page = scrape_content_page(html, &base).unwrap();
        assert_eq!(page.download_link, "https://cdn.example/a.zip");
        assert!(page.tags.is_empty() && page.authors.is_empty());
        assert_eq!(page.published, None);
    }
}
