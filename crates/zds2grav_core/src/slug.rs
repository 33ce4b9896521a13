//! Deterministic slug normalization.
//!
//! Slugs become directory names and link anchors, so they must be stable
//! across runs: lower-case ASCII, words separated by single dashes.

/// Normalize arbitrary text into a slug.
///
/// Latin letters with diacritics are transliterated (`é` → `e`, `œ` → `oe`),
/// every run of other characters collapses into one `-`, and leading or
/// trailing dashes are dropped. Returns an empty string when nothing
/// alphanumeric survives.
pub fn normalize_slug(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;
    for c in input.chars() {
        let mut buf = [0u8; 4];
        let mapped: &str = if c.is_ascii_alphanumeric() {
            c.encode_utf8(&mut buf)
        } else {
            transliterate(c).unwrap_or("")
        };
        if mapped.is_empty() {
            pending_dash = true;
            continue;
        }
        if pending_dash && !slug.is_empty() {
            slug.push('-');
        }
        pending_dash = false;
        slug.extend(mapped.chars().map(|c| c.to_ascii_lowercase()));
    }
    slug
}

fn transliterate(c: char) -> Option<&'static str> {
    let ascii = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => "a",
        'æ' | 'Æ' => "ae",
        'ç' | 'Ç' => "c",
        'è' | 'é' | 'ê' | 'ë' | 'È' | 'É' | 'Ê' | 'Ë' => "e",
        'ì' | 'í' | 'î' | 'ï' | 'Ì' | 'Í' | 'Î' | 'Ï' => "i",
        'ñ' | 'Ñ' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' => "o",
        'œ' | 'Œ' => "oe",
        'ù' | 'ú' | 'û' | 'ü' | 'Ù' | 'Ú' | 'Û' | 'Ü' => "u",
        'ý' | 'ÿ' | 'Ý' | 'Ÿ' => "y",
        'ß' => "ss",
        _ => return None,
    };
    Some(ascii)
}

#[cfg(test)]
mod tests {
    use super::normalize_slug;

    #[test]
    fn lowercases_and_dashes_words() {
        assert_eq!(normalize_slug("Hello World"), "hello-world");
    }

    #[test]
    fn transliterates_french_text() {
        assert_eq!(normalize_slug("Les cœurs de l'été"), "les-coeurs-de-l-ete");
        assert_eq!(normalize_slug("Ça marche à 100 %"), "ca-marche-a-100");
    }

    #[test]
    fn collapses_separators_and_trims() {
        assert_eq!(normalize_slug("  --Hello__World--  "), "hello-world");
        assert_eq!(normalize_slug("a...b"), "a-b");
    }

    #[test]
    fn keeps_existing_slugs_unchanged() {
        assert_eq!(normalize_slug("mon-super-article"), "mon-super-article");
    }

    #[test]
    fn empty_when_nothing_survives() {
        assert_eq!(normalize_slug(""), "");
        assert_eq!(normalize_slug("!!! ???"), "");
        assert_eq!(normalize_slug("日本語"), "");
    }
}
