use crate::session::base_language;

/// Glossary resource for a language pair, if one is provisioned.
///
/// Exactly two directional glossaries exist, one per supported direction.
/// Any other pair translates without a glossary.
pub fn glossary_for(parent: &str, source_lang: &str, target_lang: &str) -> Option<String> {
    let pair = (base_language(source_lang), base_language(target_lang));
    let name = match pair {
        ("ro", "en") => "ro-en",
        ("en", "ro") => "en-ro",
        _ => return None,
    };
    Some(format!("{}/glossaries/{}", parent, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_directions() {
        let parent = "projects/demo/locations/us-central1";
        assert_eq!(
            glossary_for(parent, "ro-RO", "en").as_deref(),
            Some("projects/demo/locations/us-central1/glossaries/ro-en")
        );
        assert_eq!(
            glossary_for(parent, "en-US", "ro").as_deref(),
            Some("projects/demo/locations/us-central1/glossaries/en-ro")
        );
    }

    #[test]
    fn test_other_pairs_have_no_glossary() {
        let parent = "projects/demo/locations/us-central1";
        assert!(glossary_for(parent, "fr-FR", "en").is_none());
        assert!(glossary_for(parent, "ro-RO", "ro").is_none());
    }
}
