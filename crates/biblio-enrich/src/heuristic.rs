use biblio_types::Enrichment;

/// Last-resort metadata derived from the title and author alone.
pub fn heuristic_enrichment(title: &str, author: &str, genre: Option<&str>) -> Enrichment {
    let tags = title
        .to_lowercase()
        .split_whitespace()
        .filter(|w| w.chars().count() > 3)
        .take(4)
        .map(str::to_string)
        .collect();
    Enrichment {
        synopsis: format!(
            "\"{title}\" is a work by {author}. This book explores its subject matter with depth and insight, offering readers a compelling reading experience."
        ),
        tags,
        genre: genre
            .filter(|g| !g.trim().is_empty())
            .unwrap_or("Fiction")
            .to_string(),
        difficulty: "Moderate".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_long_title_words() {
        let e = heuristic_enrichment("The Left Hand of Darkness and More Words", "Le Guin", None);
        assert_eq!(e.tags, vec!["left", "hand", "darkness", "more"]);
        assert_eq!(e.genre, "Fiction");
        assert_eq!(e.difficulty, "Moderate");
        assert!(e.synopsis.starts_with("\"The Left Hand"));

        let kept = heuristic_enrichment("It", "Stephen King", Some("Romance"));
        assert_eq!(kept.genre, "Romance");
        assert_eq!(kept.tags, Vec::<String>::new());
    }
}
