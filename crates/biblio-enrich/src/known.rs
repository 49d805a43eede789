//! Offline lookup table of well-known titles.

use crate::{EnrichError, MetadataSource};
use async_trait::async_trait;
use biblio_types::Enrichment;

struct KnownBook {
    key: &'static str,
    synopsis: &'static str,
    tags: &'static [&'static str],
    genre: &'static str,
    difficulty: &'static str,
}

const KNOWN_BOOKS: &[KnownBook] = &[
    KnownBook {
        key: "to kill a mockingbird",
        synopsis: "Scout Finch grows up in a Depression-era Alabama town while her father, the lawyer Atticus Finch, defends a Black man falsely accused of a crime. The novel examines racial injustice, moral courage, and the end of childhood innocence.",
        tags: &["classic", "social-justice", "coming-of-age", "american-south", "legal-drama"],
        genre: "Fiction",
        difficulty: "Moderate",
    },
    KnownBook {
        key: "1984",
        synopsis: "Winston Smith works rewriting history for a totalitarian Party that watches every citizen. His private rebellion against Big Brother becomes a study of surveillance, propaganda, and the destruction of independent thought.",
        tags: &["dystopian", "political", "classic", "surveillance", "totalitarianism"],
        genre: "Science Fiction",
        difficulty: "Moderate",
    },
    KnownBook {
        key: "the great gatsby",
        synopsis: "Nick Carraway narrates the rise and fall of the mysterious millionaire Jay Gatsby and his obsession with Daisy Buchanan. Set in the Jazz Age, it is a tragedy about wealth, longing, and the American Dream.",
        tags: &["classic", "american-dream", "jazz-age", "tragedy", "wealth"],
        genre: "Fiction",
        difficulty: "Moderate",
    },
    KnownBook {
        key: "dune",
        synopsis: "Paul Atreides is drawn into a struggle for the desert planet Arrakis, sole source of the spice melange. Living among the Fremen, he faces betrayal, prophecy, and the politics of an interstellar empire.",
        tags: &["sci-fi", "epic", "ecology", "politics", "space-opera", "prophecy"],
        genre: "Science Fiction",
        difficulty: "Advanced",
    },
    KnownBook {
        key: "the hobbit",
        synopsis: "Bilbo Baggins is pulled out of his quiet life by Gandalf and a company of dwarves who mean to take back their mountain home from the dragon Smaug. On the road he finds unexpected courage and a ring of great consequence.",
        tags: &["fantasy", "adventure", "classic", "quest", "dragons"],
        genre: "Fantasy",
        difficulty: "Easy",
    },
    KnownBook {
        key: "pride and prejudice",
        synopsis: "Elizabeth Bennet navigates marriage, class, and reputation in Regency England. Her sharp first judgement of the proud Mr. Darcy slowly gives way to one of literature's best-loved romances.",
        tags: &["classic", "romance", "social-commentary", "british-literature", "regency"],
        genre: "Fiction",
        difficulty: "Moderate",
    },
    KnownBook {
        key: "atomic habits",
        synopsis: "James Clear lays out a framework for building good habits and breaking bad ones through small, compounding changes. The book draws on behavioral psychology to show how tiny improvements add up over time.",
        tags: &["productivity", "habits", "psychology", "self-improvement", "behavioral-science"],
        genre: "Self-Help",
        difficulty: "Easy",
    },
    KnownBook {
        key: "sapiens",
        synopsis: "Yuval Noah Harari traces human history from the first Homo sapiens to the present day. He follows the cognitive, agricultural, and scientific revolutions that shaped societies, economies, and beliefs.",
        tags: &["history", "anthropology", "evolution", "civilization", "science"],
        genre: "Non-Fiction",
        difficulty: "Moderate",
    },
    KnownBook {
        key: "clean code",
        synopsis: "Robert C. Martin presents principles and practices for writing readable, maintainable software. Worked examples show how to turn messy code into clean, professional code.",
        tags: &["programming", "software-engineering", "best-practices", "refactoring", "craftsmanship"],
        genre: "Technology",
        difficulty: "Advanced",
    },
    KnownBook {
        key: "the pragmatic programmer",
        synopsis: "Thomas and Hunt offer practical advice on the craft of software development, from personal responsibility to flexible architecture. The book covers habits and techniques that keep code adaptable and careers growing.",
        tags: &["programming", "software-engineering", "career", "best-practices", "pragmatic"],
        genre: "Technology",
        difficulty: "Advanced",
    },
];

impl KnownBook {
    fn to_enrichment(&self) -> Enrichment {
        Enrichment {
            synopsis: self.synopsis.to_string(),
            tags: self.tags.iter().map(|t| t.to_string()).collect(),
            genre: self.genre.to_string(),
            difficulty: self.difficulty.to_string(),
        }
    }
}

/// Exact match on the lowercased, trimmed title; then containment in either direction.
#[derive(Debug, Clone, Copy, Default)]
pub struct KnownBooks;

impl KnownBooks {
    pub fn lookup(&self, title: &str) -> Option<Enrichment> {
        let key = title.trim().to_lowercase();
        if key.is_empty() {
            return None;
        }
        KNOWN_BOOKS
            .iter()
            .find(|k| k.key == key)
            .or_else(|| {
                KNOWN_BOOKS
                    .iter()
                    .find(|k| key.contains(k.key) || k.key.contains(key.as_str()))
            })
            .map(KnownBook::to_enrichment)
    }
}

#[async_trait]
impl MetadataSource for KnownBooks {
    async fn enrich(&self, title: &str, _author: &str) -> Result<Option<Enrichment>, EnrichError> {
        Ok(self.lookup(title))
    }
}
