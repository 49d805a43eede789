//! Development fixtures: one user per role and a small catalog.

use biblio_lifecycle::LibraryManager;
use biblio_types::{Actor, BookInput, LifecycleError, Role, User};

pub const DEV_ADMIN: &str = "dev-admin";
pub const DEV_LIBRARIAN: &str = "dev-librarian";
pub const DEV_MEMBER: &str = "dev-member";

const SAMPLE_BOOKS: &[(&str, &str, &str, &[&str])] = &[
    ("The Great Gatsby", "F. Scott Fitzgerald", "Fiction", &["classic", "jazz-age"]),
    ("To Kill a Mockingbird", "Harper Lee", "Fiction", &["classic", "justice"]),
    ("1984", "George Orwell", "Science Fiction", &["dystopia", "surveillance"]),
    ("Dune", "Frank Herbert", "Science Fiction", &["desert", "politics"]),
    ("Sapiens", "Yuval Noah Harari", "History", &["anthropology", "civilization"]),
];

/// Idempotent: existing users are kept, and books are only added to an empty catalog.
pub async fn seed_dev_data(library: &LibraryManager) -> Result<(), LifecycleError> {
    let store = library.store();
    for (id, name, role) in [
        (DEV_ADMIN, "Dev Admin", Role::Admin),
        (DEV_LIBRARIAN, "Dev Librarian", Role::Librarian),
        (DEV_MEMBER, "Dev Member", Role::Member),
    ] {
        if store.get_user(id).await?.is_some() {
            continue;
        }
        store
            .insert_user(User {
                id: id.to_string(),
                name: Some(name.to_string()),
                email: format!("{id}@biblio.local"),
                role,
                created_at: library.now(),
                version: 0,
            })
            .await?;
    }

    if store.count_books(None).await? > 0 {
        return Ok(());
    }
    let admin = Actor::new(DEV_ADMIN, Role::Admin);
    for (title, author, genre, tags) in SAMPLE_BOOKS {
        let input = BookInput {
            title: title.to_string(),
            author: author.to_string(),
            genre: Some(genre.to_string()),
            tags: Some(tags.iter().map(|t| t.to_string()).collect()),
            ..Default::default()
        };
        library.create_book(input, &admin).await?;
    }
    tracing::info!(books = SAMPLE_BOOKS.len(), "seeded dev catalog");
    Ok(())
}
