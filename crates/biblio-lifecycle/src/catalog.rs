//! Catalog and user administration. Each mutation commits one change set with one audit entry.

use crate::manager::LibraryManager;
use biblio_types::{
    Actor, AuditAction, AuditEntry, Book, BookDetails, BookInput, BookStatus, ChangeSet,
    CheckoutFilter, EnrichResponseData, Enrichment, LifecycleError, RequestFilter, Role, User,
    Write,
};

fn required_title_and_author(input: BookInput) -> Result<BookInput, LifecycleError> {
    let input = input.normalized();
    if input.title.is_empty() || input.author.is_empty() {
        return Err(LifecycleError::InvalidInput(
            "title and author are required".to_string(),
        ));
    }
    Ok(input)
}

/// Latest checkouts shown with a book.
const BOOK_HISTORY_LIMIT: usize = 10;

/// Overwrites descriptive fields with the non-empty parts of an enrichment.
fn merge_enrichment(book: &mut Book, enrichment: &Enrichment) {
    if !enrichment.synopsis.is_empty() {
        book.description = Some(enrichment.synopsis.clone());
    }
    if !enrichment.tags.is_empty() {
        book.tags = enrichment.tags.clone();
    }
    if !enrichment.genre.is_empty() {
        book.genre = Some(enrichment.genre.clone());
    }
    if !enrichment.difficulty.is_empty() {
        book.difficulty = Some(enrichment.difficulty.clone());
    }
}

impl LibraryManager {
    pub async fn create_book(&self, input: BookInput, actor: &Actor) -> Result<Book, LifecycleError> {
        let input = required_title_and_author(input)?;
        let now = self.now();
        let book = Book {
            id: uuid::Uuid::new_v4().to_string(),
            title: input.title,
            author: input.author,
            genre: input.genre,
            tags: input.tags.unwrap_or_default(),
            description: input.description,
            isbn: input.isbn,
            cover_url: input.cover_url,
            difficulty: input.difficulty,
            status: BookStatus::Available,
            created_at: now,
            updated_at: now,
            version: 0,
        };
        let audit = AuditEntry::new(
            actor.id.clone(),
            Some(book.id.clone()),
            AuditAction::BookCreated,
            format!("Created book: {} by {}", book.title, book.author),
            now,
        );
        self.commit(ChangeSet::new(audit).with(Write::InsertBook(book.clone())))
            .await?;
        tracing::info!(book_id = %book.id, actor_id = %actor.id, "book created");
        Ok(book)
    }

    /// Replaces the descriptive fields. Title and author are required; absent or blank
    /// optional fields are cleared. Status and timestamps other than `updated_at` are kept.
    pub async fn update_book(
        &self,
        id: &str,
        input: BookInput,
        actor: &Actor,
    ) -> Result<Book, LifecycleError> {
        let input = required_title_and_author(input)?;
        let current = self.load_book(id).await?;
        let now = self.now();
        let mut book = Book {
            title: input.title,
            author: input.author,
            genre: input.genre,
            tags: input.tags.unwrap_or_default(),
            description: input.description,
            isbn: input.isbn,
            cover_url: input.cover_url,
            difficulty: input.difficulty,
            updated_at: now,
            ..current
        };

        let audit = AuditEntry::new(
            actor.id.clone(),
            Some(book.id.clone()),
            AuditAction::BookUpdated,
            format!("Updated book: {} by {}", book.title, book.author),
            now,
        );
        self.commit(ChangeSet::new(audit).with(Write::UpdateBook(book.clone())))
            .await?;
        book.version += 1;
        Ok(book)
    }

    /// Removes an idle book with its loan history. Audit entries are kept.
    pub async fn delete_book(&self, id: &str, actor: &Actor) -> Result<(), LifecycleError> {
        let book = self.load_book(id).await?;
        if book.status != BookStatus::Available {
            return Err(LifecycleError::InvalidState(format!(
                "book {} is {} and cannot be deleted",
                book.id, book.status
            )));
        }
        let pending = self
            .store
            .list_requests(&RequestFilter::pending_for_book(&book.id))
            .await?;
        if !pending.is_empty() {
            return Err(LifecycleError::InvalidState(format!(
                "book {} has {} pending request(s)",
                book.id,
                pending.len()
            )));
        }
        let audit = AuditEntry::new(
            actor.id.clone(),
            Some(book.id.clone()),
            AuditAction::BookDeleted,
            format!("Deleted book: {} by {}", book.title, book.author),
            self.now(),
        );
        let delete = Write::DeleteBook {
            id: book.id.clone(),
            version: book.version,
        };
        self.commit(ChangeSet::new(audit).with(delete)).await?;
        tracing::info!(book_id = %book.id, actor_id = %actor.id, "book deleted");
        Ok(())
    }

    /// Fills descriptive metadata from the enrichment layers. Status is never touched.
    ///
    /// No lock is held while the layers run; the write is checked against the version read
    /// beforehand and fails with `Conflict` if the book changed in the meantime.
    pub async fn enrich_book(
        &self,
        id: &str,
        actor: &Actor,
    ) -> Result<EnrichResponseData, LifecycleError> {
        let current = self.load_book(id).await?;
        let (enrichment, source) = self
            .enricher
            .enrich(&current.title, &current.author, current.genre.as_deref())
            .await;

        let now = self.now();
        let mut book = current;
        merge_enrichment(&mut book, &enrichment);
        book.updated_at = now;
        let audit = AuditEntry::new(
            actor.id.clone(),
            Some(book.id.clone()),
            AuditAction::AiEnriched,
            format!("Enriched via {}: {}", source.as_str(), book.title),
            now,
        );
        self.commit(ChangeSet::new(audit).with(Write::UpdateBook(book.clone())))
            .await?;
        book.version += 1;
        tracing::info!(book_id = %book.id, source = source.as_str(), "book enriched");
        Ok(EnrichResponseData {
            book,
            enrichment,
            source,
        })
    }

    /// Admins change other users' roles; changing one's own is rejected.
    pub async fn change_role(
        &self,
        user_id: &str,
        role: Role,
        actor: &Actor,
    ) -> Result<User, LifecycleError> {
        if user_id == actor.id {
            return Err(LifecycleError::InvalidInput(
                "cannot change your own role".to_string(),
            ));
        }
        let current = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(format!("user {user_id}")))?;
        let audit = AuditEntry::new(
            actor.id.clone(),
            None,
            AuditAction::RoleChanged,
            format!(
                "Changed role of {} from {} to {}",
                current.email, current.role, role
            ),
            self.now(),
        );
        let mut user = User {
            role,
            ..current
        };
        self.commit(ChangeSet::new(audit).with(Write::UpdateUser(user.clone())))
            .await?;
        user.version += 1;
        tracing::info!(user_id = %user.id, role = %role, actor_id = %actor.id, "role changed");
        Ok(user)
    }

    /// A book, plus its recent checkouts and pending requests when a caller is identified.
    pub async fn book_details(
        &self,
        id: &str,
        viewer: Option<&Actor>,
    ) -> Result<BookDetails, LifecycleError> {
        let book = self.load_book(id).await?;
        if viewer.is_none() {
            return Ok(BookDetails {
                book,
                checkouts: None,
                borrow_requests: None,
            });
        }
        let history = CheckoutFilter {
            book_id: Some(book.id.clone()),
            ..Default::default()
        };
        let mut checkouts = self.store.list_checkouts(&history).await?;
        checkouts.truncate(BOOK_HISTORY_LIMIT);
        let pending = self
            .store
            .list_requests(&RequestFilter::pending_for_book(&book.id))
            .await?;
        Ok(BookDetails {
            book,
            checkouts: Some(self.checkout_views(checkouts).await?),
            borrow_requests: Some(self.request_views(pending).await?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use biblio_enrich::{LayeredEnricher, LlmMetadataSource, MockLLMClient};
    use biblio_store::InMemoryLibraryStore;
    use biblio_types::{AuditListOptions, BookQuery, EnrichmentSource, ResolveAction};
    use std::sync::Arc;

    fn staff() -> Actor {
        Actor::new("librarian", Role::Librarian)
    }

    fn manager() -> LibraryManager {
        LibraryManager::new(Arc::new(InMemoryLibraryStore::new()))
    }

    fn input(title: &str, author: &str) -> BookInput {
        BookInput {
            title: title.to_string(),
            author: author.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_requires_title_and_author() {
        let m = manager();
        let err = m.create_book(input("  ", "Someone"), &staff()).await.unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidInput(_)));

        let book = m
            .create_book(input(" Dune ", "Frank Herbert"), &staff())
            .await
            .unwrap();
        assert_eq!(book.title, "Dune");
        assert_eq!(book.status, BookStatus::Available);
        let page = m.store().list_books(&BookQuery::default()).await.unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn update_replaces_fields_and_keeps_status() {
        let m = manager();
        let mut first = input("Dune", "Frank Herbert");
        first.isbn = Some("978-0441172719".to_string());
        first.genre = Some("Sci-Fi".to_string());
        first.tags = Some(vec!["desert".to_string()]);
        let book = m.create_book(first, &staff()).await.unwrap();
        m.submit_request(&book.id, &Actor::new("u1", Role::Member))
            .await
            .unwrap();

        let err = m
            .update_book(&book.id, BookInput::default(), &staff())
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidInput(_)));

        let mut change = input("Dune Messiah", "Frank Herbert");
        change.isbn = Some("978-0593098233".to_string());
        change.genre = Some("  ".to_string());
        let updated = m.update_book(&book.id, change, &staff()).await.unwrap();
        assert_eq!(updated.title, "Dune Messiah");
        assert_eq!(updated.isbn.as_deref(), Some("978-0593098233"));
        assert_eq!(updated.genre, None);
        assert!(updated.tags.is_empty());
        assert_eq!(updated.status, BookStatus::Requested);
        assert_eq!(updated.created_at, book.created_at);

        let stored = m.store().get_book(&book.id).await.unwrap().unwrap();
        assert_eq!(stored, updated);
        let trail = m.list_audit(Some(1)).await.unwrap();
        assert_eq!(trail[0].detail, "Updated book: Dune Messiah by Frank Herbert");
    }

    #[tokio::test]
    async fn delete_only_idle_books_and_keep_audit() {
        let m = manager();
        let book = m.create_book(input("Dune", "Frank Herbert"), &staff()).await.unwrap();
        let req = m
            .submit_request(&book.id, &Actor::new("u1", Role::Member))
            .await
            .unwrap();
        let err = m.delete_book(&book.id, &staff()).await.unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidState(_)));

        m.resolve_request(&req.id, ResolveAction::Deny, None, &staff())
            .await
            .unwrap();
        m.delete_book(&book.id, &staff()).await.unwrap();
        assert!(m.store().get_book(&book.id).await.unwrap().is_none());
        assert!(m.store().get_request(&req.id).await.unwrap().is_none());

        let trail = m
            .store()
            .list_audit(&AuditListOptions {
                book_id: Some(book.id.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(trail.len(), 4);
        assert_eq!(trail[0].action, AuditAction::BookDeleted);
        assert_eq!(trail[0].detail, "Deleted book: Dune by Frank Herbert");
        assert_eq!(trail[3].detail, "Created book: Dune by Frank Herbert");
    }

    #[tokio::test]
    async fn enrich_overwrites_descriptions_only() {
        let llm = MockLLMClient::replying(
            r#"{"synopsis":"Spice and sand.","tags":["desert","politics"],"genre":"Science Fiction","difficulty":""}"#,
        );
        let m = manager().with_enricher(
            LayeredEnricher::new().with_layer(EnrichmentSource::Llm, LlmMetadataSource::new(llm)),
        );
        let mut first = input("Dune", "Frank Herbert");
        first.difficulty = Some("Advanced".to_string());
        let book = m.create_book(first, &staff()).await.unwrap();

        let enriched = m.enrich_book(&book.id, &staff()).await.unwrap();
        assert_eq!(enriched.source, EnrichmentSource::Llm);
        assert_eq!(enriched.book.description.as_deref(), Some("Spice and sand."));
        assert_eq!(enriched.book.tags, vec!["desert", "politics"]);
        assert_eq!(enriched.book.difficulty.as_deref(), Some("Advanced"));
        assert_eq!(enriched.book.status, BookStatus::Available);

        let trail = m.list_audit(None).await.unwrap();
        assert_eq!(trail[0].action, AuditAction::AiEnriched);
        assert!(trail[0].detail.starts_with("Enriched via llm"));
    }

    #[tokio::test]
    async fn heuristic_enrichment_without_layers() {
        let m = manager();
        let book = m.create_book(input("Unlisted Title", "Anon"), &staff()).await.unwrap();
        let enriched = m.enrich_book(&book.id, &staff()).await.unwrap();
        assert_eq!(enriched.source, EnrichmentSource::Heuristic);
        assert_eq!(enriched.book.genre.as_deref(), Some("Fiction"));
        assert_eq!(enriched.book.tags, vec!["unlisted", "title"]);
    }

    #[tokio::test]
    async fn role_changes_are_audited_without_book() {
        let m = manager();
        let admin = Actor::new("admin", Role::Admin);
        let member = User {
            id: "u1".to_string(),
            name: None,
            email: "u1@example.org".to_string(),
            role: Role::Member,
            created_at: m.now(),
            version: 0,
        };
        m.store().insert_user(member).await.unwrap();

        let err = m.change_role("admin", Role::Member, &admin).await.unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidInput(_)));
        let err = m.change_role("ghost", Role::Admin, &admin).await.unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound(_)));

        let promoted = m.change_role("u1", Role::Librarian, &admin).await.unwrap();
        assert_eq!(promoted.role, Role::Librarian);
        let trail = m.list_audit(None).await.unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].action, AuditAction::RoleChanged);
        assert_eq!(trail[0].book_id, None);
        assert_eq!(trail[0].detail, "Changed role of u1@example.org from MEMBER to LIBRARIAN");
    }

    #[tokio::test]
    async fn details_include_history_for_identified_viewers() {
        let m = manager();
        let book = m.create_book(input("Dune", "Frank Herbert"), &staff()).await.unwrap();
        let req = m
            .submit_request(&book.id, &Actor::new("u1", Role::Member))
            .await
            .unwrap();

        let public = m.book_details(&book.id, None).await.unwrap();
        assert!(public.checkouts.is_none() && public.borrow_requests.is_none());

        let viewer = Actor::new("u2", Role::Member);
        let details = m.book_details(&book.id, Some(&viewer)).await.unwrap();
        assert_eq!(details.borrow_requests.unwrap()[0].request.id, req.id);
        assert!(details.checkouts.unwrap().is_empty());
    }
}
