//! Book catalog service

use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookQuery, BookResponse, BookSummary, CreateBook, UpdateBook},
        isbn::Isbn,
        loan::LoanSummary,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct BooksService {
    repository: Repository,
}

impl BooksService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Catalog a new book
    pub async fn create_book(&self, request: CreateBook) -> AppResult<BookResponse> {
        let isbn = Isbn::parse(&request.isbn)?;
        if self.repository.books.isbn_taken(&isbn, None).await? {
            return Err(AppError::Conflict(format!(
                "A book with ISBN {} already exists",
                isbn
            )));
        }
        let book = Book::new(
            &request.title,
            &request.author,
            isbn,
            request.publication_date,
            &request.publisher,
            request.pages,
            &request.genre,
            request.description,
        )?;
        self.repository.books.insert(&book).await?;
        tracing::info!("Cataloged book {} ({})", book.id, book.isbn);
        Ok(BookResponse::from(&book))
    }

    /// Get a book by ID
    pub async fn get_book(&self, id: Uuid) -> AppResult<BookResponse> {
        let book = self.require_book(id).await?;
        Ok(BookResponse::from(&book))
    }

    /// List books with filters and pagination
    pub async fn list_books(&self, query: &BookQuery) -> AppResult<(Vec<BookSummary>, u64)> {
        let (books, total) = self.repository.books.search(query).await?;
        Ok((books.iter().map(BookSummary::from).collect(), total))
    }

    /// Update a book's descriptive fields
    pub async fn update_book(&self, id: Uuid, request: UpdateBook) -> AppResult<BookResponse> {
        let mut book = self.require_book(id).await?;
        if let Some(title) = request.title.as_deref() {
            book.change_title(title)?;
        }
        if let Some(author) = request.author.as_deref() {
            book.change_author(author)?;
        }
        if let Some(genre) = request.genre.as_deref() {
            book.change_genre(genre)?;
        }
        if let Some(description) = request.description {
            book.change_description(Some(description));
        }
        self.repository.books.update(&book).await?;
        Ok(BookResponse::from(&book))
    }

    /// Put a book back into circulation
    pub async fn mark_available(&self, id: Uuid) -> AppResult<BookResponse> {
        let mut book = self.require_book(id).await?;
        book.mark_available();
        self.repository.books.update(&book).await?;
        tracing::info!("Book {} marked available", id);
        Ok(BookResponse::from(&book))
    }

    /// Withdraw a book from circulation, refused while it is on loan
    pub async fn mark_unavailable(&self, id: Uuid) -> AppResult<BookResponse> {
        let mut book = self.require_book(id).await?;
        book.mark_unavailable()?;
        self.repository.books.update(&book).await?;
        tracing::info!("Book {} marked unavailable", id);
        Ok(BookResponse::from(&book))
    }

    /// Lending history of a book, newest first
    pub async fn get_book_loans(&self, id: Uuid) -> AppResult<Vec<LoanSummary>> {
        self.require_book(id).await?;
        let loans = self.repository.loans.list_for_book(id).await?;
        Ok(loans.iter().map(LoanSummary::from).collect())
    }

    async fn require_book(&self, id: Uuid) -> AppResult<Book> {
        self.repository
            .books
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", id)))
    }
}
