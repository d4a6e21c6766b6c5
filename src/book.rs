//! Book entity and book collection.
//!
//! Input shape:
//!
//! ```json
//! { "books": [ { "title": "The Hobbit", "authors": "J.R.R. Tolkien", "pages": "310" } ] }
//! ```

use serde::Serialize;
use serde_json::Value;
use std::sync::OnceLock;

use crate::collection::{parse_entity_array, Collection, EntityCollection};
use crate::entity::{Entity, EntityData, Metadata, Overflow};
use crate::error::{DetectionError, StructuralError};
use crate::normalize::{
    normalize_date, normalize_non_negative_float, normalize_positive_int, normalize_string,
    normalize_string_list, FieldDiagnostic, PublicationDate,
};
use crate::pipeline::{FieldPipeline, StagedRecord};

/// Display name used when a record has neither a usable title nor name.
pub const UNTITLED_BOOK: &str = "Untitled Book";

/// Key holding the array of book records.
pub const BOOKS_KEY: &str = "books";

/// A single normalized book.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Book {
    pub name: String,

    pub title: Option<String>,
    pub authors: Vec<String>,
    pub isbn: Option<String>,
    pub publication_date: Option<PublicationDate>,
    pub pages: Option<u32>,
    pub price: Option<f64>,
    pub description: Option<String>,
    pub cover_image_url: Option<String>,
    pub purchase_url: Option<String>,

    // Navigation fields, kept out of the metadata view
    pub publisher: Option<String>,
    pub genre: Option<String>,
    pub language: Option<String>,
    pub format: Option<String>,

    pub overflow: Overflow,

    #[serde(skip)]
    pub diagnostics: Vec<FieldDiagnostic>,
}

/// Stage 1 title/name reconciliation.
///
/// A usable title becomes the display name. Otherwise an unusable or missing
/// name falls back to [`UNTITLED_BOOK`].
fn reconcile_title(staged: &mut StagedRecord) {
    let title = staged.core_value("title");
    if normalize_string(title).is_some() {
        let title = title.clone();
        staged.core.insert("name".to_string(), title);
    } else if normalize_string(staged.core_value("name")).is_none() {
        staged
            .core
            .insert("name".to_string(), Value::String(UNTITLED_BOOK.to_string()));
    }
}

fn book_pipeline() -> &'static FieldPipeline<Book> {
    static PIPELINE: OnceLock<FieldPipeline<Book>> = OnceLock::new();
    PIPELINE.get_or_init(|| {
        FieldPipeline::<Book>::new(Book::NAME)
            .reconcile_with(reconcile_title)
            .step("name", |b, v, _| {
                b.name = normalize_string(v).unwrap_or_else(|| UNTITLED_BOOK.to_string())
            })
            .step("title", |b, v, _| b.title = normalize_string(v))
            .step("authors", |b, v, _| b.authors = normalize_string_list(v))
            .step("isbn", |b, v, _| b.isbn = normalize_string(v))
            .step("publication_date", |b, v, d| {
                b.publication_date = normalize_date("publication_date", v, d)
            })
            .step("pages", |b, v, d| b.pages = normalize_positive_int("pages", v, d))
            .step("price", |b, v, d| b.price = normalize_non_negative_float("price", v, d))
            .step("description", |b, v, _| b.description = normalize_string(v))
            .step("cover_image_url", |b, v, _| b.cover_image_url = normalize_string(v))
            .step("purchase_url", |b, v, _| b.purchase_url = normalize_string(v))
            .step("publisher", |b, v, _| b.publisher = normalize_string(v))
            .step("genre", |b, v, _| b.genre = normalize_string(v))
            .step("language", |b, v, _| b.language = normalize_string(v))
            .step("format", |b, v, _| b.format = normalize_string(v))
    })
}

impl Entity for Book {
    const NAME: &'static str = "Book";

    fn core_fields() -> Vec<&'static str> {
        book_pipeline().field_names()
    }

    fn from_raw(raw: Value) -> Result<Self, StructuralError> {
        let built = book_pipeline().construct(raw)?;

        let mut book = built.fields;
        book.overflow = built.overflow;
        book.diagnostics = built.diagnostics;
        Ok(book)
    }
}

impl EntityData for Book {
    fn entity_type(&self) -> &'static str {
        Self::NAME
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn get_all_metadata(&self) -> Metadata {
        let mut metadata = Metadata::new();

        let mut put = |key: &str, value: Option<Value>| {
            if let Some(v) = value {
                metadata.insert(key.to_string(), v);
            }
        };

        put("title", self.title.clone().map(Value::String));
        if !self.authors.is_empty() {
            put("authors", Some(Value::from(self.authors.clone())));
        }
        put("isbn", self.isbn.clone().map(Value::String));
        put(
            "publication_date",
            self.publication_date.as_ref().map(|d| Value::String(d.to_string())),
        );
        put("pages", self.pages.map(Value::from));
        put("price", self.price.map(Value::from));
        put("description", self.description.clone().map(Value::String));
        put("cover_image_url", self.cover_image_url.clone().map(Value::String));
        put("purchase_url", self.purchase_url.clone().map(Value::String));

        // Core fields win over overflow keys of the same name
        for (key, value) in &self.overflow {
            metadata.entry(key.clone()).or_insert_with(|| value.clone());
        }

        metadata
    }

    fn overflow(&self) -> &Overflow {
        &self.overflow
    }

    fn diagnostics(&self) -> &[FieldDiagnostic] {
        &self.diagnostics
    }
}

/// Root of a book document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BookCollection {
    pub books: Vec<Book>,
}

impl Collection for BookCollection {
    const NAME: &'static str = "BookCollection";

    type Item = Book;

    fn from_raw(raw: Value) -> Result<Self, StructuralError> {
        let books = parse_entity_array::<Book>(raw, Self::NAME, BOOKS_KEY)?;
        Ok(Self { books })
    }

    fn entities(&self) -> &[Book] {
        &self.books
    }
}

impl EntityCollection for BookCollection {
    fn collection_type(&self) -> &'static str {
        Self::NAME
    }

    fn get_entities(&self) -> Vec<&dyn EntityData> {
        self.books.iter().map(|b| b as &dyn EntityData).collect()
    }

    fn len(&self) -> usize {
        self.books.len()
    }
}

/// Detection predicate: the document has a `books` array.
pub fn detect_book_format(raw: &Value) -> Result<bool, DetectionError> {
    Ok(raw.get(BOOKS_KEY).map_or(false, Value::is_array))
}
