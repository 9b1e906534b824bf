//! Clients for the services the report pipeline treats as black boxes:
//! SQL generation, query execution, schema metadata and PDF storage.

pub mod databases;
pub mod metadata;
pub mod pdf_store;
pub mod query;
pub mod sql_service;

pub use databases::{DatabaseEntry, DatabaseRegistry};
pub use metadata::{mk_create_ddl, ColumnMetadata, FileMetadataStore, MetadataStore};
pub use pdf_store::{DirectoryPdfStore, PdfContent, PdfStore};
pub use query::{Cell, LocalQueryExecutor, QueryExecutor, QueryResult};
pub use sql_service::{HttpSqlGenerator, SqlGenerator};
