// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Streams over paginated list RPCs.
//!
//! Many services return large collections through "list" RPCs that accept a
//! page token and return one page of results plus the token for the next page.
//! An empty token marks the last page. This crate turns one such RPC into a
//! lazily fetched sequence of pages, or of individual items, hiding the token
//! bookkeeping from the application.
//!
//! Two variants are provided:
//! - [pager::Pager] calls a blocking function when it needs the next page.
//! - [paginator::Paginator] awaits a future when it needs the next page, and
//!   exposes the results as a [futures::Stream].
//!
//! Both variants share the same page-advance algorithm, so they produce the
//! same pages, in the same order, and stop at the same point.
//!
//! # Example
//! ```
//! use rpc_pager::page::{PageableRequest, PageableResponse};
//! use rpc_pager::pager::Pager;
//!
//! #[derive(Clone, Default)]
//! struct ListBooksRequest {
//!     shelf: String,
//!     page_token: String,
//! }
//!
//! struct ListBooksResponse {
//!     books: Vec<String>,
//!     next_page_token: String,
//! }
//!
//! impl PageableRequest for ListBooksRequest {
//!     fn page_token(&self) -> &str {
//!         &self.page_token
//!     }
//!     fn with_page_token(mut self, token: String) -> Self {
//!         self.page_token = token;
//!         self
//!     }
//! }
//!
//! impl PageableResponse for ListBooksResponse {
//!     type PageItem = String;
//!     type Metadata = ();
//!     fn next_page_token(&self) -> String {
//!         self.next_page_token.clone()
//!     }
//!     fn metadata(&self) -> Self::Metadata {}
//!     fn into_items(self) -> Vec<String> {
//!         self.books
//!     }
//! }
//!
//! fn list_books(req: ListBooksRequest) -> Result<ListBooksResponse, String> {
//!     // ... a remote call in a real application ...
//!     # match req.page_token.as_str() {
//!     #     "" => Ok(ListBooksResponse { books: vec!["a".into(), "b".into()], next_page_token: "p2".into() }),
//!     #     _ => Ok(ListBooksResponse { books: vec!["c".into()], next_page_token: String::new() }),
//!     # }
//! }
//!
//! # fn main() -> anyhow::Result<()> {
//! let request = ListBooksRequest { shelf: "fiction".into(), ..Default::default() };
//! let mut pager = Pager::start(list_books, request).map_err(anyhow::Error::msg)?;
//! let mut books = Vec::new();
//! for book in pager.items()? {
//!     books.push(book.map_err(anyhow::Error::msg)?);
//! }
//! assert_eq!(books, ["a", "b", "c"]);
//! # Ok(()) }
//! ```

/// An alias of [std::result::Result] where the error is always [crate::error::Error].
///
/// This is the result type used by operations that can fail locally, such as
/// trying to iterate a pager a second time. Errors returned by the list RPC
/// itself are never converted to this type.
pub type Result<T> = std::result::Result<T, crate::error::Error>;

/// The error type for local misuse of pagers and paginators.
pub mod error;

/// Configuration for pagers and paginators.
pub mod options;

/// Traits describing the request and response messages of a list RPC.
pub mod page;

/// The page-advance algorithm shared by the blocking and async variants.
mod cursor;

/// Iterate a list RPC using blocking calls.
pub mod pager;

/// Iterate a list RPC as a [futures::Stream].
pub mod paginator;

pub use page::{PageableRequest, PageableResponse};
