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

/// The error returned when a pager or paginator is misused.
///
/// Errors from the list RPC are returned unchanged, with whatever type the RPC
/// uses. This type only reports problems detected locally, before any RPC is
/// made. Currently the only such problem is iterating the same pager twice.
///
/// # Example
/// ```
/// use rpc_pager::error::Error;
/// fn handle(e: Error) {
///     if e.is_consumed() {
///         println!("create a new pager to restart the iteration: {e}");
///     }
/// }
/// ```
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
}

impl Error {
    /// Creates an error representing a second iteration over a pager.
    pub(crate) fn consumed(pages: usize) -> Self {
        Self {
            kind: ErrorKind::Consumed { pages },
        }
    }

    /// The pager has already returned some pages.
    ///
    /// Pagers track a single forward cursor. Once they return the first page
    /// they cannot restart from the beginning, and they refuse to silently
    /// resume from their current position.
    ///
    /// # Troubleshooting
    ///
    /// Create a new pager, starting with a new list RPC call, to iterate the
    /// collection again. If the application needs to both examine the pages
    /// and their items, use [pages][crate::pager::Pager::pages] and flatten
    /// each page.
    pub fn is_consumed(&self) -> bool {
        matches!(self.kind, ErrorKind::Consumed { .. })
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for Error {}

#[derive(thiserror::Error, Debug)]
enum ErrorKind {
    #[error(
        "the pager already returned {pages} page(s) and cannot be iterated again, create a new pager to restart"
    )]
    Consumed { pages: usize },
}
