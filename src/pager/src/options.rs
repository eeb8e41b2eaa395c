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

pub(crate) const LOGGING_VAR: &str = "RPC_PAGER_LOGGING";

/// Configure a pager or paginator.
///
/// The defaults work for most applications: iterate until the service returns
/// an empty page token, without any tracing spans.
///
/// # Example
/// ```
/// # use rpc_pager::options::PagerOptions;
/// let options = PagerOptions::new().set_max_pages(10).enable_tracing();
/// assert_eq!(options.max_pages(), Some(10));
/// assert!(options.tracing_enabled());
/// ```
#[derive(Clone, Debug, Default)]
pub struct PagerOptions {
    max_pages: Option<usize>,
    tracing: bool,
}

impl PagerOptions {
    /// Returns a default [PagerOptions].
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops the iteration after this many pages, including the first page.
    ///
    /// The first page is always returned, because it was fetched before the
    /// pager was created. A limit of zero is treated as one.
    pub fn set_max_pages(mut self, v: usize) -> Self {
        self.max_pages = Some(v);
        self
    }

    /// Removes any limit on the number of pages.
    pub fn clear_max_pages(mut self) -> Self {
        self.max_pages = None;
        self
    }

    /// Gets the current page limit, if any.
    pub fn max_pages(&self) -> Option<usize> {
        self.max_pages
    }

    /// Enables tracing.
    ///
    /// With tracing enabled each page fetch runs inside a `page_fetch` span.
    pub fn enable_tracing(mut self) -> Self {
        self.tracing = true;
        self
    }

    /// Disables tracing.
    pub fn disable_tracing(mut self) -> Self {
        self.tracing = false;
        self
    }

    /// Returns true if tracing is enabled, via these options or the
    /// environment.
    pub fn tracing_enabled(&self) -> bool {
        if self.tracing {
            return true;
        }
        std::env::var(LOGGING_VAR)
            .map(|v| v == "true")
            .unwrap_or(false)
    }

    pub(crate) fn page_limit(&self) -> Option<usize> {
        self.max_pages.map(|v| v.max(1))
    }
}
