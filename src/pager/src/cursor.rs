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

use crate::options::PagerOptions;
use crate::page::{PageableRequest, PageableResponse};

/// The next action for a pager.
#[derive(Debug)]
pub(crate) enum Step<Req, Resp> {
    /// Return the page captured when the pager was created.
    Yield(Resp),
    /// Send this request and pass the result to [PageCursor::complete].
    Fetch(Req),
    /// The iteration is over.
    Done,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum State {
    Initial,
    Ready,
    Done,
}

/// Tracks the position of a pager over a list RPC.
///
/// The cursor performs no I/O. The blocking and async pagers ask it for the
/// next [Step], execute any [Step::Fetch] with their own invocation mechanism,
/// and report the outcome back via [complete][PageCursor::complete]. That
/// keeps the ordering and termination rules in one place.
pub(crate) struct PageCursor<Req, Resp>
where
    Resp: PageableResponse,
{
    request: Req,
    initial: Option<Resp>,
    next_token: String,
    metadata: Resp::Metadata,
    pages: usize,
    truncated: bool,
    state: State,
    options: PagerOptions,
}

impl<Req, Resp> PageCursor<Req, Resp>
where
    Req: PageableRequest,
    Resp: PageableResponse,
{
    pub fn new(request: Req, response: Resp, options: PagerOptions) -> Self {
        Self {
            request,
            next_token: response.next_page_token(),
            metadata: response.metadata(),
            initial: Some(response),
            pages: 0,
            truncated: false,
            state: State::Initial,
            options,
        }
    }

    pub fn step(&mut self) -> Step<Req, Resp> {
        match self.state {
            State::Initial => {
                self.state = State::Ready;
                self.pages = 1;
                match self.initial.take() {
                    Some(response) => Step::Yield(response),
                    None => self.finish(),
                }
            }
            State::Ready => {
                if self.next_token.is_empty() {
                    return self.finish();
                }
                if self.options.page_limit().is_some_and(|max| self.pages >= max) {
                    tracing::debug!(
                        pages = self.pages,
                        "stopping at the page limit with more pages available"
                    );
                    self.truncated = true;
                    return self.finish();
                }
                let token = std::mem::take(&mut self.next_token);
                let request = self.request.clone().with_page_token(token);
                self.request = request.clone();
                tracing::debug!(page = self.pages + 1, "fetching next page");
                Step::Fetch(request)
            }
            State::Done => Step::Done,
        }
    }

    pub fn complete<E>(&mut self, result: Result<Resp, E>) -> Result<Resp, E> {
        match result {
            Ok(response) => {
                self.pages += 1;
                self.next_token = response.next_page_token();
                self.metadata = response.metadata();
                Ok(response)
            }
            Err(e) => {
                tracing::debug!(page = self.pages + 1, "page fetch failed");
                self.state = State::Done;
                Err(e)
            }
        }
    }

    /// Creates the span wrapping the fetch of `request`, if tracing is enabled.
    pub fn fetch_span(&self, request: &Req) -> tracing::Span {
        if self.options.tracing_enabled() {
            tracing::info_span!(
                "page_fetch",
                page = self.pages + 1,
                page_token = request.page_token()
            )
        } else {
            tracing::Span::none()
        }
    }

    fn finish(&mut self) -> Step<Req, Resp> {
        self.state = State::Done;
        Step::Done
    }
}

impl<Req, Resp> PageCursor<Req, Resp>
where
    Resp: PageableResponse,
{
    pub fn started(&self) -> bool {
        self.state != State::Initial
    }

    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    pub fn pages(&self) -> usize {
        self.pages
    }

    pub fn truncated(&self) -> bool {
        self.truncated
    }

    pub fn metadata(&self) -> &Resp::Metadata {
        &self.metadata
    }
}
