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

use crate::cursor::{PageCursor, Step};
use crate::error::Error;
use crate::options::PagerOptions;
use crate::page::{PageableRequest, PageableResponse};
use futures::stream::FusedStream;
use futures::{Stream, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use tracing::Instrument;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
// Each call wraps the RPC future in the span for that page fetch.
type Invoke<Req, Resp, E> =
    Box<dyn FnMut(Req, tracing::Span) -> BoxFuture<Result<Resp, E>> + Send>;

/// An adapter that converts list RPCs as defined by [AIP-4233](https://google.aip.dev/client-libraries/4233)
/// into [futures::Stream]s of pages or items.
///
/// This is the async counterpart of [Pager][crate::pager::Pager]. The
/// paginator is created after the first call to the list RPC completes, and
/// awaits a new call each time the application needs another page. It
/// produces the same pages, in the same order, as the blocking pager.
///
/// Dropping a stream while a page fetch is in progress is safe. The fetch is
/// abandoned when the paginator is dropped.
///
/// # Example
/// ```
/// # use rpc_pager::page::{PageableRequest, PageableResponse};
/// # #[derive(Clone, Default)]
/// # struct ListTopicsRequest { page_token: String }
/// # impl PageableRequest for ListTopicsRequest {
/// #     fn page_token(&self) -> &str { &self.page_token }
/// #     fn with_page_token(mut self, token: String) -> Self { self.page_token = token; self }
/// # }
/// # struct ListTopicsResponse { topics: Vec<String>, next_page_token: String }
/// # impl PageableResponse for ListTopicsResponse {
/// #     type PageItem = String;
/// #     type Metadata = ();
/// #     fn next_page_token(&self) -> String { self.next_page_token.clone() }
/// #     fn metadata(&self) {}
/// #     fn into_items(self) -> Vec<String> { self.topics }
/// # }
/// # async fn list_topics(_: ListTopicsRequest) -> Result<ListTopicsResponse, String> {
/// #     Ok(ListTopicsResponse { topics: vec!["t1".into()], next_page_token: String::new() })
/// # }
/// use rpc_pager::paginator::Paginator;
/// # tokio_test::block_on(async {
/// let mut paginator = Paginator::start(list_topics, ListTopicsRequest::default()).await
///     .map_err(anyhow::Error::msg)?;
/// let mut items = paginator.items()?;
/// while let Some(topic) = items.next().await {
///     println!("topic = {}", topic.map_err(anyhow::Error::msg)?);
/// }
/// # anyhow::Result::<()>::Ok(()) });
/// ```
pub struct Paginator<Req, Resp, E>
where
    Resp: PageableResponse,
{
    cursor: PageCursor<Req, Resp>,
    invoke: Invoke<Req, Resp, E>,
    pending: Option<BoxFuture<Result<Resp, E>>>,
}

impl<Req, Resp, E> Paginator<Req, Resp, E>
where
    Req: PageableRequest,
    Resp: PageableResponse,
{
    /// Creates a new paginator.
    ///
    /// The `response` must be the result of `invoke(request).await`. The
    /// paginator does not make this first call.
    pub fn new<F, Fut>(invoke: F, request: Req, response: Resp) -> Self
    where
        F: FnMut(Req) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Resp, E>> + Send + 'static,
    {
        Self::with_options(invoke, request, response, PagerOptions::default())
    }

    /// Creates a new paginator with custom options.
    pub fn with_options<F, Fut>(
        mut invoke: F,
        request: Req,
        response: Resp,
        options: PagerOptions,
    ) -> Self
    where
        F: FnMut(Req) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Resp, E>> + Send + 'static,
    {
        let invoke: Invoke<Req, Resp, E> =
            Box::new(move |request, span| -> BoxFuture<Result<Resp, E>> {
                Box::pin(invoke(request).instrument(span))
            });
        Self {
            cursor: PageCursor::new(request, response, options),
            invoke,
            pending: None,
        }
    }

    /// Makes the first call to `invoke` and creates a paginator with its
    /// result.
    ///
    /// If the first call fails its error is returned unchanged.
    pub async fn start<F, Fut>(invoke: F, request: Req) -> Result<Self, E>
    where
        F: FnMut(Req) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Resp, E>> + Send + 'static,
    {
        Self::start_with_options(invoke, request, PagerOptions::default()).await
    }

    /// Like [start][Paginator::start], with custom options.
    pub async fn start_with_options<F, Fut>(
        mut invoke: F,
        request: Req,
        options: PagerOptions,
    ) -> Result<Self, E>
    where
        F: FnMut(Req) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Resp, E>> + Send + 'static,
    {
        let response = invoke(request.clone()).await?;
        Ok(Self::with_options(invoke, request, response, options))
    }

    /// Returns a stream over the pages.
    ///
    /// The first page is the response captured when the paginator was
    /// created. Each following page is fetched when the stream is polled, and
    /// only if the previous page had a non-empty `next_page_token`.
    ///
    /// Fails if the paginator already returned any page.
    pub fn pages(&mut self) -> crate::Result<Pages<'_, Req, Resp, E>> {
        self.check_fresh()?;
        Ok(Pages { paginator: self })
    }

    /// Returns a stream over the items in all the pages.
    ///
    /// A new page is fetched only after all the items in the current page are
    /// consumed, and only if the application polls for another item. Pages
    /// without items are skipped.
    ///
    /// Fails if the paginator already returned any page.
    pub fn items(&mut self) -> crate::Result<Items<'_, Req, Resp, E>> {
        self.check_fresh()?;
        Ok(Items {
            paginator: self,
            buffer: Vec::new().into_iter(),
        })
    }

    /// The metadata of the most recently fetched page.
    ///
    /// This reflects the latest page only, it is not accumulated across pages.
    pub fn metadata(&self) -> &Resp::Metadata {
        self.cursor.metadata()
    }

    /// Returns true if the iteration stopped because it reached the
    /// [page limit][PagerOptions::set_max_pages] while more pages were
    /// available.
    pub fn truncated(&self) -> bool {
        self.cursor.truncated()
    }

    fn check_fresh(&self) -> crate::Result<()> {
        if self.cursor.started() {
            return Err(Error::consumed(self.cursor.pages()));
        }
        Ok(())
    }

    fn is_terminated(&self) -> bool {
        self.pending.is_none() && self.cursor.is_done()
    }

    fn poll_next_page(&mut self, cx: &mut Context<'_>) -> Poll<Option<Result<Resp, E>>> {
        loop {
            if let Some(fetch) = self.pending.as_mut() {
                let result = ready!(fetch.as_mut().poll(cx));
                self.pending = None;
                return Poll::Ready(Some(self.cursor.complete(result)));
            }
            match self.cursor.step() {
                Step::Yield(response) => return Poll::Ready(Some(Ok(response))),
                Step::Fetch(request) => {
                    let span = self.cursor.fetch_span(&request);
                    self.pending = Some((self.invoke)(request, span));
                }
                Step::Done => return Poll::Ready(None),
            }
        }
    }
}

impl<Req, Resp, E> std::fmt::Debug for Paginator<Req, Resp, E>
where
    Resp: PageableResponse,
    Resp::Metadata: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Paginator")
            .field("metadata", self.cursor.metadata())
            .field("pages", &self.cursor.pages())
            .field("truncated", &self.cursor.truncated())
            .field("fetching", &self.pending.is_some())
            .finish()
    }
}

/// A stream over the pages of a [Paginator].
pub struct Pages<'a, Req, Resp, E>
where
    Resp: PageableResponse,
{
    paginator: &'a mut Paginator<Req, Resp, E>,
}

impl<Req, Resp, E> Pages<'_, Req, Resp, E>
where
    Req: PageableRequest,
    Resp: PageableResponse,
{
    /// Returns the next page.
    pub fn next(&mut self) -> futures::stream::Next<'_, Self> {
        StreamExt::next(self)
    }

    /// The metadata of the most recently fetched page.
    pub fn metadata(&self) -> &Resp::Metadata {
        self.paginator.metadata()
    }
}

impl<Req, Resp, E> Stream for Pages<'_, Req, Resp, E>
where
    Req: PageableRequest,
    Resp: PageableResponse,
{
    type Item = Result<Resp, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().paginator.poll_next_page(cx)
    }
}

impl<Req, Resp, E> FusedStream for Pages<'_, Req, Resp, E>
where
    Req: PageableRequest,
    Resp: PageableResponse,
{
    fn is_terminated(&self) -> bool {
        self.paginator.is_terminated()
    }
}

/// A stream over the items of a [Paginator].
pub struct Items<'a, Req, Resp, E>
where
    Resp: PageableResponse,
{
    paginator: &'a mut Paginator<Req, Resp, E>,
    buffer: std::vec::IntoIter<Resp::PageItem>,
}

// The buffered items are never pinned.
impl<Req, Resp, E> Unpin for Items<'_, Req, Resp, E> where Resp: PageableResponse {}

impl<Req, Resp, E> Items<'_, Req, Resp, E>
where
    Req: PageableRequest,
    Resp: PageableResponse,
{
    /// Returns the next item.
    pub fn next(&mut self) -> futures::stream::Next<'_, Self> {
        StreamExt::next(self)
    }

    /// The metadata of the most recently fetched page.
    pub fn metadata(&self) -> &Resp::Metadata {
        self.paginator.metadata()
    }
}

impl<Req, Resp, E> Stream for Items<'_, Req, Resp, E>
where
    Req: PageableRequest,
    Resp: PageableResponse,
{
    type Item = Result<Resp::PageItem, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(item) = this.buffer.next() {
                return Poll::Ready(Some(Ok(item)));
            }
            match ready!(this.paginator.poll_next_page(cx)) {
                Some(Ok(page)) => this.buffer = page.into_items().into_iter(),
                Some(Err(e)) => return Poll::Ready(Some(Err(e))),
                None => return Poll::Ready(None),
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let buffered = self.buffer.len();
        if self.paginator.is_terminated() {
            return (buffered, Some(buffered));
        }
        (buffered, None)
    }
}

impl<Req, Resp, E> FusedStream for Items<'_, Req, Resp, E>
where
    Req: PageableRequest,
    Resp: PageableResponse,
{
    fn is_terminated(&self) -> bool {
        self.buffer.as_slice().is_empty() && self.paginator.is_terminated()
    }
}
