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
use std::marker::PhantomData;

/// An adapter that converts a blocking list RPC into iterators over pages or
/// items.
///
/// The pager is created after the first call to the list RPC completes. It
/// captures the first response and calls the RPC again, with an updated page
/// token, each time the application needs another page.
///
/// Errors from the RPC are returned unchanged, at the point where the
/// application asks for the next page or item. No retries are attempted. After
/// an error the iteration is over.
///
/// The pager owns `invoke`, which may borrow a local client. The pager is
/// [Send] only if `invoke` is.
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
/// # fn list_topics(_: ListTopicsRequest) -> Result<ListTopicsResponse, String> {
/// #     Ok(ListTopicsResponse { topics: vec!["t1".into()], next_page_token: String::new() })
/// # }
/// use rpc_pager::pager::Pager;
/// # fn main() -> anyhow::Result<()> {
/// let request = ListTopicsRequest::default();
/// let first = list_topics(request.clone()).map_err(anyhow::Error::msg)?;
/// let mut pager = Pager::new(list_topics, request, first);
/// for page in pager.pages()? {
///     let page = page.map_err(anyhow::Error::msg)?;
///     println!("page with {} topics", page.topics.len());
/// }
/// # Ok(()) }
/// ```
pub struct Pager<Req, Resp, E, F>
where
    Resp: PageableResponse,
{
    cursor: PageCursor<Req, Resp>,
    invoke: F,
    _error: PhantomData<fn() -> E>,
}

impl<Req, Resp, E, F> Pager<Req, Resp, E, F>
where
    Req: PageableRequest,
    Resp: PageableResponse,
    F: FnMut(Req) -> Result<Resp, E>,
{
    /// Creates a new pager.
    ///
    /// The `response` must be the result of `invoke(request)`. The pager does
    /// not make this first call.
    pub fn new(invoke: F, request: Req, response: Resp) -> Self {
        Self::with_options(invoke, request, response, PagerOptions::default())
    }

    /// Creates a new pager with custom options.
    pub fn with_options(invoke: F, request: Req, response: Resp, options: PagerOptions) -> Self {
        Self {
            cursor: PageCursor::new(request, response, options),
            invoke,
            _error: PhantomData,
        }
    }

    /// Makes the first call to `invoke` and creates a pager with its result.
    ///
    /// If the first call fails its error is returned unchanged.
    pub fn start(invoke: F, request: Req) -> Result<Self, E> {
        Self::start_with_options(invoke, request, PagerOptions::default())
    }

    /// Like [start][Pager::start], with custom options.
    pub fn start_with_options(
        mut invoke: F,
        request: Req,
        options: PagerOptions,
    ) -> Result<Self, E> {
        let response = invoke(request.clone())?;
        Ok(Self::with_options(invoke, request, response, options))
    }

    /// Returns an iterator over the pages.
    ///
    /// The first page is the response captured when the pager was created.
    /// Each following page is fetched when the iterator advances, and only if
    /// the previous page had a non-empty `next_page_token`.
    ///
    /// Fails if the pager already returned any page.
    pub fn pages(&mut self) -> crate::Result<Pages<'_, Req, Resp, E, F>> {
        self.check_fresh()?;
        Ok(Pages { pager: self })
    }

    /// Returns an iterator over the items in all the pages.
    ///
    /// A new page is fetched only after all the items in the current page are
    /// consumed, and only if the application asks for another item. Pages
    /// without items are skipped.
    ///
    /// Fails if the pager already returned any page.
    pub fn items(&mut self) -> crate::Result<Items<'_, Req, Resp, E, F>> {
        self.check_fresh()?;
        Ok(Items {
            pager: self,
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

    fn next_page(&mut self) -> Option<Result<Resp, E>> {
        match self.cursor.step() {
            Step::Yield(response) => Some(Ok(response)),
            Step::Fetch(request) => {
                let span = self.cursor.fetch_span(&request);
                let result = span.in_scope(|| (self.invoke)(request));
                Some(self.cursor.complete(result))
            }
            Step::Done => None,
        }
    }
}

impl<Req, Resp, E, F> std::fmt::Debug for Pager<Req, Resp, E, F>
where
    Resp: PageableResponse,
    Resp::Metadata: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pager")
            .field("metadata", self.cursor.metadata())
            .field("pages", &self.cursor.pages())
            .field("truncated", &self.cursor.truncated())
            .finish()
    }
}

/// An iterator over the pages of a [Pager].
pub struct Pages<'a, Req, Resp, E, F>
where
    Resp: PageableResponse,
{
    pager: &'a mut Pager<Req, Resp, E, F>,
}

impl<Req, Resp, E, F> Pages<'_, Req, Resp, E, F>
where
    Req: PageableRequest,
    Resp: PageableResponse,
    F: FnMut(Req) -> Result<Resp, E>,
{
    /// The metadata of the most recently fetched page.
    pub fn metadata(&self) -> &Resp::Metadata {
        self.pager.metadata()
    }
}

impl<Req, Resp, E, F> Iterator for Pages<'_, Req, Resp, E, F>
where
    Req: PageableRequest,
    Resp: PageableResponse,
    F: FnMut(Req) -> Result<Resp, E>,
{
    type Item = Result<Resp, E>;

    fn next(&mut self) -> Option<Self::Item> {
        self.pager.next_page()
    }
}

impl<Req, Resp, E, F> std::iter::FusedIterator for Pages<'_, Req, Resp, E, F>
where
    Req: PageableRequest,
    Resp: PageableResponse,
    F: FnMut(Req) -> Result<Resp, E>,
{
}

/// An iterator over the items of a [Pager].
pub struct Items<'a, Req, Resp, E, F>
where
    Resp: PageableResponse,
{
    pager: &'a mut Pager<Req, Resp, E, F>,
    buffer: std::vec::IntoIter<Resp::PageItem>,
}

impl<Req, Resp, E, F> Items<'_, Req, Resp, E, F>
where
    Req: PageableRequest,
    Resp: PageableResponse,
    F: FnMut(Req) -> Result<Resp, E>,
{
    /// The metadata of the most recently fetched page.
    pub fn metadata(&self) -> &Resp::Metadata {
        self.pager.metadata()
    }
}

impl<Req, Resp, E, F> Iterator for Items<'_, Req, Resp, E, F>
where
    Req: PageableRequest,
    Resp: PageableResponse,
    F: FnMut(Req) -> Result<Resp, E>,
{
    type Item = Result<Resp::PageItem, E>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffer.next() {
                return Some(Ok(item));
            }
            match self.pager.next_page()? {
                Ok(page) => self.buffer = page.into_items().into_iter(),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

impl<Req, Resp, E, F> std::iter::FusedIterator for Items<'_, Req, Resp, E, F>
where
    Req: PageableRequest,
    Resp: PageableResponse,
    F: FnMut(Req) -> Result<Resp, E>,
{
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::tests::{TestLayer, TestRequest, TestResponse};
    use pretty_assertions::assert_eq;
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::prelude::*;

    type TestError = String;

    // Returns the canned responses in order and records each request.
    fn fake_rpc(
        responses: Vec<Result<TestResponse, TestError>>,
    ) -> (
        impl FnMut(TestRequest) -> Result<TestResponse, TestError> + Send + 'static,
        Arc<Mutex<Vec<TestRequest>>>,
    ) {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = requests.clone();
        let mut responses = VecDeque::from(responses);
        let invoke = move |request: TestRequest| {
            tracing::info!("list rpc");
            recorded.lock().unwrap().push(request);
            responses
                .pop_front()
                .unwrap_or_else(|| Err("unexpected call".to_string()))
        };
        (invoke, requests)
    }

    fn test_request() -> TestRequest {
        TestRequest {
            parent: "projects/test-project".to_string(),
            page_token: String::new(),
        }
    }

    #[test]
    fn empty_first_page() -> anyhow::Result<()> {
        let first = TestResponse::new(&[], 0, "");
        let (invoke, requests) = fake_rpc(vec![]);
        let mut pager = Pager::new(invoke, test_request(), first.clone());
        let pages = pager.pages()?.collect::<Vec<_>>();
        assert_eq!(pages, vec![Ok(first.clone())]);

        let (invoke, _) = fake_rpc(vec![]);
        let mut pager = Pager::new(invoke, test_request(), first);
        let items = pager.items()?.collect::<Vec<_>>();
        assert!(items.is_empty(), "{items:?}");
        assert!(requests.lock().unwrap().is_empty());
        Ok(())
    }

    #[test]
    fn two_pages() -> anyhow::Result<()> {
        let first = TestResponse::new(&[], 0, "T1");
        let second = TestResponse::new(&["a", "b", "c"], 3, "");

        let (invoke, requests) = fake_rpc(vec![Ok(second.clone())]);
        let mut pager = Pager::new(invoke, test_request(), first.clone());
        let pages = pager.pages()?.collect::<Vec<_>>();
        assert_eq!(pages, vec![Ok(first.clone()), Ok(second.clone())]);
        assert_eq!(
            requests.lock().unwrap().as_slice(),
            &[TestRequest {
                page_token: "T1".to_string(),
                ..test_request()
            }]
        );

        let (invoke, _) = fake_rpc(vec![Ok(second)]);
        let mut pager = Pager::new(invoke, test_request(), first);
        let items = pager.items()?.collect::<Result<Vec<_>, _>>();
        assert_eq!(items, Ok(vec!["a".to_string(), "b".to_string(), "c".to_string()]));
        Ok(())
    }

    #[test]
    fn items_in_order_across_pages() -> anyhow::Result<()> {
        let first = TestResponse::new(&["a", "b"], 1, "t1");
        let (invoke, requests) = fake_rpc(vec![
            Ok(TestResponse::new(&["c"], 2, "t2")),
            Ok(TestResponse::new(&[], 3, "t3")),
            Ok(TestResponse::new(&["d", "e"], 4, "")),
        ]);
        let mut pager = Pager::new(invoke, test_request(), first);
        let items = pager.items()?.collect::<Result<Vec<_>, _>>();
        assert_eq!(items, Ok(["a", "b", "c", "d", "e"].map(str::to_string).to_vec()));
        assert_eq!(pager.metadata(), &4);
        let tokens = requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.page_token.clone())
            .collect::<Vec<_>>();
        assert_eq!(tokens, vec!["t1", "t2", "t3"]);
        Ok(())
    }

    #[test]
    fn fetches_lazily() -> anyhow::Result<()> {
        let first = TestResponse::new(&["a", "b"], 1, "t1");
        let (invoke, requests) = fake_rpc(vec![Ok(TestResponse::new(&["c"], 2, ""))]);
        let mut pager = Pager::new(invoke, test_request(), first);
        let mut items = pager.items()?;
        assert_eq!(items.next(), Some(Ok("a".to_string())));
        assert_eq!(items.next(), Some(Ok("b".to_string())));
        assert!(requests.lock().unwrap().is_empty());
        assert_eq!(items.metadata(), &1);
        assert_eq!(items.next(), Some(Ok("c".to_string())));
        assert_eq!(requests.lock().unwrap().len(), 1);
        assert_eq!(items.metadata(), &2);
        assert_eq!(items.next(), None);
        assert_eq!(items.next(), None);
        Ok(())
    }

    #[test]
    fn metadata_tracks_latest_page() -> anyhow::Result<()> {
        let first = TestResponse::new(&["a"], 10, "t1");
        let (invoke, _) = fake_rpc(vec![Ok(TestResponse::new(&["b"], 20, ""))]);
        let mut pager = Pager::new(invoke, test_request(), first);
        assert_eq!(pager.metadata(), &10);
        let mut pages = pager.pages()?;
        assert!(matches!(pages.next(), Some(Ok(_))));
        assert_eq!(pages.metadata(), &10);
        assert!(matches!(pages.next(), Some(Ok(_))));
        assert_eq!(pages.metadata(), &20);
        assert!(pages.next().is_none());
        assert_eq!(pager.metadata(), &20);
        Ok(())
    }

    #[test]
    fn error_on_second_page() -> anyhow::Result<()> {
        let first = TestResponse::new(&["a", "b"], 1, "t1");
        let (invoke, requests) = fake_rpc(vec![Err("simulated failure".to_string())]);
        let mut pager = Pager::new(invoke, test_request(), first);
        let mut items = pager.items()?;
        assert_eq!(items.next(), Some(Ok("a".to_string())));
        assert_eq!(items.next(), Some(Ok("b".to_string())));
        assert_eq!(items.next(), Some(Err("simulated failure".to_string())));
        assert_eq!(items.next(), None);
        assert_eq!(requests.lock().unwrap().len(), 1);
        Ok(())
    }

    #[test]
    fn second_iteration_is_rejected() -> anyhow::Result<()> {
        let first = TestResponse::new(&["a"], 1, "");
        let (invoke, _) = fake_rpc(vec![]);
        let mut pager = Pager::new(invoke, test_request(), first);

        // Creating and dropping an iterator does not advance the cursor.
        let _ = pager.items()?;
        let pages = pager.pages()?.count();
        assert_eq!(pages, 1);

        let err = pager.pages().err().expect("second iteration should fail");
        assert!(err.is_consumed(), "{err:?}");
        let err = pager.items().err().expect("second iteration should fail");
        assert!(err.is_consumed(), "{err:?}");
        Ok(())
    }

    #[test]
    fn page_limit() -> anyhow::Result<()> {
        let first = TestResponse::new(&["a"], 1, "t1");
        let (invoke, requests) = fake_rpc(vec![
            Ok(TestResponse::new(&["b"], 2, "t2")),
            Ok(TestResponse::new(&["c"], 3, "")),
        ]);
        let options = PagerOptions::new().set_max_pages(2);
        let mut pager = Pager::with_options(invoke, test_request(), first, options);
        let items = pager.items()?.collect::<Result<Vec<_>, _>>();
        assert_eq!(items, Ok(vec!["a".to_string(), "b".to_string()]));
        assert!(pager.truncated());
        assert_eq!(requests.lock().unwrap().len(), 1);
        Ok(())
    }

    #[test]
    fn start() -> anyhow::Result<()> {
        let (invoke, requests) = fake_rpc(vec![
            Ok(TestResponse::new(&["a"], 1, "t1")),
            Ok(TestResponse::new(&["b"], 2, "")),
        ]);
        let mut pager = Pager::start(invoke, test_request()).map_err(anyhow::Error::msg)?;
        let items = pager.items()?.collect::<Result<Vec<_>, _>>();
        assert_eq!(items, Ok(vec!["a".to_string(), "b".to_string()]));
        let tokens = requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.page_token.clone())
            .collect::<Vec<_>>();
        assert_eq!(tokens, vec!["", "t1"]);
        Ok(())
    }

    #[test]
    fn start_error() {
        let (invoke, _) = fake_rpc(vec![Err("simulated failure".to_string())]);
        let got = Pager::start(invoke, test_request());
        assert!(
            matches!(&got, Err(e) if e == "simulated failure"),
            "{:?}",
            got.map(|_| ())
        );
    }

    #[test]
    fn debug() {
        let first = TestResponse::new(&["a"], 42, "");
        let (invoke, _) = fake_rpc(vec![]);
        let pager = Pager::new(invoke, test_request(), first);
        let got = format!("{pager:?}");
        assert!(got.contains("metadata: 42"), "{got}");
    }

    #[test]
    fn borrowed_client() -> anyhow::Result<()> {
        struct Client {
            calls: Cell<u32>,
        }
        impl Client {
            fn list(&self, req: TestRequest) -> Result<TestResponse, TestError> {
                self.calls.set(self.calls.get() + 1);
                match req.page_token.as_str() {
                    "t1" => Ok(TestResponse::new(&["b"], 2, "")),
                    t => Err(format!("unexpected token {t}")),
                }
            }
        }

        let client = Client {
            calls: Cell::new(0),
        };
        let first = TestResponse::new(&["a"], 1, "t1");
        let mut pager = Pager::new(|req| client.list(req), test_request(), first);
        let items = pager.items()?.collect::<Result<Vec<_>, _>>();
        assert_eq!(items, Ok(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(client.calls.get(), 1);
        Ok(())
    }

    #[test]
    fn fetch_runs_in_span() -> anyhow::Result<()> {
        let layer = TestLayer::default();
        let subscriber = tracing_subscriber::registry().with(layer.clone());

        let (invoke, _) = fake_rpc(vec![
            Ok(TestResponse::new(&["a"], 1, "t1")),
            Ok(TestResponse::new(&["b"], 2, "")),
        ]);
        let options = PagerOptions::new().enable_tracing();
        let items = tracing::subscriber::with_default(subscriber, || -> anyhow::Result<_> {
            let mut pager = Pager::start_with_options(invoke, test_request(), options)
                .map_err(anyhow::Error::msg)?;
            Ok(pager.items()?.collect::<Result<Vec<_>, _>>())
        })?;
        assert_eq!(items, Ok(vec!["a".to_string(), "b".to_string()]));

        // The first call is made before the pager exists.
        assert_eq!(
            layer.event_spans("list rpc"),
            vec![None, Some("page_fetch".to_string())]
        );
        let fields = layer.span_fields("page_fetch").expect("page_fetch span was created");
        assert_eq!(
            fields.get("page_token").map(String::as_str),
            Some("t1"),
            "{fields:?}"
        );
        Ok(())
    }

    #[test]
    fn send() {
        type Invoke = fn(TestRequest) -> Result<TestResponse, TestError>;
        static_assertions::assert_impl_all!(Pager<TestRequest, TestResponse, TestError, Invoke>: Send);
    }
}
