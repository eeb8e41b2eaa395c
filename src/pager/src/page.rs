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

/// Describes the request message of a list RPC.
///
/// List RPCs as defined by [AIP-158](https://google.aip.dev/158) carry a
/// `page_token` field. All other fields remain unchanged while iterating over
/// the results.
pub trait PageableRequest: Clone {
    /// The continuation token in this request.
    fn page_token(&self) -> &str;

    /// Returns a copy of this request with a new continuation token.
    ///
    /// Implementations must not change any other field.
    fn with_page_token(self, token: String) -> Self;
}

/// Describes the response message of a list RPC.
///
/// Each response contains one page of items, a continuation token, and
/// possibly some other fields describing the page. The pagers expose those
/// other fields through [Metadata][PageableResponse::Metadata], a typed
/// projection chosen by each service.
pub trait PageableResponse {
    /// The type of the items in each page.
    type PageItem;

    /// The fields, other than the items and token, that applications may need
    /// while iterating. Use `()` if there are none.
    type Metadata: Clone;

    /// The token to fetch the next page. An empty token marks the last page.
    fn next_page_token(&self) -> String;

    /// Extracts the metadata for this page.
    fn metadata(&self) -> Self::Metadata;

    /// Consumes the page, returning its items in order.
    fn into_items(self) -> Vec<Self::PageItem>;
}
