//! API client core for the formdesk service.
//!
//! # Overview
//! Builds `HttpRequest` values and parses `HttpResponse` values for every
//! formdesk endpoint, and layers a keyed query cache on top so reads are
//! shared and writes invalidate what they touched.
//!
//! # Design
//! - `ApiClient` is stateless. It holds only its `ClientConfig`, and each
//!   endpoint is a `build_*` method returning a typed `ApiRequest<T>`.
//! - All requests go through one wrapper (`ApiClient::api`), which fixes
//!   default headers, JSON bodies and status handling in a single place.
//! - The network is behind the `Transport` trait. The host executes
//!   requests; the core stays deterministic and easy to test.
//! - `QueryCache` is an explicit value, not global state. `QueryClient`
//!   owns one and exposes a query or mutation per resource (`hooks`).
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod hooks;
pub mod http;
pub mod query;
pub mod request;
pub mod transport;
pub mod types;

pub use cache::{Invalidate, QueryCache, QueryKey, QueryKind};
pub use client::ApiClient;
pub use config::ClientConfig;
pub use error::ApiError;
pub use hooks::NEW_FORM_ROUTE_ID;
pub use http::{Credentials, HttpMethod, HttpRequest, HttpResponse};
pub use query::{Mutation, Query, QueryClient, QueryState};
pub use request::{ApiRequest, ApiRequestBuilder};
pub use transport::{Transport, TransportFuture};
pub use types::{
    AddMember, Answer, Choice, CreateForm, CreateOrganization, CreateQuestion, CreateUnit, Form,
    FormResponse, FormStatus, InboxEntry, InboxItem, Member, Metadata, Organization, PublishForm,
    Question, QuestionType, SubmitResponse, Unit, UpdateForm, UpdateInboxItem, UpdateOrganization,
    UpdateQuestion, User,
};
