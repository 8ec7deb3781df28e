//! Per-endpoint request builders for the formdesk API.
//!
//! # Design
//! `ApiClient` holds only its `ClientConfig` and carries no mutable state
//! between calls. Every endpoint is one `build_*` method that fixes the URL
//! template, verb, body shape and response type, then delegates to the
//! generic wrapper in `request`. Parsing lives on the returned
//! `ApiRequest<T>`, so there is no per-endpoint `parse_*` twin.
//!
//! Slugs and other caller-supplied strings are percent-encoded as single
//! path segments; ids are UUIDs and substituted as-is.

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::HttpMethod;
use crate::request::{encode_segment, ApiRequest, ApiRequestBuilder};
use crate::types::{
    AddMember, CreateForm, CreateOrganization, CreateQuestion, CreateUnit, Form, FormResponse,
    InboxItem, Member, Organization, PublishForm, Question, SubmitResponse, Unit, UpdateForm,
    UpdateInboxItem, UpdateOrganization, UpdateQuestion, User,
};

/// Stateless request builder for the formdesk API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    config: ClientConfig,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_config(ClientConfig::new(base_url))
    }

    pub fn with_config(mut config: ClientConfig) -> Self {
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        Self { config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Start a request against `path` (relative to the base URL). The
    /// method defaults to GET.
    pub fn api(&self, path: &str) -> ApiRequestBuilder {
        ApiRequestBuilder::new(
            format!("{}{path}", self.config.base_url),
            &self.config.default_headers,
        )
    }

    // -----------------------------------------------------------------------
    // Organizations
    // -----------------------------------------------------------------------

    pub fn build_list_organizations(&self) -> Result<ApiRequest<Vec<Organization>>, ApiError> {
        self.api("/orgs").build()
    }

    pub fn build_get_organization(&self, slug: &str) -> Result<ApiRequest<Organization>, ApiError> {
        self.api(&org_path(slug)).build()
    }

    pub fn build_create_organization(
        &self,
        input: &CreateOrganization,
    ) -> Result<ApiRequest<Organization>, ApiError> {
        self.api("/orgs").method(HttpMethod::Post).json(input).build()
    }

    pub fn build_update_organization(
        &self,
        slug: &str,
        input: &UpdateOrganization,
    ) -> Result<ApiRequest<Organization>, ApiError> {
        self.api(&org_path(slug)).method(HttpMethod::Put).json(input).build()
    }

    pub fn build_delete_organization(&self, slug: &str) -> Result<ApiRequest<()>, ApiError> {
        self.api(&org_path(slug)).method(HttpMethod::Delete).build()
    }

    // -----------------------------------------------------------------------
    // Units
    // -----------------------------------------------------------------------

    pub fn build_list_units(&self, slug: &str) -> Result<ApiRequest<Vec<Unit>>, ApiError> {
        self.api(&format!("{}/units", org_path(slug))).build()
    }

    pub fn build_get_unit(&self, slug: &str, unit_id: Uuid) -> Result<ApiRequest<Unit>, ApiError> {
        self.api(&unit_path(slug, unit_id)).build()
    }

    pub fn build_create_unit(&self, slug: &str, input: &CreateUnit) -> Result<ApiRequest<Unit>, ApiError> {
        self.api(&format!("{}/units", org_path(slug)))
            .method(HttpMethod::Post)
            .json(input)
            .build()
    }

    pub fn build_delete_unit(&self, slug: &str, unit_id: Uuid) -> Result<ApiRequest<()>, ApiError> {
        self.api(&unit_path(slug, unit_id)).method(HttpMethod::Delete).build()
    }

    // -----------------------------------------------------------------------
    // Members
    // -----------------------------------------------------------------------

    pub fn build_list_organization_members(&self, slug: &str) -> Result<ApiRequest<Vec<Member>>, ApiError> {
        self.api(&format!("{}/members", org_path(slug))).build()
    }

    pub fn build_add_organization_member(
        &self,
        slug: &str,
        input: &AddMember,
    ) -> Result<ApiRequest<Member>, ApiError> {
        self.api(&format!("{}/members", org_path(slug)))
            .method(HttpMethod::Post)
            .json(input)
            .build()
    }

    pub fn build_remove_organization_member(
        &self,
        slug: &str,
        member_id: Uuid,
    ) -> Result<ApiRequest<()>, ApiError> {
        self.api(&format!("{}/members/{member_id}", org_path(slug)))
            .method(HttpMethod::Delete)
            .build()
    }

    pub fn build_list_unit_members(
        &self,
        slug: &str,
        unit_id: Uuid,
    ) -> Result<ApiRequest<Vec<Member>>, ApiError> {
        self.api(&format!("{}/members", unit_path(slug, unit_id))).build()
    }

    pub fn build_add_unit_member(
        &self,
        slug: &str,
        unit_id: Uuid,
        input: &AddMember,
    ) -> Result<ApiRequest<Member>, ApiError> {
        self.api(&format!("{}/members", unit_path(slug, unit_id)))
            .method(HttpMethod::Post)
            .json(input)
            .build()
    }

    pub fn build_remove_unit_member(
        &self,
        slug: &str,
        unit_id: Uuid,
        member_id: Uuid,
    ) -> Result<ApiRequest<()>, ApiError> {
        self.api(&format!("{}/members/{member_id}", unit_path(slug, unit_id)))
            .method(HttpMethod::Delete)
            .build()
    }

    // -----------------------------------------------------------------------
    // Forms
    // -----------------------------------------------------------------------

    pub fn build_list_forms(&self, slug: &str, unit_id: Uuid) -> Result<ApiRequest<Vec<Form>>, ApiError> {
        self.api(&format!("{}/forms", unit_path(slug, unit_id))).build()
    }

    pub fn build_create_form(
        &self,
        slug: &str,
        unit_id: Uuid,
        input: &CreateForm,
    ) -> Result<ApiRequest<Form>, ApiError> {
        self.api(&format!("{}/forms", unit_path(slug, unit_id)))
            .method(HttpMethod::Post)
            .json(input)
            .build()
    }

    pub fn build_get_form(&self, form_id: Uuid) -> Result<ApiRequest<Form>, ApiError> {
        self.api(&format!("/forms/{form_id}")).build()
    }

    pub fn build_update_form(&self, form_id: Uuid, input: &UpdateForm) -> Result<ApiRequest<Form>, ApiError> {
        self.api(&format!("/forms/{form_id}"))
            .method(HttpMethod::Put)
            .json(input)
            .build()
    }

    pub fn build_delete_form(&self, form_id: Uuid) -> Result<ApiRequest<()>, ApiError> {
        self.api(&format!("/forms/{form_id}")).method(HttpMethod::Delete).build()
    }

    pub fn build_publish_form(&self, form_id: Uuid, input: &PublishForm) -> Result<ApiRequest<Form>, ApiError> {
        self.api(&format!("/forms/{form_id}/publish"))
            .method(HttpMethod::Post)
            .json(input)
            .build()
    }

    // -----------------------------------------------------------------------
    // Questions
    // -----------------------------------------------------------------------

    pub fn build_list_questions(&self, form_id: Uuid) -> Result<ApiRequest<Vec<Question>>, ApiError> {
        self.api(&format!("/forms/{form_id}/questions")).build()
    }

    pub fn build_create_question(
        &self,
        form_id: Uuid,
        input: &CreateQuestion,
    ) -> Result<ApiRequest<Question>, ApiError> {
        self.api(&format!("/forms/{form_id}/questions"))
            .method(HttpMethod::Post)
            .json(input)
            .build()
    }

    pub fn build_update_question(
        &self,
        form_id: Uuid,
        question_id: Uuid,
        input: &UpdateQuestion,
    ) -> Result<ApiRequest<Question>, ApiError> {
        self.api(&format!("/forms/{form_id}/questions/{question_id}"))
            .method(HttpMethod::Put)
            .json(input)
            .build()
    }

    pub fn build_delete_question(&self, form_id: Uuid, question_id: Uuid) -> Result<ApiRequest<()>, ApiError> {
        self.api(&format!("/forms/{form_id}/questions/{question_id}"))
            .method(HttpMethod::Delete)
            .build()
    }

    // -----------------------------------------------------------------------
    // Responses
    // -----------------------------------------------------------------------

    pub fn build_list_responses(&self, form_id: Uuid) -> Result<ApiRequest<Vec<FormResponse>>, ApiError> {
        self.api(&format!("/forms/{form_id}/responses")).build()
    }

    pub fn build_submit_response(
        &self,
        form_id: Uuid,
        input: &SubmitResponse,
    ) -> Result<ApiRequest<FormResponse>, ApiError> {
        self.api(&format!("/forms/{form_id}/responses"))
            .method(HttpMethod::Post)
            .json(input)
            .build()
    }

    // -----------------------------------------------------------------------
    // Inbox
    // -----------------------------------------------------------------------

    pub fn build_list_inbox(&self) -> Result<ApiRequest<Vec<InboxItem>>, ApiError> {
        self.api("/inbox").build()
    }

    pub fn build_get_inbox_item(&self, id: Uuid) -> Result<ApiRequest<InboxItem>, ApiError> {
        self.api(&format!("/inbox/{id}")).build()
    }

    /// Flag updates go out as POST, which is what the server routes.
    pub fn build_update_inbox_item(
        &self,
        id: Uuid,
        input: &UpdateInboxItem,
    ) -> Result<ApiRequest<InboxItem>, ApiError> {
        self.api(&format!("/inbox/{id}"))
            .method(HttpMethod::Post)
            .json(input)
            .build()
    }

    // -----------------------------------------------------------------------
    // User and auth
    // -----------------------------------------------------------------------

    pub fn build_get_current_user(&self) -> Result<ApiRequest<User>, ApiError> {
        self.api("/users/me").build()
    }

    pub fn build_logout(&self) -> Result<ApiRequest<()>, ApiError> {
        self.api("/auth/logout").method(HttpMethod::Post).build()
    }

    /// URL the browser is redirected to for signing in with `provider`.
    /// After the provider round-trip the server sends the user back to
    /// `redirect`.
    pub fn login_url(&self, provider: &str, redirect: &str) -> String {
        format!(
            "{}/auth/login/{}?r={}",
            self.config.base_url,
            encode_segment(provider),
            utf8_percent_encode(redirect, NON_ALPHANUMERIC)
        )
    }
}

fn org_path(slug: &str) -> String {
    format!("/orgs/{}", encode_segment(slug))
}

fn unit_path(slug: &str, unit_id: Uuid) -> String {
    format!("{}/units/{unit_id}", org_path(slug))
}
