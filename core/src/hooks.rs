//! One query or mutation per resource, with its cache key and the keys it
//! invalidates.

use uuid::Uuid;

use crate::cache::{Invalidate, QueryKey, QueryKind};
use crate::query::{Mutation, Query, QueryClient};
use crate::types::{
    AddMember, CreateForm, CreateOrganization, CreateQuestion, CreateUnit, Form, FormResponse,
    InboxItem, Member, Organization, PublishForm, Question, SubmitResponse, Unit, UpdateForm,
    UpdateInboxItem, UpdateOrganization, UpdateQuestion, User,
};

/// Route id the form editor uses before the form exists on the server.
pub const NEW_FORM_ROUTE_ID: &str = "new";

impl QueryClient {
    // -----------------------------------------------------------------------
    // Organizations
    // -----------------------------------------------------------------------

    pub fn organizations(&self) -> Query<Vec<Organization>> {
        self.query(QueryKey::Organizations, self.api().build_list_organizations())
    }

    pub fn organization(&self, slug: &str) -> Query<Organization> {
        self.query(
            QueryKey::Organization { slug: slug.to_string() },
            self.api().build_get_organization(slug),
        )
    }

    pub fn add_organization(&self, input: &CreateOrganization) -> Mutation<Organization> {
        self.mutation(
            self.api().build_create_organization(input),
            vec![QueryKey::Organizations.into()],
        )
    }

    pub fn update_organization(&self, slug: &str, input: &UpdateOrganization) -> Mutation<Organization> {
        self.mutation(
            self.api().build_update_organization(slug, input),
            vec![
                QueryKey::Organizations.into(),
                QueryKey::Organization { slug: slug.to_string() }.into(),
            ],
        )
    }

    /// Removing an organization takes its units, members and forms along.
    pub fn delete_organization(&self, slug: &str) -> Mutation<()> {
        let mut targets = vec![
            QueryKey::Organizations.into(),
            Invalidate::Organization(slug.to_string()),
        ];
        targets.extend(form_content_targets());
        self.mutation(self.api().build_delete_organization(slug), targets)
    }

    // -----------------------------------------------------------------------
    // Units
    // -----------------------------------------------------------------------

    pub fn units(&self, slug: &str) -> Query<Vec<Unit>> {
        self.query(QueryKey::Units { slug: slug.to_string() }, self.api().build_list_units(slug))
    }

    pub fn unit(&self, slug: &str, unit_id: Uuid) -> Query<Unit> {
        self.query(
            QueryKey::Unit { slug: slug.to_string(), unit_id },
            self.api().build_get_unit(slug, unit_id),
        )
    }

    pub fn add_unit(&self, slug: &str, input: &CreateUnit) -> Mutation<Unit> {
        self.mutation(
            self.api().build_create_unit(slug, input),
            vec![QueryKey::Units { slug: slug.to_string() }.into()],
        )
    }

    /// Removing a unit takes its members and forms along.
    pub fn delete_unit(&self, slug: &str, unit_id: Uuid) -> Mutation<()> {
        let mut targets = vec![
            QueryKey::Units { slug: slug.to_string() }.into(),
            Invalidate::Unit { slug: slug.to_string(), unit_id },
        ];
        targets.extend(form_content_targets());
        self.mutation(self.api().build_delete_unit(slug, unit_id), targets)
    }

    // -----------------------------------------------------------------------
    // Members
    // -----------------------------------------------------------------------

    /// Reports an empty list until the first response arrives.
    pub fn organization_members(&self, slug: &str) -> Query<Vec<Member>> {
        self.query(
            QueryKey::OrganizationMembers { slug: slug.to_string() },
            self.api().build_list_organization_members(slug),
        )
        .placeholder(Vec::new())
    }

    pub fn add_organization_member(&self, slug: &str, email: &str) -> Mutation<Member> {
        let input = AddMember { email: email.to_string() };
        self.mutation(
            self.api().build_add_organization_member(slug, &input),
            vec![QueryKey::OrganizationMembers { slug: slug.to_string() }.into()],
        )
    }

    pub fn remove_organization_member(&self, slug: &str, member_id: Uuid) -> Mutation<()> {
        self.mutation(
            self.api().build_remove_organization_member(slug, member_id),
            vec![QueryKey::OrganizationMembers { slug: slug.to_string() }.into()],
        )
    }

    /// Reports an empty list until the first response arrives.
    pub fn unit_members(&self, slug: &str, unit_id: Uuid) -> Query<Vec<Member>> {
        self.query(
            QueryKey::UnitMembers { slug: slug.to_string(), unit_id },
            self.api().build_list_unit_members(slug, unit_id),
        )
        .placeholder(Vec::new())
    }

    pub fn add_unit_member(&self, slug: &str, unit_id: Uuid, email: &str) -> Mutation<Member> {
        let input = AddMember { email: email.to_string() };
        self.mutation(
            self.api().build_add_unit_member(slug, unit_id, &input),
            vec![QueryKey::UnitMembers { slug: slug.to_string(), unit_id }.into()],
        )
    }

    pub fn remove_unit_member(&self, slug: &str, unit_id: Uuid, member_id: Uuid) -> Mutation<()> {
        self.mutation(
            self.api().build_remove_unit_member(slug, unit_id, member_id),
            vec![QueryKey::UnitMembers { slug: slug.to_string(), unit_id }.into()],
        )
    }

    // -----------------------------------------------------------------------
    // Forms
    // -----------------------------------------------------------------------

    pub fn forms(&self, slug: &str, unit_id: Uuid) -> Query<Vec<Form>> {
        self.query(
            QueryKey::Forms { slug: slug.to_string(), unit_id },
            self.api().build_list_forms(slug, unit_id),
        )
    }

    /// The form behind an editor route id. The query is disabled for
    /// `"new"` and for anything that is not a form id.
    pub fn form(&self, route_id: &str) -> Query<Form> {
        let form_id = match route_id {
            NEW_FORM_ROUTE_ID => None,
            other => match Uuid::parse_str(other) {
                Ok(id) => Some(id),
                Err(err) => {
                    tracing::warn!(route_id, %err, "not a form id");
                    None
                }
            },
        };
        let id = form_id.unwrap_or_default();
        self.query(QueryKey::Form { form_id: id }, self.api().build_get_form(id))
            .enabled(form_id.is_some())
    }

    pub fn add_form(&self, slug: &str, unit_id: Uuid, input: &CreateForm) -> Mutation<Form> {
        self.mutation(
            self.api().build_create_form(slug, unit_id, input),
            vec![QueryKey::Forms { slug: slug.to_string(), unit_id }.into()],
        )
    }

    pub fn update_form(&self, form_id: Uuid, input: &UpdateForm) -> Mutation<Form> {
        self.mutation(self.api().build_update_form(form_id, input), form_targets(form_id))
    }

    /// Removing a form takes its questions, responses and inbox deliveries
    /// along.
    pub fn delete_form(&self, form_id: Uuid) -> Mutation<()> {
        let mut targets = form_targets(form_id);
        targets.push(QueryKey::Questions { form_id }.into());
        targets.push(QueryKey::Responses { form_id }.into());
        targets.push(QueryKey::Inbox.into());
        targets.push(QueryKind::InboxItem.into());
        self.mutation(self.api().build_delete_form(form_id), targets)
    }

    pub fn publish_form(&self, form_id: Uuid, input: &PublishForm) -> Mutation<Form> {
        let mut targets = form_targets(form_id);
        targets.push(QueryKey::Inbox.into());
        self.mutation(self.api().build_publish_form(form_id, input), targets)
    }

    // -----------------------------------------------------------------------
    // Questions
    // -----------------------------------------------------------------------

    pub fn questions(&self, form_id: Uuid) -> Query<Vec<Question>> {
        self.query(QueryKey::Questions { form_id }, self.api().build_list_questions(form_id))
    }

    pub fn add_question(&self, form_id: Uuid, input: &CreateQuestion) -> Mutation<Question> {
        self.mutation(
            self.api().build_create_question(form_id, input),
            vec![QueryKey::Questions { form_id }.into()],
        )
    }

    pub fn update_question(&self, form_id: Uuid, question_id: Uuid, input: &UpdateQuestion) -> Mutation<Question> {
        self.mutation(
            self.api().build_update_question(form_id, question_id, input),
            vec![QueryKey::Questions { form_id }.into()],
        )
    }

    pub fn delete_question(&self, form_id: Uuid, question_id: Uuid) -> Mutation<()> {
        self.mutation(
            self.api().build_delete_question(form_id, question_id),
            vec![QueryKey::Questions { form_id }.into()],
        )
    }

    // -----------------------------------------------------------------------
    // Responses
    // -----------------------------------------------------------------------

    pub fn responses(&self, form_id: Uuid) -> Query<Vec<FormResponse>> {
        self.query(QueryKey::Responses { form_id }, self.api().build_list_responses(form_id))
    }

    pub fn submit_response(&self, form_id: Uuid, input: &SubmitResponse) -> Mutation<FormResponse> {
        self.mutation(
            self.api().build_submit_response(form_id, input),
            vec![QueryKey::Responses { form_id }.into(), QueryKey::Inbox.into()],
        )
    }

    // -----------------------------------------------------------------------
    // Inbox
    // -----------------------------------------------------------------------

    pub fn inbox(&self) -> Query<Vec<InboxItem>> {
        self.query(QueryKey::Inbox, self.api().build_list_inbox())
    }

    pub fn inbox_item(&self, id: Uuid) -> Query<InboxItem> {
        self.query(QueryKey::InboxItem { id }, self.api().build_get_inbox_item(id))
    }

    pub fn update_inbox_item(&self, id: Uuid, input: &UpdateInboxItem) -> Mutation<InboxItem> {
        self.mutation(
            self.api().build_update_inbox_item(id, input),
            vec![QueryKey::Inbox.into(), QueryKey::InboxItem { id }.into()],
        )
    }

    // -----------------------------------------------------------------------
    // User
    // -----------------------------------------------------------------------

    pub fn current_user(&self) -> Query<User> {
        self.query(QueryKey::CurrentUser, self.api().build_get_current_user())
    }

    /// Sign out and drop everything cached for the previous session.
    pub fn logout(&self) -> Mutation<()> {
        self.mutation(self.api().build_logout(), Vec::new()).clear_cache_on_success()
    }
}

/// A form edit changes the form itself and whichever unit listing holds
/// it; the listing's scope is not known from the id alone.
fn form_targets(form_id: Uuid) -> Vec<Invalidate> {
    vec![QueryKey::Form { form_id }.into(), QueryKind::Forms.into()]
}

/// Forms and what hangs off them are keyed by form id alone, so removing
/// a unit or an organization reaches every cached one.
fn form_content_targets() -> [Invalidate; 5] {
    [
        QueryKind::Form.into(),
        QueryKind::Questions.into(),
        QueryKind::Responses.into(),
        QueryKey::Inbox.into(),
        QueryKind::InboxItem.into(),
    ]
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::Notify;

    use super::*;
    use crate::cache::QueryCache;
    use crate::client::ApiClient;
    use crate::http::{HttpMethod, HttpRequest, HttpResponse};
    use crate::transport::testing::StubTransport;
    use crate::transport::{Transport, TransportFuture};

    const MEMBER: &str = r#"{"id":"00000000-0000-0000-0000-000000000009","username":"bob","name":"Bob","email":"bob@acme.test","avatar_url":""}"#;

    fn client_with(transport: Arc<dyn Transport>) -> QueryClient {
        QueryClient::new(ApiClient::new("http://api"), QueryCache::new(), transport)
    }

    fn members_stub() -> Arc<StubTransport> {
        StubTransport::new(|req| match req.method {
            HttpMethod::Get => HttpResponse::new(200, format!("[{MEMBER}]")),
            _ => HttpResponse::new(201, MEMBER),
        })
    }

    #[tokio::test]
    async fn adding_member_invalidates_that_org_once() {
        let transport = members_stub();
        let client = client_with(transport.clone());
        let acme = client.organization_members("acme");
        let globex = client.organization_members("globex");
        acme.fetch().await;
        globex.fetch().await;

        let member = client.add_organization_member("acme", "bob@acme.test").execute().await.unwrap();
        assert_eq!(member.email, "bob@acme.test");

        let cache = client.cache();
        assert_eq!(cache.invalidation_count(acme.key()), 1);
        assert_eq!(cache.invalidation_count(globex.key()), 0);

        let post = &transport.calls()[2];
        assert_eq!(post.method, HttpMethod::Post);
        assert_eq!(post.path, "http://api/orgs/acme/members");
        let body: serde_json::Value = serde_json::from_str(post.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, serde_json::json!({"email": "bob@acme.test"}));
    }

    #[tokio::test]
    async fn new_form_route_is_disabled() {
        let transport = StubTransport::ok("{}");
        let client = client_with(transport.clone());
        for route in [NEW_FORM_ROUTE_ID, "not-a-uuid"] {
            let query = client.form(route);
            assert!(!query.is_enabled());
            let state = query.fetch().await;
            assert!(state.data.is_none());
            assert!(state.error.is_none());
            assert!(!state.is_loading);
        }
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn form_route_with_id_fetches() {
        let transport = StubTransport::new(|_| HttpResponse::new(404, "no such form"));
        let client = client_with(transport.clone());
        let id = Uuid::from_u128(42);
        let state = client.form(&id.to_string()).fetch().await;
        assert!(state.error.unwrap().is_not_found());
        assert_eq!(transport.calls()[0].path, format!("http://api/forms/{id}"));
    }

    /// Holds every request until the test releases it.
    struct GatedTransport {
        started: Notify,
        release: Notify,
        body: String,
    }

    impl Transport for GatedTransport {
        fn execute(&self, _request: HttpRequest) -> TransportFuture<'_> {
            Box::pin(async move {
                self.started.notify_one();
                self.release.notified().await;
                Ok(HttpResponse::new(200, self.body.clone()))
            })
        }
    }

    #[tokio::test]
    async fn members_show_placeholder_until_response() {
        let transport = Arc::new(GatedTransport {
            started: Notify::new(),
            release: Notify::new(),
            body: format!("[{MEMBER}]"),
        });
        let client = client_with(transport.clone());
        let query = client.organization_members("acme");

        let before = query.state();
        assert!(before.is_placeholder);
        assert!(before.data.unwrap().is_empty());

        let mut changes = query.subscribe();
        let in_flight = tokio::spawn({
            let query = query.clone();
            async move { query.fetch().await }
        });
        transport.started.notified().await;

        let pending = query.state();
        assert!(pending.is_loading);
        assert!(pending.is_placeholder);
        assert!(pending.data.unwrap().is_empty());

        transport.release.notify_one();
        let done = in_flight.await.unwrap();
        assert!(changes.has_changed().unwrap());
        assert!(!done.is_placeholder);
        assert_eq!(done.data.unwrap()[0].username, "bob");
        assert_eq!(query.state().data.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn inbox_flag_update_invalidates_list_and_item() {
        let id = Uuid::from_u128(5);
        let item = format!(
            r#"{{"id":"{id}","form_id":"{id}","title":"Survey","is_read":true,"created_at":"2024-01-01T00:00:00Z"}}"#
        );
        let list = format!("[{item}]");
        let transport = StubTransport::new(move |req| match req.method {
            HttpMethod::Get if req.path.ends_with("/inbox") => HttpResponse::new(200, list.clone()),
            _ => HttpResponse::new(200, item.clone()),
        });
        let client = client_with(transport.clone());
        client.inbox().fetch().await;
        client.inbox_item(id).fetch().await;

        let update = UpdateInboxItem { is_read: Some(true), ..Default::default() };
        let updated = client.update_inbox_item(id, &update).execute().await.unwrap();
        assert!(updated.is_read);
        assert_eq!(client.cache().invalidation_count(&QueryKey::Inbox), 1);
        assert_eq!(client.cache().invalidation_count(&QueryKey::InboxItem { id }), 1);
        assert_eq!(transport.calls()[2].method, HttpMethod::Post);
    }

    const UNIT_ID: Uuid = Uuid::from_u128(1);
    const FORM_ID: Uuid = Uuid::from_u128(3);
    const UNIT: &str = r#"{"id":"00000000-0000-0000-0000-000000000001","org_id":"00000000-0000-0000-0000-00000000000a","name":"Kitchen","created_at":"2024-01-01T00:00:00Z","updated_at":"2024-01-01T00:00:00Z"}"#;
    const FORM: &str = r#"{"id":"00000000-0000-0000-0000-000000000003","unit_id":"00000000-0000-0000-0000-000000000001","title":"Lunch","created_at":"2024-01-01T00:00:00Z","updated_at":"2024-01-01T00:00:00Z"}"#;
    const QUESTION: &str = r#"{"id":"00000000-0000-0000-0000-000000000004","form_id":"00000000-0000-0000-0000-000000000003","type":"short_text","order":0,"title":"Name","created_at":"2024-01-01T00:00:00Z","updated_at":"2024-01-01T00:00:00Z"}"#;

    /// Deletes answer 204; everything else answers with the resource its
    /// path names.
    fn crud_stub() -> Arc<StubTransport> {
        StubTransport::new(|req| {
            let path = req.path.as_str();
            match req.method {
                HttpMethod::Delete => HttpResponse::new(204, ""),
                HttpMethod::Get if path.ends_with("/members") => {
                    HttpResponse::new(200, format!("[{MEMBER}]"))
                }
                _ if path.ends_with("/members") => HttpResponse::new(201, MEMBER),
                _ if path.contains("/questions/") => HttpResponse::new(200, QUESTION),
                _ if path.contains("/forms/") => HttpResponse::new(200, FORM),
                _ => HttpResponse::new(200, UNIT),
            }
        })
    }

    fn seed(client: &QueryClient, keys: &[QueryKey]) {
        for key in keys {
            client.cache().set_data(key, ());
        }
    }

    fn org_key(slug: &str) -> QueryKey {
        QueryKey::Organization { slug: slug.to_string() }
    }

    fn unit_members_key(unit_id: Uuid) -> QueryKey {
        QueryKey::UnitMembers { slug: "acme".to_string(), unit_id }
    }

    fn forms_key(unit_id: Uuid) -> QueryKey {
        QueryKey::Forms { slug: "acme".to_string(), unit_id }
    }

    #[tokio::test]
    async fn unit_queries_are_scoped_to_org_and_unit() {
        let transport = crud_stub();
        let client = client_with(transport.clone());

        let unit = client.unit("acme", UNIT_ID);
        assert_eq!(unit.key(), &QueryKey::Unit { slug: "acme".to_string(), unit_id: UNIT_ID });
        assert_eq!(unit.fetch().await.data.unwrap().name, "Kitchen");

        let members = client.unit_members("acme", UNIT_ID);
        assert_eq!(members.key(), &unit_members_key(UNIT_ID));
        assert!(members.state().is_placeholder);
        assert_eq!(members.fetch().await.data.unwrap()[0].username, "bob");

        let calls = transport.calls();
        assert_eq!(calls[0].path, format!("http://api/orgs/acme/units/{UNIT_ID}"));
        assert_eq!(calls[1].path, format!("http://api/orgs/acme/units/{UNIT_ID}/members"));
    }

    #[tokio::test]
    async fn unit_member_changes_invalidate_that_unit_only() {
        let transport = crud_stub();
        let client = client_with(transport.clone());
        let other = Uuid::from_u128(2);
        client.unit_members("acme", UNIT_ID).fetch().await;
        client.unit_members("acme", other).fetch().await;
        seed(&client, &[QueryKey::OrganizationMembers { slug: "acme".to_string() }]);

        let bob = client.add_unit_member("acme", UNIT_ID, "bob@acme.test").execute().await.unwrap();
        assert_eq!(client.cache().invalidation_count(&unit_members_key(UNIT_ID)), 1);

        client.remove_unit_member("acme", UNIT_ID, bob.id).execute().await.unwrap();
        let cache = client.cache();
        assert_eq!(cache.invalidation_count(&unit_members_key(UNIT_ID)), 2);
        assert_eq!(cache.invalidation_count(&unit_members_key(other)), 0);
        assert!(cache.is_fresh(&QueryKey::OrganizationMembers { slug: "acme".to_string() }));

        let delete = transport.calls().pop().unwrap();
        assert_eq!(delete.method, HttpMethod::Delete);
        assert_eq!(delete.path, format!("http://api/orgs/acme/units/{UNIT_ID}/members/{}", bob.id));
    }

    #[tokio::test]
    async fn deleting_organization_invalidates_everything_under_it() {
        let client = client_with(crud_stub());
        let under_acme = [
            QueryKey::Organizations,
            org_key("acme"),
            QueryKey::Units { slug: "acme".to_string() },
            QueryKey::Unit { slug: "acme".to_string(), unit_id: UNIT_ID },
            QueryKey::OrganizationMembers { slug: "acme".to_string() },
            unit_members_key(UNIT_ID),
            forms_key(UNIT_ID),
            QueryKey::Form { form_id: FORM_ID },
            QueryKey::Questions { form_id: FORM_ID },
            QueryKey::Responses { form_id: FORM_ID },
            QueryKey::Inbox,
            QueryKey::InboxItem { id: Uuid::from_u128(5) },
        ];
        let elsewhere = [
            org_key("globex"),
            QueryKey::OrganizationMembers { slug: "globex".to_string() },
            QueryKey::CurrentUser,
        ];
        seed(&client, &under_acme);
        seed(&client, &elsewhere);

        client.delete_organization("acme").execute().await.unwrap();
        let cache = client.cache();
        for key in &under_acme {
            assert_eq!(cache.invalidation_count(key), 1, "{key:?}");
        }
        for key in &elsewhere {
            assert!(cache.is_fresh(key), "{key:?}");
        }
    }

    #[tokio::test]
    async fn deleting_unit_invalidates_its_members_and_forms() {
        let transport = crud_stub();
        let client = client_with(transport.clone());
        let sibling = Uuid::from_u128(2);
        let under_unit = [
            QueryKey::Units { slug: "acme".to_string() },
            QueryKey::Unit { slug: "acme".to_string(), unit_id: UNIT_ID },
            unit_members_key(UNIT_ID),
            forms_key(UNIT_ID),
            QueryKey::Form { form_id: FORM_ID },
            QueryKey::Questions { form_id: FORM_ID },
        ];
        let elsewhere = [
            org_key("acme"),
            QueryKey::OrganizationMembers { slug: "acme".to_string() },
            unit_members_key(sibling),
            forms_key(sibling),
        ];
        seed(&client, &under_unit);
        seed(&client, &elsewhere);

        client.delete_unit("acme", UNIT_ID).execute().await.unwrap();
        let cache = client.cache();
        for key in &under_unit {
            assert_eq!(cache.invalidation_count(key), 1, "{key:?}");
        }
        for key in &elsewhere {
            assert!(cache.is_fresh(key), "{key:?}");
        }
        assert_eq!(transport.calls()[0].path, format!("http://api/orgs/acme/units/{UNIT_ID}"));
    }

    #[tokio::test]
    async fn deleting_form_invalidates_questions_responses_and_inbox() {
        let client = client_with(crud_stub());
        let other_form = Uuid::from_u128(8);
        let touched = [
            QueryKey::Form { form_id: FORM_ID },
            forms_key(UNIT_ID),
            QueryKey::Questions { form_id: FORM_ID },
            QueryKey::Responses { form_id: FORM_ID },
            QueryKey::Inbox,
            QueryKey::InboxItem { id: Uuid::from_u128(5) },
        ];
        let untouched = [
            QueryKey::Form { form_id: other_form },
            QueryKey::Questions { form_id: other_form },
            unit_members_key(UNIT_ID),
        ];
        seed(&client, &touched);
        seed(&client, &untouched);

        client.delete_form(FORM_ID).execute().await.unwrap();
        let cache = client.cache();
        for key in &touched {
            assert_eq!(cache.invalidation_count(key), 1, "{key:?}");
        }
        for key in &untouched {
            assert!(cache.is_fresh(key), "{key:?}");
        }
    }

    #[tokio::test]
    async fn question_edits_invalidate_that_form_questions() {
        let transport = crud_stub();
        let client = client_with(transport.clone());
        let other_form = Uuid::from_u128(8);
        let questions = QueryKey::Questions { form_id: FORM_ID };
        seed(&client, &[questions.clone(), QueryKey::Questions { form_id: other_form }]);
        seed(&client, &[QueryKey::Form { form_id: FORM_ID }]);

        let update = UpdateQuestion { title: Some("Full name".to_string()), ..Default::default() };
        let question_id = Uuid::from_u128(4);
        let updated = client.update_question(FORM_ID, question_id, &update).execute().await.unwrap();
        assert_eq!(updated.id, question_id);
        assert_eq!(client.cache().invalidation_count(&questions), 1);

        client.delete_question(FORM_ID, question_id).execute().await.unwrap();
        let cache = client.cache();
        assert_eq!(cache.invalidation_count(&questions), 2);
        assert!(cache.is_fresh(&QueryKey::Questions { form_id: other_form }));
        assert!(cache.is_fresh(&QueryKey::Form { form_id: FORM_ID }));

        let calls = transport.calls();
        assert_eq!(calls[0].method, HttpMethod::Put);
        assert_eq!(calls[1].method, HttpMethod::Delete);
        assert_eq!(calls[1].path, format!("http://api/forms/{FORM_ID}/questions/{question_id}"));
    }

    #[tokio::test]
    async fn form_update_invalidates_every_unit_listing() {
        let client = client_with(crud_stub());
        let sibling = Uuid::from_u128(2);
        seed(&client, &[forms_key(UNIT_ID), forms_key(sibling), QueryKey::Form { form_id: FORM_ID }]);
        seed(&client, &[QueryKey::Questions { form_id: FORM_ID }]);

        let input = UpdateForm { title: Some("Lunch".to_string()), ..Default::default() };
        let form = client.update_form(FORM_ID, &input).execute().await.unwrap();
        assert_eq!(form.id, FORM_ID);

        let cache = client.cache();
        assert_eq!(cache.invalidation_count(&forms_key(UNIT_ID)), 1);
        assert_eq!(cache.invalidation_count(&forms_key(sibling)), 1);
        assert_eq!(cache.invalidation_count(&QueryKey::Form { form_id: FORM_ID }), 1);
        assert!(cache.is_fresh(&QueryKey::Questions { form_id: FORM_ID }));
    }

    #[tokio::test]
    async fn members_error_replaces_placeholder() {
        let client = client_with(StubTransport::new(|_| HttpResponse::new(500, "boom")));
        let state = client.organization_members("acme").fetch().await;
        assert_eq!(state.error.unwrap().status(), Some(500));
        assert!(state.data.is_none());
        assert!(!state.is_placeholder);
    }
}
