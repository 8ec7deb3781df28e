use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Redirect,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::Utc;
use tokio::{net::TcpListener, sync::RwLock};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

pub mod model;

pub use model::*;

/// Fixed id of the signed-in user every request acts as.
pub const CURRENT_USER_ID: Uuid = Uuid::from_u128(1);

pub struct Store {
    pub user: User,
    pub orgs: HashMap<Uuid, Organization>,
    pub units: HashMap<Uuid, Unit>,
    pub org_members: HashMap<Uuid, Vec<Member>>,
    pub unit_members: HashMap<Uuid, Vec<Member>>,
    pub forms: HashMap<Uuid, Form>,
    pub questions: HashMap<Uuid, Vec<Question>>,
    pub responses: HashMap<Uuid, Vec<FormResponse>>,
    pub inbox: Vec<InboxItem>,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            user: User {
                id: CURRENT_USER_ID,
                username: "ada".to_string(),
                name: "Ada Lovelace".to_string(),
                avatar_url: String::new(),
                email: "ada@example.com".to_string(),
                roles: vec!["admin".to_string()],
            },
            orgs: HashMap::new(),
            units: HashMap::new(),
            org_members: HashMap::new(),
            unit_members: HashMap::new(),
            forms: HashMap::new(),
            questions: HashMap::new(),
            responses: HashMap::new(),
            inbox: Vec::new(),
        }
    }
}

impl Store {
    fn org_by_slug(&self, slug: &str) -> Result<&Organization, Failure> {
        self.orgs
            .values()
            .find(|o| o.slug == slug)
            .ok_or_else(|| not_found("organization"))
    }

    fn unit_in_org(&self, slug: &str, unit_id: Uuid) -> Result<&Unit, Failure> {
        let org_id = self.org_by_slug(slug)?.id;
        self.units
            .get(&unit_id)
            .filter(|u| u.org_id == org_id)
            .ok_or_else(|| not_found("unit"))
    }

    /// Drop a form with its questions, responses and inbox deliveries.
    fn remove_form(&mut self, form_id: Uuid) -> Option<Form> {
        let form = self.forms.remove(&form_id)?;
        self.questions.remove(&form_id);
        self.responses.remove(&form_id);
        self.inbox.retain(|item| item.form_id != form_id);
        Some(form)
    }

    /// Drop a unit with its members and forms.
    fn remove_unit(&mut self, unit_id: Uuid) {
        self.units.remove(&unit_id);
        self.unit_members.remove(&unit_id);
        let forms: Vec<Uuid> = self
            .forms
            .values()
            .filter(|f| f.unit_id == unit_id)
            .map(|f| f.id)
            .collect();
        for form_id in forms {
            self.remove_form(form_id);
        }
    }
}

pub type Db = Arc<RwLock<Store>>;

type Failure = (StatusCode, String);
type HandlerResult<T> = Result<T, Failure>;

fn not_found(what: &str) -> Failure {
    (StatusCode::NOT_FOUND, format!("{what} not found"))
}

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    Router::new()
        .route("/orgs", get(list_orgs).post(create_org))
        .route("/orgs/{slug}", get(get_org).put(update_org).delete(delete_org))
        .route("/orgs/{slug}/units", get(list_units).post(create_unit))
        .route("/orgs/{slug}/units/{unit_id}", get(get_unit).delete(delete_unit))
        .route("/orgs/{slug}/members", get(list_org_members).post(add_org_member))
        .route("/orgs/{slug}/members/{member_id}", delete(remove_org_member))
        .route(
            "/orgs/{slug}/units/{unit_id}/members",
            get(list_unit_members).post(add_unit_member),
        )
        .route(
            "/orgs/{slug}/units/{unit_id}/members/{member_id}",
            delete(remove_unit_member),
        )
        .route("/orgs/{slug}/units/{unit_id}/forms", get(list_forms).post(create_form))
        .route("/forms/{id}", get(get_form).put(update_form).delete(delete_form))
        .route("/forms/{id}/publish", post(publish_form))
        .route("/forms/{id}/questions", get(list_questions).post(create_question))
        .route(
            "/forms/{id}/questions/{question_id}",
            put(update_question).delete(delete_question),
        )
        .route("/forms/{id}/responses", get(list_responses).post(submit_response))
        .route("/inbox", get(list_inbox))
        .route("/inbox/{id}", get(get_inbox_item).post(update_inbox_item))
        .route("/users/me", get(current_user))
        .route("/auth/login/{provider}", get(login))
        .route("/auth/logout", post(logout))
        .layer(TraceLayer::new_for_http())
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

// --- organizations ---

async fn list_orgs(State(db): State<Db>) -> Json<Vec<Organization>> {
    let store = db.read().await;
    let mut orgs: Vec<_> = store.orgs.values().cloned().collect();
    orgs.sort_by(|a, b| a.slug.cmp(&b.slug));
    Json(orgs)
}

async fn create_org(
    State(db): State<Db>,
    Json(input): Json<CreateOrganization>,
) -> HandlerResult<(StatusCode, Json<Organization>)> {
    let mut store = db.write().await;
    if store.orgs.values().any(|o| o.slug == input.slug) {
        return Err((StatusCode::CONFLICT, format!("slug {} already taken", input.slug)));
    }
    let now = Utc::now();
    let org = Organization {
        id: Uuid::new_v4(),
        name: input.name,
        description: input.description,
        slug: input.slug,
        metadata: input.metadata,
        created_at: now,
        updated_at: now,
    };
    store.orgs.insert(org.id, org.clone());
    tracing::info!(slug = %org.slug, "organization created");
    Ok((StatusCode::CREATED, Json(org)))
}

async fn get_org(State(db): State<Db>, Path(slug): Path<String>) -> HandlerResult<Json<Organization>> {
    let store = db.read().await;
    store.org_by_slug(&slug).cloned().map(Json)
}

async fn update_org(
    State(db): State<Db>,
    Path(slug): Path<String>,
    Json(input): Json<UpdateOrganization>,
) -> HandlerResult<Json<Organization>> {
    let mut store = db.write().await;
    let id = store.org_by_slug(&slug)?.id;
    if let Some(new_slug) = &input.slug {
        if *new_slug != slug && store.orgs.values().any(|o| o.slug == *new_slug) {
            return Err((StatusCode::CONFLICT, format!("slug {new_slug} already taken")));
        }
    }
    let org = store.orgs.get_mut(&id).ok_or_else(|| not_found("organization"))?;
    if let Some(name) = input.name {
        org.name = name;
    }
    if let Some(slug) = input.slug {
        org.slug = slug;
    }
    if let Some(description) = input.description {
        org.description = description;
    }
    if let Some(metadata) = input.metadata {
        org.metadata = metadata;
    }
    org.updated_at = Utc::now();
    Ok(Json(org.clone()))
}

async fn delete_org(State(db): State<Db>, Path(slug): Path<String>) -> HandlerResult<StatusCode> {
    let mut store = db.write().await;
    let id = store.org_by_slug(&slug)?.id;
    store.orgs.remove(&id);
    store.org_members.remove(&id);
    let units: Vec<Uuid> = store.units.values().filter(|u| u.org_id == id).map(|u| u.id).collect();
    for unit_id in units {
        store.remove_unit(unit_id);
    }
    Ok(StatusCode::NO_CONTENT)
}

// --- units ---

async fn list_units(State(db): State<Db>, Path(slug): Path<String>) -> HandlerResult<Json<Vec<Unit>>> {
    let store = db.read().await;
    let org_id = store.org_by_slug(&slug)?.id;
    let mut units: Vec<_> = store.units.values().filter(|u| u.org_id == org_id).cloned().collect();
    units.sort_by_key(|u| u.created_at);
    Ok(Json(units))
}

async fn create_unit(
    State(db): State<Db>,
    Path(slug): Path<String>,
    Json(input): Json<CreateUnit>,
) -> HandlerResult<(StatusCode, Json<Unit>)> {
    let mut store = db.write().await;
    let org_id = store.org_by_slug(&slug)?.id;
    let now = Utc::now();
    let unit = Unit {
        id: Uuid::new_v4(),
        org_id,
        name: input.name,
        description: input.description,
        metadata: input.metadata,
        created_at: now,
        updated_at: now,
    };
    store.units.insert(unit.id, unit.clone());
    Ok((StatusCode::CREATED, Json(unit)))
}

async fn get_unit(
    State(db): State<Db>,
    Path((slug, unit_id)): Path<(String, Uuid)>,
) -> HandlerResult<Json<Unit>> {
    let store = db.read().await;
    store.unit_in_org(&slug, unit_id).cloned().map(Json)
}

async fn delete_unit(
    State(db): State<Db>,
    Path((slug, unit_id)): Path<(String, Uuid)>,
) -> HandlerResult<StatusCode> {
    let mut store = db.write().await;
    store.unit_in_org(&slug, unit_id)?;
    store.remove_unit(unit_id);
    Ok(StatusCode::NO_CONTENT)
}

// --- members ---

fn new_member(email: String) -> Member {
    let username = email.split('@').next().unwrap_or_default().to_string();
    Member {
        id: Uuid::new_v4(),
        name: username.clone(),
        username,
        email,
        avatar_url: String::new(),
    }
}

fn add_member_to(members: &mut Vec<Member>, email: String) -> HandlerResult<Member> {
    if members.iter().any(|m| m.email == email) {
        return Err((StatusCode::CONFLICT, format!("{email} is already a member")));
    }
    let member = new_member(email);
    members.push(member.clone());
    Ok(member)
}

fn remove_member_from(members: Option<&mut Vec<Member>>, member_id: Uuid) -> HandlerResult<StatusCode> {
    let members = members.ok_or_else(|| not_found("member"))?;
    let before = members.len();
    members.retain(|m| m.id != member_id);
    if members.len() == before {
        return Err(not_found("member"));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn list_org_members(
    State(db): State<Db>,
    Path(slug): Path<String>,
) -> HandlerResult<Json<Vec<Member>>> {
    let store = db.read().await;
    let org_id = store.org_by_slug(&slug)?.id;
    Ok(Json(store.org_members.get(&org_id).cloned().unwrap_or_default()))
}

async fn add_org_member(
    State(db): State<Db>,
    Path(slug): Path<String>,
    Json(input): Json<AddMember>,
) -> HandlerResult<(StatusCode, Json<Member>)> {
    let mut store = db.write().await;
    let org_id = store.org_by_slug(&slug)?.id;
    let member = add_member_to(store.org_members.entry(org_id).or_default(), input.email)?;
    Ok((StatusCode::CREATED, Json(member)))
}

async fn remove_org_member(
    State(db): State<Db>,
    Path((slug, member_id)): Path<(String, Uuid)>,
) -> HandlerResult<StatusCode> {
    let mut store = db.write().await;
    let org_id = store.org_by_slug(&slug)?.id;
    remove_member_from(store.org_members.get_mut(&org_id), member_id)
}

async fn list_unit_members(
    State(db): State<Db>,
    Path((slug, unit_id)): Path<(String, Uuid)>,
) -> HandlerResult<Json<Vec<Member>>> {
    let store = db.read().await;
    store.unit_in_org(&slug, unit_id)?;
    Ok(Json(store.unit_members.get(&unit_id).cloned().unwrap_or_default()))
}

async fn add_unit_member(
    State(db): State<Db>,
    Path((slug, unit_id)): Path<(String, Uuid)>,
    Json(input): Json<AddMember>,
) -> HandlerResult<(StatusCode, Json<Member>)> {
    let mut store = db.write().await;
    store.unit_in_org(&slug, unit_id)?;
    let member = add_member_to(store.unit_members.entry(unit_id).or_default(), input.email)?;
    Ok((StatusCode::CREATED, Json(member)))
}

async fn remove_unit_member(
    State(db): State<Db>,
    Path((slug, unit_id, member_id)): Path<(String, Uuid, Uuid)>,
) -> HandlerResult<StatusCode> {
    let mut store = db.write().await;
    store.unit_in_org(&slug, unit_id)?;
    remove_member_from(store.unit_members.get_mut(&unit_id), member_id)
}

// --- forms ---

async fn list_forms(
    State(db): State<Db>,
    Path((slug, unit_id)): Path<(String, Uuid)>,
) -> HandlerResult<Json<Vec<Form>>> {
    let store = db.read().await;
    store.unit_in_org(&slug, unit_id)?;
    let mut forms: Vec<_> = store.forms.values().filter(|f| f.unit_id == unit_id).cloned().collect();
    forms.sort_by_key(|f| f.created_at);
    Ok(Json(forms))
}

async fn create_form(
    State(db): State<Db>,
    Path((slug, unit_id)): Path<(String, Uuid)>,
    Json(input): Json<CreateForm>,
) -> HandlerResult<(StatusCode, Json<Form>)> {
    let mut store = db.write().await;
    store.unit_in_org(&slug, unit_id)?;
    let now = Utc::now();
    let form = Form {
        id: Uuid::new_v4(),
        unit_id,
        title: input.title,
        description: input.description,
        preview_message: input.preview_message,
        status: FormStatus::Draft,
        last_editor: Some(store.user.id),
        publish_time: None,
        created_at: now,
        updated_at: now,
    };
    store.forms.insert(form.id, form.clone());
    Ok((StatusCode::CREATED, Json(form)))
}

async fn get_form(State(db): State<Db>, Path(id): Path<Uuid>) -> HandlerResult<Json<Form>> {
    let store = db.read().await;
    store.forms.get(&id).cloned().map(Json).ok_or_else(|| not_found("form"))
}

async fn update_form(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateForm>,
) -> HandlerResult<Json<Form>> {
    let mut store = db.write().await;
    let editor = store.user.id;
    let form = store.forms.get_mut(&id).ok_or_else(|| not_found("form"))?;
    if let Some(title) = input.title {
        form.title = title;
    }
    if let Some(description) = input.description {
        form.description = description;
    }
    if let Some(preview_message) = input.preview_message {
        form.preview_message = preview_message;
    }
    form.last_editor = Some(editor);
    form.updated_at = Utc::now();
    Ok(Json(form.clone()))
}

async fn delete_form(State(db): State<Db>, Path(id): Path<Uuid>) -> HandlerResult<StatusCode> {
    let mut store = db.write().await;
    store.remove_form(id).ok_or_else(|| not_found("form"))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Publishing delivers the form to the signed-in user's inbox.
async fn publish_form(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
    Json(input): Json<PublishForm>,
) -> HandlerResult<Json<Form>> {
    let mut store = db.write().await;
    let org_name = store
        .orgs
        .get(&input.org_id)
        .map(|o| o.name.clone())
        .ok_or_else(|| not_found("organization"))?;
    let mut unit_names = Vec::with_capacity(input.unit_ids.len());
    for unit_id in &input.unit_ids {
        let unit = store
            .units
            .get(unit_id)
            .filter(|u| u.org_id == input.org_id)
            .ok_or_else(|| not_found("unit"))?;
        unit_names.push(unit.name.clone());
    }
    let content = store
        .questions
        .get(&id)
        .map(|qs| {
            qs.iter()
                .map(|q| InboxEntry { question: q.clone(), answer: None })
                .collect()
        })
        .unwrap_or_default();

    let now = Utc::now();
    let form = store.forms.get_mut(&id).ok_or_else(|| not_found("form"))?;
    form.status = FormStatus::Published;
    form.publish_time = Some(now);
    form.updated_at = now;
    let form = form.clone();

    store.inbox.push(InboxItem {
        id: Uuid::new_v4(),
        form_id: form.id,
        title: form.title.clone(),
        org: org_name,
        unit: unit_names.join(", "),
        preview_message: form.preview_message.clone(),
        content,
        is_read: false,
        is_starred: false,
        is_archived: false,
        created_at: now,
    });
    tracing::info!(form = %form.id, units = input.unit_ids.len(), "form published");
    Ok(Json(form))
}

// --- questions ---

fn choices_from(labels: Vec<String>) -> Vec<Choice> {
    labels
        .into_iter()
        .map(|name| Choice { id: Uuid::new_v4(), name })
        .collect()
}

async fn list_questions(State(db): State<Db>, Path(id): Path<Uuid>) -> HandlerResult<Json<Vec<Question>>> {
    let store = db.read().await;
    if !store.forms.contains_key(&id) {
        return Err(not_found("form"));
    }
    let mut questions = store.questions.get(&id).cloned().unwrap_or_default();
    questions.sort_by_key(|q| q.order);
    Ok(Json(questions))
}

async fn create_question(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
    Json(input): Json<CreateQuestion>,
) -> HandlerResult<(StatusCode, Json<Question>)> {
    let mut store = db.write().await;
    if !store.forms.contains_key(&id) {
        return Err(not_found("form"));
    }
    let now = Utc::now();
    let question = Question {
        id: Uuid::new_v4(),
        form_id: id,
        kind: input.kind,
        order: input.order,
        title: input.title,
        description: input.description,
        choices: choices_from(input.choices),
        required: input.required,
        created_at: now,
        updated_at: now,
    };
    store.questions.entry(id).or_default().push(question.clone());
    Ok((StatusCode::CREATED, Json(question)))
}

async fn update_question(
    State(db): State<Db>,
    Path((id, question_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<UpdateQuestion>,
) -> HandlerResult<Json<Question>> {
    let mut store = db.write().await;
    let question = store
        .questions
        .get_mut(&id)
        .and_then(|qs| qs.iter_mut().find(|q| q.id == question_id))
        .ok_or_else(|| not_found("question"))?;
    if let Some(kind) = input.kind {
        question.kind = kind;
    }
    if let Some(order) = input.order {
        question.order = order;
    }
    if let Some(title) = input.title {
        question.title = title;
    }
    if let Some(description) = input.description {
        question.description = description;
    }
    if let Some(choices) = input.choices {
        question.choices = choices_from(choices);
    }
    if let Some(required) = input.required {
        question.required = required;
    }
    question.updated_at = Utc::now();
    Ok(Json(question.clone()))
}

async fn delete_question(
    State(db): State<Db>,
    Path((id, question_id)): Path<(Uuid, Uuid)>,
) -> HandlerResult<StatusCode> {
    let mut store = db.write().await;
    let questions = store.questions.get_mut(&id).ok_or_else(|| not_found("question"))?;
    let before = questions.len();
    questions.retain(|q| q.id != question_id);
    if questions.len() == before {
        return Err(not_found("question"));
    }
    Ok(StatusCode::NO_CONTENT)
}

// --- responses ---

async fn list_responses(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
) -> HandlerResult<Json<Vec<FormResponse>>> {
    let store = db.read().await;
    if !store.forms.contains_key(&id) {
        return Err(not_found("form"));
    }
    Ok(Json(store.responses.get(&id).cloned().unwrap_or_default()))
}

/// Stores the response and copies the answers into the matching inbox
/// items.
async fn submit_response(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
    Json(input): Json<SubmitResponse>,
) -> HandlerResult<(StatusCode, Json<FormResponse>)> {
    let mut store = db.write().await;
    if !store.forms.contains_key(&id) {
        return Err(not_found("form"));
    }
    let response = FormResponse {
        id: Uuid::new_v4(),
        form_id: id,
        submitted_by: Some(store.user.id),
        answers: input.answers,
        created_at: Utc::now(),
    };
    for item in store.inbox.iter_mut().filter(|i| i.form_id == id) {
        for entry in &mut item.content {
            if let Some(answer) = response.answers.iter().find(|a| a.question_id == entry.question.id) {
                entry.answer = Some(answer.value.clone());
            }
        }
    }
    store.responses.entry(id).or_default().push(response.clone());
    Ok((StatusCode::CREATED, Json(response)))
}

// --- inbox ---

async fn list_inbox(State(db): State<Db>) -> Json<Vec<InboxItem>> {
    let store = db.read().await;
    Json(store.inbox.iter().rev().cloned().collect())
}

async fn get_inbox_item(State(db): State<Db>, Path(id): Path<Uuid>) -> HandlerResult<Json<InboxItem>> {
    let store = db.read().await;
    store
        .inbox
        .iter()
        .find(|i| i.id == id)
        .cloned()
        .map(Json)
        .ok_or_else(|| not_found("inbox item"))
}

async fn update_inbox_item(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateInboxItem>,
) -> HandlerResult<Json<InboxItem>> {
    let mut store = db.write().await;
    let item = store
        .inbox
        .iter_mut()
        .find(|i| i.id == id)
        .ok_or_else(|| not_found("inbox item"))?;
    if let Some(is_read) = input.is_read {
        item.is_read = is_read;
    }
    if let Some(is_starred) = input.is_starred {
        item.is_starred = is_starred;
    }
    if let Some(is_archived) = input.is_archived {
        item.is_archived = is_archived;
    }
    Ok(Json(item.clone()))
}

// --- user and auth ---

async fn current_user(State(db): State<Db>) -> Json<User> {
    Json(db.read().await.user.clone())
}

/// There is no real identity provider; sign-in bounces straight back.
async fn login(Path(provider): Path<String>, Query(params): Query<LoginParams>) -> Redirect {
    tracing::info!(%provider, "login");
    Redirect::to(params.r.as_deref().unwrap_or("/"))
}

async fn logout() -> StatusCode {
    StatusCode::NO_CONTENT
}
