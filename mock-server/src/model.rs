use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type Metadata = HashMap<String, serde_json::Value>;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub slug: String,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct CreateOrganization {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Deserialize)]
pub struct UpdateOrganization {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub metadata: Option<Metadata>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Unit {
    pub id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    pub description: String,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct CreateUnit {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Member {
    pub id: Uuid,
    pub username: String,
    pub name: String,
    pub email: String,
    pub avatar_url: String,
}

#[derive(Deserialize)]
pub struct AddMember {
    pub email: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub name: String,
    pub avatar_url: String,
    pub email: String,
    pub roles: Vec<String>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FormStatus {
    Draft,
    Published,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Form {
    pub id: Uuid,
    pub unit_id: Uuid,
    pub title: String,
    pub description: String,
    pub preview_message: String,
    pub status: FormStatus,
    pub last_editor: Option<Uuid>,
    pub publish_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct CreateForm {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub preview_message: String,
}

#[derive(Deserialize)]
pub struct UpdateForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub preview_message: Option<String>,
}

#[derive(Deserialize)]
pub struct PublishForm {
    pub org_id: Uuid,
    pub unit_ids: Vec<Uuid>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    ShortText,
    LongText,
    SingleChoice,
    MultipleChoice,
    Date,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Choice {
    pub id: Uuid,
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub form_id: Uuid,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub order: u32,
    pub title: String,
    pub description: String,
    pub choices: Vec<Choice>,
    pub required: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct CreateQuestion {
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub order: u32,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub choices: Vec<String>,
    #[serde(default)]
    pub required: bool,
}

#[derive(Deserialize)]
pub struct UpdateQuestion {
    #[serde(rename = "type")]
    pub kind: Option<QuestionType>,
    pub order: Option<u32>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub choices: Option<Vec<String>>,
    pub required: Option<bool>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Answer {
    pub question_id: Uuid,
    pub value: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FormResponse {
    pub id: Uuid,
    pub form_id: Uuid,
    pub submitted_by: Option<Uuid>,
    pub answers: Vec<Answer>,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct SubmitResponse {
    pub answers: Vec<Answer>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InboxEntry {
    pub question: Question,
    pub answer: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InboxItem {
    pub id: Uuid,
    pub form_id: Uuid,
    pub title: String,
    pub org: String,
    pub unit: String,
    pub preview_message: String,
    pub content: Vec<InboxEntry>,
    pub is_read: bool,
    pub is_starred: bool,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct UpdateInboxItem {
    pub is_read: Option<bool>,
    pub is_starred: Option<bool>,
    pub is_archived: Option<bool>,
}

#[derive(Deserialize)]
pub struct LoginParams {
    #[serde(default)]
    pub r: Option<String>,
}
