use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

// ObjectId-shaped hex strings in both stores
pub type Id = String;

// ---------------- Documents ----------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Id,
    /// External identity-provider id.
    pub clerk_id: String,
    pub name: String,
    pub username: String,
    pub email: String,
    pub picture: String,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub portfolio_website: Option<String>,
    #[serde(default)]
    pub reputation: i64,
    #[serde(default)]
    pub saved: Vec<Id>,
    #[serde(default)]
    pub onboarded: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    #[schema(value_type = i64)]
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewUser {
    pub clerk_id: String,
    pub name: String,
    pub username: String,
    pub email: String,
    pub picture: String,
}

/// Partial update; `None` leaves the stored field untouched.
/// For the optional profile fields `Some(None)` clears the stored value.
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub picture: Option<String>,
    pub bio: Option<Option<String>>,
    pub location: Option<Option<String>>,
    pub portfolio_website: Option<Option<String>>,
    pub onboarded: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Question {
    #[serde(rename = "_id")]
    pub id: Id,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<Id>,
    #[serde(default)]
    pub views: i64,
    #[serde(default)]
    pub up_votes: Vec<Id>,
    #[serde(default)]
    pub down_votes: Vec<Id>,
    pub author: Id,
    #[serde(default)]
    pub answers: Vec<Id>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    #[schema(value_type = i64)]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQuestion {
    pub title: String,
    pub content: String,
    pub author: Id,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Answer {
    #[serde(rename = "_id")]
    pub id: Id,
    pub content: String,
    pub author: Id,
    pub question: Id,
    #[serde(default)]
    pub up_votes: Vec<Id>,
    #[serde(default)]
    pub down_votes: Vec<Id>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    #[schema(value_type = i64)]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAnswer {
    pub content: String,
    pub author: Id,
    pub question: Id,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Tag {
    #[serde(rename = "_id")]
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub questions: Vec<Id>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    #[schema(value_type = i64)]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    AskQuestion,
    Answer,
    View,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Interaction {
    #[serde(rename = "_id")]
    pub id: Id,
    pub user: Id,
    pub action: InteractionKind,
    pub question: Option<Id>,
    pub answer: Option<Id>,
    #[serde(default)]
    pub tags: Vec<Id>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    #[schema(value_type = i64)]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInteraction {
    pub user: Id,
    pub action: InteractionKind,
    pub question: Option<Id>,
    pub answer: Option<Id>,
    pub tags: Vec<Id>,
}

// ---------------- Votes --------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteDirection {
    Up,
    Down,
}

/// Set operations applied to a document's vote sets in one update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoteChange {
    pub pull_up: bool,
    pub pull_down: bool,
    pub add_up: bool,
    pub add_down: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VoteSummary {
    pub upvotes: usize,
    pub downvotes: usize,
    pub has_upvoted: bool,
    pub has_downvoted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SaveState {
    pub saved: bool,
}

// ---------------- Form payloads ------------------------------------

fn validate_tag_names(tags: &[String]) -> Result<(), ValidationError> {
    for tag in tags {
        let len = tag.trim().chars().count();
        if len == 0 || len > 15 {
            return Err(ValidationError::new("tag_length"));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct QuestionForm {
    #[validate(length(min = 5, max = 130))]
    pub title: String,
    #[validate(length(min = 100))]
    pub content: String,
    #[validate(length(min = 1, max = 3), custom(function = "validate_tag_names"))]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct EditQuestionForm {
    #[validate(length(min = 5, max = 130))]
    pub title: String,
    #[validate(length(min = 100))]
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct AnswerForm {
    #[validate(length(min = 100))]
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ProfileForm {
    #[validate(length(min = 5, max = 50))]
    pub name: String,
    #[validate(length(min = 5, max = 50))]
    pub username: String,
    #[validate(length(min = 10, max = 150))]
    pub bio: Option<String>,
    #[validate(url)]
    pub portfolio_website: Option<String>,
    #[validate(length(min = 5, max = 50))]
    pub location: Option<String>,
    pub onboarded: Option<bool>,
}

impl ProfileForm {
    /// Blank optional inputs count as absent.
    pub fn normalized(mut self) -> Self {
        fn blank_to_none(v: Option<String>) -> Option<String> {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        }
        self.bio = blank_to_none(self.bio);
        self.portfolio_website = blank_to_none(self.portfolio_website);
        self.location = blank_to_none(self.location);
        self
    }
}

impl From<ProfileForm> for UpdateUser {
    fn from(f: ProfileForm) -> Self {
        UpdateUser {
            name: Some(f.name),
            username: Some(f.username),
            // a submitted profile replaces these, so blanks clear them
            bio: Some(f.bio),
            location: Some(f.location),
            portfolio_website: Some(f.portfolio_website),
            onboarded: f.onboarded,
            ..Default::default()
        }
    }
}

// ---------------- Populated views ----------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TagRef {
    #[serde(rename = "_id")]
    pub id: Id,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthorRef {
    #[serde(rename = "_id")]
    pub id: Id,
    pub clerk_id: String,
    pub name: String,
    pub picture: String,
}

impl From<&User> for AuthorRef {
    fn from(u: &User) -> Self {
        AuthorRef { id: u.id.clone(), clerk_id: u.clerk_id.clone(), name: u.name.clone(), picture: u.picture.clone() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuestionRef {
    #[serde(rename = "_id")]
    pub id: Id,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuestionView {
    #[serde(rename = "_id")]
    pub id: Id,
    pub title: String,
    pub content: String,
    pub tags: Vec<TagRef>,
    pub views: i64,
    pub up_votes: Vec<Id>,
    pub down_votes: Vec<Id>,
    pub author: Option<AuthorRef>,
    pub answers: Vec<Id>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    #[schema(value_type = i64)]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnswerView {
    #[serde(rename = "_id")]
    pub id: Id,
    pub content: String,
    pub author: Option<AuthorRef>,
    pub question: Option<QuestionRef>,
    pub up_votes: Vec<Id>,
    pub down_votes: Vec<Id>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    #[schema(value_type = i64)]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ViewerState {
    pub has_upvoted: bool,
    pub has_downvoted: bool,
    pub has_saved: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuestionDetail {
    pub question: QuestionView,
    pub viewer: Option<ViewerState>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PopularTag {
    #[serde(rename = "_id")]
    pub id: Id,
    pub name: String,
    pub question_count: u64,
}

// ---------------- List payloads ------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuestionList {
    pub questions: Vec<QuestionView>,
    pub is_next: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnswerList {
    pub answers: Vec<AnswerView>,
    pub is_next: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TagList {
    pub tags: Vec<Tag>,
    pub is_next: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserList {
    pub users: Vec<User>,
    pub is_next: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TagQuestions {
    pub tag_title: String,
    pub questions: Vec<QuestionView>,
    pub is_next: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserQuestions {
    pub total_questions: u64,
    pub questions: Vec<QuestionView>,
    pub is_next: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserAnswers {
    pub total_answers: u64,
    pub answers: Vec<AnswerView>,
    pub is_next: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserInfo {
    pub user: User,
    pub total_questions: u64,
    pub total_answers: u64,
}

// ---------------- Filter switches (query params) -------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum HomeFilter {
    Newest,
    Frequent,
    Unanswered,
    Recommended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CollectionFilter {
    MostRecent,
    Oldest,
    MostVoted,
    MostViewed,
    MostAnswered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnswerFilter {
    HighestUpvotes,
    LowestUpvotes,
    Recent,
    Old,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TagFilter {
    Popular,
    Recent,
    Name,
    Old,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UserFilter {
    NewUsers,
    OldUsers,
    TopContributors,
}
