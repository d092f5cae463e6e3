//! Backend-agnostic operations behind every endpoint.
//!
//! Each action takes `&dyn Repo`, performs its (non-atomic) sequence of store
//! calls and, on failure, logs a tagged message before handing the error back.

use std::collections::{HashMap, HashSet};

use tracing::error;

use crate::error::{missing, ApiError, ApiResult};
use crate::models::*;
use crate::repo::Repo;

pub mod answer;
pub mod interaction;
pub mod question;
pub mod tag;
pub mod user;
pub mod vote;

pub(crate) trait LogErr {
    fn log_err(self, what: &'static str) -> Self;
}

impl<T> LogErr for ApiResult<T> {
    fn log_err(self, what: &'static str) -> Self {
        self.inspect_err(|e| error!(error = %e, "failed to {what}"))
    }
}

/// Resolve the caller's user document from the token subject.
pub async fn current_user(repo: &dyn Repo, clerk_id: &str) -> ApiResult<User> {
    repo.get_user_by_clerk_id(clerk_id).await.map_err(missing("user"))
}

pub(crate) fn ensure_author(author: &str, actor: &User) -> ApiResult<()> {
    if author == actor.id { Ok(()) } else { Err(ApiError::Forbidden) }
}

fn unique_ids<'a>(ids: impl Iterator<Item = &'a Id>) -> Vec<Id> {
    let mut seen = HashSet::new();
    ids.filter(|id| seen.insert(*id)).cloned().collect()
}

async fn authors_by_id(repo: &dyn Repo, ids: Vec<Id>) -> ApiResult<HashMap<Id, AuthorRef>> {
    Ok(repo
        .users_by_ids(&ids)
        .await?
        .iter()
        .map(|u| (u.id.clone(), AuthorRef::from(u)))
        .collect())
}

/// Join tag names and author summaries onto raw questions.
pub(crate) async fn populate_questions(repo: &dyn Repo, questions: Vec<Question>) -> ApiResult<Vec<QuestionView>> {
    let tag_ids = unique_ids(questions.iter().flat_map(|q| q.tags.iter()));
    let tags: HashMap<Id, String> = repo
        .tags_by_ids(&tag_ids)
        .await?
        .into_iter()
        .map(|t| (t.id, t.name))
        .collect();
    let authors = authors_by_id(repo, unique_ids(questions.iter().map(|q| &q.author))).await?;

    Ok(questions
        .into_iter()
        .map(|q| QuestionView {
            tags: q
                .tags
                .iter()
                .filter_map(|id| tags.get(id).map(|name| TagRef { id: id.clone(), name: name.clone() }))
                .collect(),
            author: authors.get(&q.author).cloned(),
            id: q.id,
            title: q.title,
            content: q.content,
            views: q.views,
            up_votes: q.up_votes,
            down_votes: q.down_votes,
            answers: q.answers,
            created_at: q.created_at,
        })
        .collect())
}

pub(crate) async fn populate_question(repo: &dyn Repo, question: Question) -> ApiResult<QuestionView> {
    populate_questions(repo, vec![question]).await?.pop().ok_or(ApiError::Internal)
}

/// Join author summaries and parent question titles onto raw answers.
pub(crate) async fn populate_answers(repo: &dyn Repo, answers: Vec<Answer>) -> ApiResult<Vec<AnswerView>> {
    let authors = authors_by_id(repo, unique_ids(answers.iter().map(|a| &a.author))).await?;
    let question_ids = unique_ids(answers.iter().map(|a| &a.question));
    let titles: HashMap<Id, String> = repo
        .questions_by_ids(&question_ids)
        .await?
        .into_iter()
        .map(|q| (q.id, q.title))
        .collect();

    Ok(answers
        .into_iter()
        .map(|a| AnswerView {
            author: authors.get(&a.author).cloned(),
            question: titles.get(&a.question).map(|title| QuestionRef { id: a.question.clone(), title: title.clone() }),
            id: a.id,
            content: a.content,
            up_votes: a.up_votes,
            down_votes: a.down_votes,
            created_at: a.created_at,
        })
        .collect())
}

pub(crate) async fn populate_answer(repo: &dyn Repo, answer: Answer) -> ApiResult<AnswerView> {
    populate_answers(repo, vec![answer]).await?.pop().ok_or(ApiError::Internal)
}
