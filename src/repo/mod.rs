use async_trait::async_trait;
use regex::{Regex, RegexBuilder};

use crate::models::*;

#[cfg(feature = "inmem-store")]
pub mod inmem;
#[cfg(feature = "mongo-store")]
pub mod mongo;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")] NotFound,
    #[error("conflict")] Conflict,
    #[error("internal: {0}")] Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

// ---------------- Pagination ---------------------------------------

pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const MAX_PAGE_SIZE: u64 = 50;

/// 1-based offset pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub page_size: u64,
}

impl PageRequest {
    pub fn new(page: Option<u64>, page_size: Option<u64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            page_size: page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Saturates for absurd page numbers; such pages are simply empty.
    pub fn skip(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self { Self::new(None, None) }
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub is_next: bool,
}

impl<T> Page<T> {
    /// `total` counts every match, not just the returned window.
    pub fn new(items: Vec<T>, total: u64, req: &PageRequest) -> Self {
        let is_next = total > req.skip().saturating_add(items.len() as u64);
        Self { items, total, is_next }
    }

    /// Cut the requested window out of an already filtered and sorted list.
    pub fn slice(all: Vec<T>, req: &PageRequest) -> Self {
        let total = all.len() as u64;
        let items: Vec<T> = all
            .into_iter()
            .skip(usize::try_from(req.skip()).unwrap_or(usize::MAX))
            .take(req.page_size as usize)
            .collect();
        Self::new(items, total, req)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page { items: self.items.into_iter().map(f).collect(), total: self.total, is_next: self.is_next }
    }
}

// ---------------- Search -------------------------------------------

/// Escaped pattern for a literal, case-insensitive substring search.
/// Blank input means "no search".
pub fn search_pattern(text: Option<&str>) -> Option<String> {
    let text = text?.trim();
    if text.is_empty() { None } else { Some(regex::escape(text)) }
}

pub(crate) fn search_matcher(text: Option<&str>) -> RepoResult<Option<Regex>> {
    search_pattern(text)
        .map(|p| {
            RegexBuilder::new(&p)
                .case_insensitive(true)
                .build()
                .map_err(|e| RepoError::Internal(e.to_string()))
        })
        .transpose()
}

// ---------------- Queries ------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QuestionSort {
    #[default]
    Newest,
    Oldest,
    MostViewed,
    MostVoted,
    MostAnswered,
    /// views desc, then upvote count desc
    Popular,
}

#[derive(Debug, Clone, Default)]
pub struct QuestionQuery {
    pub search: Option<String>,
    /// Search the body as well as the title.
    pub search_content: bool,
    pub author: Option<Id>,
    /// Restrict to this id set (saved collection, tag page).
    pub ids: Option<Vec<Id>>,
    pub unanswered_only: bool,
    pub sort: QuestionSort,
    pub page: PageRequest,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AnswerSort {
    HighestUpvotes,
    LowestUpvotes,
    #[default]
    Recent,
    Old,
}

#[derive(Debug, Clone, Default)]
pub struct AnswerQuery {
    pub question: Option<Id>,
    pub author: Option<Id>,
    pub sort: AnswerSort,
    pub page: PageRequest,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TagSort {
    #[default]
    Unsorted,
    Popular,
    Recent,
    Name,
    Old,
}

#[derive(Debug, Clone, Default)]
pub struct TagQuery {
    pub search: Option<String>,
    pub sort: TagSort,
    pub page: PageRequest,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UserSort {
    #[default]
    Unsorted,
    NewUsers,
    OldUsers,
    TopContributors,
}

#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    pub search: Option<String>,
    pub sort: UserSort,
    pub page: PageRequest,
}

// ---------------- Store traits -------------------------------------

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn create_user(&self, new: NewUser) -> RepoResult<User>;
    async fn get_user(&self, id: &str) -> RepoResult<User>;
    async fn get_user_by_clerk_id(&self, clerk_id: &str) -> RepoResult<User>;
    async fn users_by_ids(&self, ids: &[Id]) -> RepoResult<Vec<User>>;
    async fn update_user(&self, clerk_id: &str, upd: UpdateUser) -> RepoResult<User>;
    async fn delete_user(&self, id: &str) -> RepoResult<User>;
    async fn list_users(&self, q: &UserQuery) -> RepoResult<Page<User>>;
    async fn adjust_reputation(&self, id: &str, delta: i64) -> RepoResult<()>;
    async fn set_saved(&self, user_id: &str, question_id: &str, saved: bool) -> RepoResult<()>;
    async fn pull_saved_everywhere(&self, question_id: &str) -> RepoResult<()>;
}

#[async_trait]
pub trait QuestionRepo: Send + Sync {
    async fn insert_question(&self, new: NewQuestion) -> RepoResult<Question>;
    async fn get_question(&self, id: &str) -> RepoResult<Question>;
    async fn questions_by_ids(&self, ids: &[Id]) -> RepoResult<Vec<Question>>;
    async fn question_ids_by_author(&self, author: &str) -> RepoResult<Vec<Id>>;
    async fn update_question_content(&self, id: &str, title: String, content: String) -> RepoResult<Question>;
    async fn delete_question(&self, id: &str) -> RepoResult<Question>;
    async fn push_question_tags(&self, id: &str, tags: &[Id]) -> RepoResult<()>;
    async fn push_answer(&self, question_id: &str, answer_id: &str) -> RepoResult<()>;
    async fn pull_answer(&self, question_id: &str, answer_id: &str) -> RepoResult<()>;
    async fn increment_views(&self, id: &str) -> RepoResult<()>;
    async fn list_questions(&self, q: &QuestionQuery) -> RepoResult<Page<Question>>;
    async fn count_questions(&self, author: &str) -> RepoResult<u64>;
    async fn vote_question(&self, id: &str, user: &str, change: VoteChange) -> RepoResult<Question>;
    /// (tag id, number of the author's questions carrying it), most used first.
    async fn top_tags_for_author(&self, author: &str, limit: usize) -> RepoResult<Vec<(Id, u64)>>;
}

#[async_trait]
pub trait AnswerRepo: Send + Sync {
    async fn insert_answer(&self, new: NewAnswer) -> RepoResult<Answer>;
    async fn get_answer(&self, id: &str) -> RepoResult<Answer>;
    async fn update_answer_content(&self, id: &str, content: String) -> RepoResult<Answer>;
    async fn delete_answer(&self, id: &str) -> RepoResult<Answer>;
    async fn delete_answers_for_question(&self, question_id: &str) -> RepoResult<u64>;
    /// Returns the removed documents so callers can unlink them.
    async fn delete_answers_by_author(&self, author: &str) -> RepoResult<Vec<Answer>>;
    async fn list_answers(&self, q: &AnswerQuery) -> RepoResult<Page<Answer>>;
    async fn count_answers(&self, author: &str) -> RepoResult<u64>;
    async fn vote_answer(&self, id: &str, user: &str, change: VoteChange) -> RepoResult<Answer>;
}

#[async_trait]
pub trait TagRepo: Send + Sync {
    /// Find-or-create by case-insensitive name and link `question_id`.
    /// The flag is true when the tag was created by this call.
    async fn upsert_tag(&self, name: &str, question_id: &str) -> RepoResult<(Tag, bool)>;
    async fn get_tag(&self, id: &str) -> RepoResult<Tag>;
    async fn tags_by_ids(&self, ids: &[Id]) -> RepoResult<Vec<Tag>>;
    async fn list_tags(&self, q: &TagQuery) -> RepoResult<Page<Tag>>;
    async fn pull_question_from_tags(&self, question_id: &str) -> RepoResult<()>;
    async fn popular_tags(&self, limit: usize) -> RepoResult<Vec<PopularTag>>;
}

#[async_trait]
pub trait InteractionRepo: Send + Sync {
    async fn insert_interaction(&self, new: NewInteraction) -> RepoResult<Interaction>;
    async fn interaction_exists(&self, user: &str, action: InteractionKind, question: &str) -> RepoResult<bool>;
    /// Raw activity log of one user. Only inspected by tests and tooling;
    /// request paths aggregate through the tag and question queries instead.
    async fn interactions_for_user(&self, user: &str) -> RepoResult<Vec<Interaction>>;
    async fn delete_interactions_for_question(&self, question_id: &str) -> RepoResult<u64>;
    async fn delete_interactions_for_answer(&self, answer_id: &str) -> RepoResult<u64>;
    async fn delete_interactions_by_user(&self, user: &str) -> RepoResult<u64>;
}

pub trait Repo: UserRepo + QuestionRepo + AnswerRepo + TagRepo + InteractionRepo {}

impl<T> Repo for T where T: UserRepo + QuestionRepo + AnswerRepo + TagRepo + InteractionRepo {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_next_counts_skipped_and_returned() {
        let req = PageRequest::new(Some(2), Some(10));
        assert_eq!(req.skip(), 10);
        // 25 matches, page 2 returns 10 → 5 more remain
        assert!(Page::new(vec![0; 10], 25, &req).is_next);
        // 20 matches, page 2 returns the last 10
        assert!(!Page::new(vec![0; 10], 20, &req).is_next);
    }

    #[test]
    fn slice_takes_the_window() {
        let req = PageRequest::new(Some(3), Some(2));
        let page = Page::slice((1..=5).collect::<Vec<_>>(), &req);
        assert_eq!(page.items, vec![5]);
        assert_eq!(page.total, 5);
        assert!(!page.is_next);
    }

    #[test]
    fn page_request_clamps() {
        let req = PageRequest::new(Some(0), Some(500));
        assert_eq!(req.page, 1);
        assert_eq!(req.page_size, MAX_PAGE_SIZE);
    }

    #[test]
    fn huge_page_numbers_saturate() {
        let req = PageRequest::new(Some(u64::MAX), None);
        assert_eq!(req.skip(), u64::MAX);
        let page = Page::slice(vec![1, 2, 3], &req);
        assert!(page.items.is_empty());
        assert_eq!(page.total, 3);
        assert!(!page.is_next);
    }

    #[test]
    fn search_is_literal_and_case_insensitive() {
        assert_eq!(search_pattern(Some("   ")), None);
        assert_eq!(search_pattern(Some("c++")).as_deref(), Some(r"c\+\+"));
        let re = search_matcher(Some("C++")).unwrap().unwrap();
        assert!(re.is_match("learning c++ templates"));
        assert!(!re.is_match("learning c templates"));
    }
}
