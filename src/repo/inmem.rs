use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::*;

const SNAPSHOT_FILE: &str = "state.json";

// BTreeMap keyed by monotonically increasing hex ids keeps insertion order,
// which is the "unsorted" order of every listing.
#[derive(Default, Serialize, Deserialize)]
struct State {
    users: BTreeMap<Id, User>,
    questions: BTreeMap<Id, Question>,
    answers: BTreeMap<Id, Answer>,
    tags: BTreeMap<Id, Tag>,
    interactions: BTreeMap<Id, Interaction>,
    next_id: u64,
}

impl State {
    fn next_id(&mut self) -> Id {
        self.next_id += 1;
        format!("{:024x}", self.next_id)
    }
}

#[derive(Clone)]
pub struct InMemRepo {
    state: Arc<RwLock<State>>,
    snapshot_path: Option<Arc<PathBuf>>,
}

impl InMemRepo {
    /// Store persisted as `state.json` inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::with_snapshot_path(dir.join(SNAPSHOT_FILE))
    }

    pub fn with_snapshot_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = Self::load_state_from(&path);
        Self { state: Arc::new(RwLock::new(state)), snapshot_path: Some(Arc::new(path)) }
    }

    /// Never touches the filesystem.
    pub fn ephemeral() -> Self {
        Self { state: Arc::new(RwLock::new(State::default())), snapshot_path: None }
    }

    fn load_state_from(path: &Path) -> State {
        match std::fs::read(path) {
            Ok(bytes) => match serde_json::from_slice::<State>(&bytes) {
                Ok(s) => {
                    info!(path = %path.display(), "loaded in-memory snapshot");
                    s
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to parse snapshot, starting empty");
                    State::default()
                }
            },
            Err(e) => {
                info!(path = %path.display(), error = %e, "no snapshot, starting empty");
                State::default()
            }
        }
    }

    fn persist(&self) {
        let Some(path) = self.snapshot_path.as_ref() else { return };
        let bytes = match self.state.read() {
            Ok(s) => serde_json::to_vec_pretty(&*s),
            Err(_) => return,
        };
        match bytes {
            Ok(bytes) => {
                if let Some(dir) = path.parent() {
                    let _ = std::fs::create_dir_all(dir);
                }
                if let Err(e) = std::fs::write(path.as_path(), bytes) {
                    warn!(path = %path.display(), error = %e, "failed to write snapshot");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize snapshot"),
        }
    }

    fn read(&self) -> RepoResult<RwLockReadGuard<'_, State>> {
        self.state.read().map_err(|_| RepoError::Internal("state lock poisoned".into()))
    }

    /// Run `f` under the write lock, then persist if it succeeded.
    fn mutate<R>(&self, f: impl FnOnce(&mut State) -> RepoResult<R>) -> RepoResult<R> {
        let out = {
            let mut s = self.state.write().map_err(|_| RepoError::Internal("state lock poisoned".into()))?;
            f(&mut s)?
        };
        self.persist();
        Ok(out)
    }
}

fn apply_vote(up: &mut Vec<Id>, down: &mut Vec<Id>, user: &str, change: VoteChange) {
    if change.pull_up { up.retain(|u| u != user); }
    if change.pull_down { down.retain(|u| u != user); }
    if change.add_up && !up.iter().any(|u| u == user) { up.push(user.to_string()); }
    if change.add_down && !down.iter().any(|u| u == user) { down.push(user.to_string()); }
}

fn pull(list: &mut Vec<Id>, id: &str) {
    list.retain(|x| x != id);
}

fn newest_first<T>(a_at: &T, a_id: &str, b_at: &T, b_id: &str) -> Ordering
where
    T: Ord,
{
    b_at.cmp(a_at).then_with(|| b_id.cmp(a_id))
}

fn sort_questions(v: &mut [Question], sort: QuestionSort) {
    match sort {
        QuestionSort::Newest => v.sort_by(|a, b| newest_first(&a.created_at, &a.id, &b.created_at, &b.id)),
        QuestionSort::Oldest => v.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id))),
        QuestionSort::MostViewed => v.sort_by(|a, b| b.views.cmp(&a.views)),
        QuestionSort::MostVoted => v.sort_by(|a, b| b.up_votes.len().cmp(&a.up_votes.len())),
        QuestionSort::MostAnswered => v.sort_by(|a, b| b.answers.len().cmp(&a.answers.len())),
        QuestionSort::Popular => v.sort_by(|a, b| {
            b.views.cmp(&a.views).then_with(|| b.up_votes.len().cmp(&a.up_votes.len()))
        }),
    }
}

fn sort_answers(v: &mut [Answer], sort: AnswerSort) {
    match sort {
        AnswerSort::HighestUpvotes => v.sort_by(|a, b| b.up_votes.len().cmp(&a.up_votes.len())),
        AnswerSort::LowestUpvotes => v.sort_by(|a, b| a.up_votes.len().cmp(&b.up_votes.len())),
        AnswerSort::Recent => v.sort_by(|a, b| newest_first(&a.created_at, &a.id, &b.created_at, &b.id)),
        AnswerSort::Old => v.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id))),
    }
}

#[async_trait]
impl UserRepo for InMemRepo {
    async fn create_user(&self, new: NewUser) -> RepoResult<User> {
        self.mutate(|s| {
            if s.users.values().any(|u| {
                u.clerk_id == new.clerk_id || u.username == new.username || u.email == new.email
            }) {
                return Err(RepoError::Conflict);
            }
            let id = s.next_id();
            let user = User {
                id: id.clone(),
                clerk_id: new.clerk_id,
                name: new.name,
                username: new.username,
                email: new.email,
                picture: new.picture,
                bio: None,
                location: None,
                portfolio_website: None,
                reputation: 0,
                saved: Vec::new(),
                onboarded: false,
                joined_at: Utc::now(),
            };
            s.users.insert(id, user.clone());
            Ok(user)
        })
    }

    async fn get_user(&self, id: &str) -> RepoResult<User> {
        self.read()?.users.get(id).cloned().ok_or(RepoError::NotFound)
    }

    async fn get_user_by_clerk_id(&self, clerk_id: &str) -> RepoResult<User> {
        let s = self.read()?;
        s.users.values().find(|u| u.clerk_id == clerk_id).cloned().ok_or(RepoError::NotFound)
    }

    async fn users_by_ids(&self, ids: &[Id]) -> RepoResult<Vec<User>> {
        let s = self.read()?;
        Ok(ids.iter().filter_map(|id| s.users.get(id).cloned()).collect())
    }

    async fn update_user(&self, clerk_id: &str, upd: UpdateUser) -> RepoResult<User> {
        self.mutate(|s| {
            let id = s.users.values().find(|u| u.clerk_id == clerk_id).map(|u| u.id.clone()).ok_or(RepoError::NotFound)?;

            // uniqueness check before taking the mutable borrow
            let taken = s.users.values().any(|u| {
                u.id != id
                    && (upd.username.as_ref().is_some_and(|n| *n == u.username)
                        || upd.email.as_ref().is_some_and(|e| *e == u.email))
            });
            if taken { return Err(RepoError::Conflict); }

            let user = s.users.get_mut(&id).ok_or(RepoError::NotFound)?;
            if let Some(v) = upd.name { user.name = v; }
            if let Some(v) = upd.username { user.username = v; }
            if let Some(v) = upd.email { user.email = v; }
            if let Some(v) = upd.picture { user.picture = v; }
            if let Some(v) = upd.bio { user.bio = v; }
            if let Some(v) = upd.location { user.location = v; }
            if let Some(v) = upd.portfolio_website { user.portfolio_website = v; }
            if let Some(v) = upd.onboarded { user.onboarded = v; }
            Ok(user.clone())
        })
    }

    async fn delete_user(&self, id: &str) -> RepoResult<User> {
        self.mutate(|s| s.users.remove(id).ok_or(RepoError::NotFound))
    }

    async fn list_users(&self, q: &UserQuery) -> RepoResult<Page<User>> {
        let re = search_matcher(q.search.as_deref())?;
        let s = self.read()?;
        let mut v: Vec<User> = s
            .users
            .values()
            .filter(|u| re.as_ref().map_or(true, |re| re.is_match(&u.name) || re.is_match(&u.username)))
            .cloned()
            .collect();
        match q.sort {
            UserSort::Unsorted => {}
            UserSort::NewUsers => v.sort_by(|a, b| newest_first(&a.joined_at, &a.id, &b.joined_at, &b.id)),
            UserSort::OldUsers => v.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then_with(|| a.id.cmp(&b.id))),
            UserSort::TopContributors => v.sort_by(|a, b| b.reputation.cmp(&a.reputation)),
        }
        Ok(Page::slice(v, &q.page))
    }

    async fn adjust_reputation(&self, id: &str, delta: i64) -> RepoResult<()> {
        self.mutate(|s| {
            let user = s.users.get_mut(id).ok_or(RepoError::NotFound)?;
            user.reputation += delta;
            Ok(())
        })
    }

    async fn set_saved(&self, user_id: &str, question_id: &str, saved: bool) -> RepoResult<()> {
        self.mutate(|s| {
            let user = s.users.get_mut(user_id).ok_or(RepoError::NotFound)?;
            if saved {
                if !user.saved.iter().any(|q| q == question_id) {
                    user.saved.push(question_id.to_string());
                }
            } else {
                pull(&mut user.saved, question_id);
            }
            Ok(())
        })
    }

    async fn pull_saved_everywhere(&self, question_id: &str) -> RepoResult<()> {
        self.mutate(|s| {
            for user in s.users.values_mut() {
                pull(&mut user.saved, question_id);
            }
            Ok(())
        })
    }
}

#[async_trait]
impl QuestionRepo for InMemRepo {
    async fn insert_question(&self, new: NewQuestion) -> RepoResult<Question> {
        self.mutate(|s| {
            let id = s.next_id();
            let question = Question {
                id: id.clone(),
                title: new.title,
                content: new.content,
                tags: Vec::new(),
                views: 0,
                up_votes: Vec::new(),
                down_votes: Vec::new(),
                author: new.author,
                answers: Vec::new(),
                created_at: Utc::now(),
            };
            s.questions.insert(id, question.clone());
            Ok(question)
        })
    }

    async fn get_question(&self, id: &str) -> RepoResult<Question> {
        self.read()?.questions.get(id).cloned().ok_or(RepoError::NotFound)
    }

    async fn questions_by_ids(&self, ids: &[Id]) -> RepoResult<Vec<Question>> {
        let s = self.read()?;
        Ok(ids.iter().filter_map(|id| s.questions.get(id).cloned()).collect())
    }

    async fn question_ids_by_author(&self, author: &str) -> RepoResult<Vec<Id>> {
        let s = self.read()?;
        Ok(s.questions.values().filter(|q| q.author == author).map(|q| q.id.clone()).collect())
    }

    async fn update_question_content(&self, id: &str, title: String, content: String) -> RepoResult<Question> {
        self.mutate(|s| {
            let q = s.questions.get_mut(id).ok_or(RepoError::NotFound)?;
            q.title = title;
            q.content = content;
            Ok(q.clone())
        })
    }

    async fn delete_question(&self, id: &str) -> RepoResult<Question> {
        self.mutate(|s| s.questions.remove(id).ok_or(RepoError::NotFound))
    }

    async fn push_question_tags(&self, id: &str, tags: &[Id]) -> RepoResult<()> {
        self.mutate(|s| {
            let q = s.questions.get_mut(id).ok_or(RepoError::NotFound)?;
            q.tags.extend(tags.iter().cloned());
            Ok(())
        })
    }

    async fn push_answer(&self, question_id: &str, answer_id: &str) -> RepoResult<()> {
        self.mutate(|s| {
            let q = s.questions.get_mut(question_id).ok_or(RepoError::NotFound)?;
            q.answers.push(answer_id.to_string());
            Ok(())
        })
    }

    async fn pull_answer(&self, question_id: &str, answer_id: &str) -> RepoResult<()> {
        self.mutate(|s| {
            if let Some(q) = s.questions.get_mut(question_id) {
                pull(&mut q.answers, answer_id);
            }
            Ok(())
        })
    }

    async fn increment_views(&self, id: &str) -> RepoResult<()> {
        self.mutate(|s| {
            let q = s.questions.get_mut(id).ok_or(RepoError::NotFound)?;
            q.views += 1;
            Ok(())
        })
    }

    async fn list_questions(&self, q: &QuestionQuery) -> RepoResult<Page<Question>> {
        let re = search_matcher(q.search.as_deref())?;
        let s = self.read()?;
        let mut v: Vec<Question> = s
            .questions
            .values()
            .filter(|qn| q.author.as_ref().map_or(true, |a| qn.author == *a))
            .filter(|qn| q.ids.as_ref().map_or(true, |ids| ids.contains(&qn.id)))
            .filter(|qn| !q.unanswered_only || qn.answers.is_empty())
            .filter(|qn| {
                re.as_ref().map_or(true, |re| {
                    re.is_match(&qn.title) || (q.search_content && re.is_match(&qn.content))
                })
            })
            .cloned()
            .collect();
        sort_questions(&mut v, q.sort);
        Ok(Page::slice(v, &q.page))
    }

    async fn count_questions(&self, author: &str) -> RepoResult<u64> {
        Ok(self.read()?.questions.values().filter(|q| q.author == author).count() as u64)
    }

    async fn vote_question(&self, id: &str, user: &str, change: VoteChange) -> RepoResult<Question> {
        self.mutate(|s| {
            let q = s.questions.get_mut(id).ok_or(RepoError::NotFound)?;
            apply_vote(&mut q.up_votes, &mut q.down_votes, user, change);
            Ok(q.clone())
        })
    }

    async fn top_tags_for_author(&self, author: &str, limit: usize) -> RepoResult<Vec<(Id, u64)>> {
        let s = self.read()?;
        let mut counts: BTreeMap<Id, u64> = BTreeMap::new();
        for q in s.questions.values().filter(|q| q.author == author) {
            for tag in &q.tags {
                *counts.entry(tag.clone()).or_default() += 1;
            }
        }
        let mut v: Vec<(Id, u64)> = counts.into_iter().collect();
        v.sort_by(|a, b| b.1.cmp(&a.1));
        v.truncate(limit);
        Ok(v)
    }
}

#[async_trait]
impl AnswerRepo for InMemRepo {
    async fn insert_answer(&self, new: NewAnswer) -> RepoResult<Answer> {
        self.mutate(|s| {
            let id = s.next_id();
            let answer = Answer {
                id: id.clone(),
                content: new.content,
                author: new.author,
                question: new.question,
                up_votes: Vec::new(),
                down_votes: Vec::new(),
                created_at: Utc::now(),
            };
            s.answers.insert(id, answer.clone());
            Ok(answer)
        })
    }

    async fn get_answer(&self, id: &str) -> RepoResult<Answer> {
        self.read()?.answers.get(id).cloned().ok_or(RepoError::NotFound)
    }

    async fn update_answer_content(&self, id: &str, content: String) -> RepoResult<Answer> {
        self.mutate(|s| {
            let a = s.answers.get_mut(id).ok_or(RepoError::NotFound)?;
            a.content = content;
            Ok(a.clone())
        })
    }

    async fn delete_answer(&self, id: &str) -> RepoResult<Answer> {
        self.mutate(|s| s.answers.remove(id).ok_or(RepoError::NotFound))
    }

    async fn delete_answers_for_question(&self, question_id: &str) -> RepoResult<u64> {
        self.mutate(|s| {
            let before = s.answers.len();
            s.answers.retain(|_, a| a.question != question_id);
            Ok((before - s.answers.len()) as u64)
        })
    }

    async fn delete_answers_by_author(&self, author: &str) -> RepoResult<Vec<Answer>> {
        self.mutate(|s| {
            let ids: Vec<Id> = s.answers.values().filter(|a| a.author == author).map(|a| a.id.clone()).collect();
            Ok(ids.iter().filter_map(|id| s.answers.remove(id)).collect())
        })
    }

    async fn list_answers(&self, q: &AnswerQuery) -> RepoResult<Page<Answer>> {
        let s = self.read()?;
        let mut v: Vec<Answer> = s
            .answers
            .values()
            .filter(|a| q.question.as_ref().map_or(true, |id| a.question == *id))
            .filter(|a| q.author.as_ref().map_or(true, |id| a.author == *id))
            .cloned()
            .collect();
        sort_answers(&mut v, q.sort);
        Ok(Page::slice(v, &q.page))
    }

    async fn count_answers(&self, author: &str) -> RepoResult<u64> {
        Ok(self.read()?.answers.values().filter(|a| a.author == author).count() as u64)
    }

    async fn vote_answer(&self, id: &str, user: &str, change: VoteChange) -> RepoResult<Answer> {
        self.mutate(|s| {
            let a = s.answers.get_mut(id).ok_or(RepoError::NotFound)?;
            apply_vote(&mut a.up_votes, &mut a.down_votes, user, change);
            Ok(a.clone())
        })
    }
}

#[async_trait]
impl TagRepo for InMemRepo {
    async fn upsert_tag(&self, name: &str, question_id: &str) -> RepoResult<(Tag, bool)> {
        let wanted = name.to_lowercase();
        self.mutate(|s| {
            if let Some(tag) = s.tags.values_mut().find(|t| t.name.to_lowercase() == wanted) {
                if !tag.questions.iter().any(|q| q == question_id) {
                    tag.questions.push(question_id.to_string());
                }
                return Ok((tag.clone(), false));
            }
            let id = s.next_id();
            let tag = Tag {
                id: id.clone(),
                name: name.to_string(),
                questions: vec![question_id.to_string()],
                created_at: Utc::now(),
            };
            s.tags.insert(id, tag.clone());
            Ok((tag, true))
        })
    }

    async fn get_tag(&self, id: &str) -> RepoResult<Tag> {
        self.read()?.tags.get(id).cloned().ok_or(RepoError::NotFound)
    }

    async fn tags_by_ids(&self, ids: &[Id]) -> RepoResult<Vec<Tag>> {
        let s = self.read()?;
        Ok(ids.iter().filter_map(|id| s.tags.get(id).cloned()).collect())
    }

    async fn list_tags(&self, q: &TagQuery) -> RepoResult<Page<Tag>> {
        let re = search_matcher(q.search.as_deref())?;
        let s = self.read()?;
        let mut v: Vec<Tag> = s
            .tags
            .values()
            .filter(|t| re.as_ref().map_or(true, |re| re.is_match(&t.name)))
            .cloned()
            .collect();
        match q.sort {
            TagSort::Unsorted => {}
            TagSort::Popular => v.sort_by(|a, b| b.questions.len().cmp(&a.questions.len())),
            TagSort::Recent => v.sort_by(|a, b| newest_first(&a.created_at, &a.id, &b.created_at, &b.id)),
            TagSort::Name => v.sort_by(|a, b| a.name.cmp(&b.name)),
            TagSort::Old => v.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id))),
        }
        Ok(Page::slice(v, &q.page))
    }

    async fn pull_question_from_tags(&self, question_id: &str) -> RepoResult<()> {
        self.mutate(|s| {
            for tag in s.tags.values_mut() {
                pull(&mut tag.questions, question_id);
            }
            Ok(())
        })
    }

    async fn popular_tags(&self, limit: usize) -> RepoResult<Vec<PopularTag>> {
        let s = self.read()?;
        let mut v: Vec<PopularTag> = s
            .tags
            .values()
            .map(|t| PopularTag { id: t.id.clone(), name: t.name.clone(), question_count: t.questions.len() as u64 })
            .collect();
        v.sort_by(|a, b| b.question_count.cmp(&a.question_count));
        v.truncate(limit);
        Ok(v)
    }
}

#[async_trait]
impl InteractionRepo for InMemRepo {
    async fn insert_interaction(&self, new: NewInteraction) -> RepoResult<Interaction> {
        self.mutate(|s| {
            let id = s.next_id();
            let row = Interaction {
                id: id.clone(),
                user: new.user,
                action: new.action,
                question: new.question,
                answer: new.answer,
                tags: new.tags,
                created_at: Utc::now(),
            };
            s.interactions.insert(id, row.clone());
            Ok(row)
        })
    }

    async fn interaction_exists(&self, user: &str, action: InteractionKind, question: &str) -> RepoResult<bool> {
        let s = self.read()?;
        Ok(s.interactions.values().any(|i| {
            i.user == user && i.action == action && i.question.as_deref() == Some(question)
        }))
    }

    async fn interactions_for_user(&self, user: &str) -> RepoResult<Vec<Interaction>> {
        let s = self.read()?;
        Ok(s.interactions.values().filter(|i| i.user == user).cloned().collect())
    }

    async fn delete_interactions_for_question(&self, question_id: &str) -> RepoResult<u64> {
        self.mutate(|s| {
            let before = s.interactions.len();
            s.interactions.retain(|_, i| i.question.as_deref() != Some(question_id));
            Ok((before - s.interactions.len()) as u64)
        })
    }

    async fn delete_interactions_for_answer(&self, answer_id: &str) -> RepoResult<u64> {
        self.mutate(|s| {
            let before = s.interactions.len();
            s.interactions.retain(|_, i| i.answer.as_deref() != Some(answer_id));
            Ok((before - s.interactions.len()) as u64)
        })
    }

    async fn delete_interactions_by_user(&self, user: &str) -> RepoResult<u64> {
        self.mutate(|s| {
            let before = s.interactions.len();
            s.interactions.retain(|_, i| i.user != user);
            Ok((before - s.interactions.len()) as u64)
        })
    }
}
