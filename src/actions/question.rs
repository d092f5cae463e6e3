use validator::Validate;

use super::{ensure_author, interaction, populate_question, populate_questions, vote, LogErr};
use crate::error::{missing, ApiError, ApiResult};
use crate::models::*;
use crate::repo::{PageRequest, QuestionQuery, QuestionSort, Repo};

pub const ASK_REPUTATION: i64 = 5;
pub const NEW_TAG_REPUTATION: i64 = 3;
pub const HOT_LIMIT: u64 = 5;

#[derive(Debug, Clone, Default)]
pub struct HomeQuery {
    pub search: Option<String>,
    pub filter: Option<HomeFilter>,
    pub page: PageRequest,
}

/// Trimmed names, first spelling wins among case-insensitive duplicates.
fn distinct_tag_names(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_string();
        if !out.iter().any(|t| t.to_lowercase() == tag.to_lowercase()) {
            out.push(tag);
        }
    }
    out
}

pub async fn create(repo: &dyn Repo, author: &User, form: QuestionForm) -> ApiResult<QuestionView> {
    async move {
        form.validate()?;
        let names = distinct_tag_names(form.tags);
        let question = repo
            .insert_question(NewQuestion { title: form.title, content: form.content, author: author.id.clone() })
            .await?;

        let mut tag_ids = Vec::with_capacity(names.len());
        let mut created_tags = 0;
        for name in &names {
            let (tag, created) = repo.upsert_tag(name, &question.id).await?;
            if created {
                created_tags += 1;
            }
            tag_ids.push(tag.id);
        }
        repo.push_question_tags(&question.id, &tag_ids).await?;

        repo.insert_interaction(NewInteraction {
            user: author.id.clone(),
            action: InteractionKind::AskQuestion,
            question: Some(question.id.clone()),
            answer: None,
            tags: tag_ids,
        })
        .await?;
        repo.adjust_reputation(&author.id, ASK_REPUTATION + NEW_TAG_REPUTATION * created_tags).await?;

        let stored = repo.get_question(&question.id).await.map_err(missing("question"))?;
        populate_question(repo, stored).await
    }
    .await
    .log_err("create question")
}

pub async fn list_home(repo: &dyn Repo, query: HomeQuery) -> ApiResult<QuestionList> {
    async move {
        let filter = query.filter.unwrap_or(HomeFilter::Newest);
        let q = QuestionQuery {
            search: query.search,
            search_content: true,
            unanswered_only: filter == HomeFilter::Unanswered,
            sort: match filter {
                HomeFilter::Frequent => QuestionSort::MostViewed,
                HomeFilter::Newest | HomeFilter::Unanswered | HomeFilter::Recommended => QuestionSort::Newest,
            },
            page: query.page,
            ..Default::default()
        };
        let page = repo.list_questions(&q).await?;
        Ok::<_, ApiError>(QuestionList { questions: populate_questions(repo, page.items).await?, is_next: page.is_next })
    }
    .await
    .log_err("list questions")
}

/// Most viewed, then most upvoted.
pub async fn hot(repo: &dyn Repo) -> ApiResult<Vec<QuestionRef>> {
    async move {
        let q = QuestionQuery {
            sort: QuestionSort::Popular,
            page: PageRequest::new(Some(1), Some(HOT_LIMIT)),
            ..Default::default()
        };
        let page = repo.list_questions(&q).await?;
        Ok::<_, ApiError>(page.items.into_iter().map(|q| QuestionRef { id: q.id, title: q.title }).collect())
    }
    .await
    .log_err("load hot questions")
}

/// Detail load: counts the view, records the viewer's first view and
/// reports their vote/save state.
pub async fn get_detail(repo: &dyn Repo, id: &str, viewer: Option<&User>) -> ApiResult<QuestionDetail> {
    async move {
        interaction::view_question(repo, id, viewer.map(|u| u.id.as_str())).await?;
        let question = repo.get_question(id).await.map_err(missing("question"))?;
        let viewer = viewer.map(|u| ViewerState {
            has_upvoted: question.up_votes.contains(&u.id),
            has_downvoted: question.down_votes.contains(&u.id),
            has_saved: u.saved.contains(&question.id),
        });
        Ok::<_, ApiError>(QuestionDetail { question: populate_question(repo, question).await?, viewer })
    }
    .await
    .log_err("load question")
}

pub async fn edit(repo: &dyn Repo, id: &str, editor: &User, form: EditQuestionForm) -> ApiResult<QuestionView> {
    async move {
        form.validate()?;
        let question = repo.get_question(id).await.map_err(missing("question"))?;
        ensure_author(&question.author, editor)?;
        let updated = repo
            .update_question_content(id, form.title, form.content)
            .await
            .map_err(missing("question"))?;
        populate_question(repo, updated).await
    }
    .await
    .log_err("edit question")
}

pub async fn delete(repo: &dyn Repo, id: &str, actor: &User) -> ApiResult<()> {
    async move {
        let question = repo.get_question(id).await.map_err(missing("question"))?;
        ensure_author(&question.author, actor)?;
        remove_with_dependents(repo, &question).await
    }
    .await
    .log_err("delete question")
}

/// Question plus its answers, interactions, tag links and saved-set entries;
/// the author loses the asking reputation.
pub(crate) async fn remove_with_dependents(repo: &dyn Repo, question: &Question) -> ApiResult<()> {
    repo.delete_question(&question.id).await.map_err(missing("question"))?;
    repo.delete_answers_for_question(&question.id).await?;
    repo.delete_interactions_for_question(&question.id).await?;
    repo.pull_question_from_tags(&question.id).await?;
    repo.pull_saved_everywhere(&question.id).await?;
    repo.adjust_reputation(&question.author, -ASK_REPUTATION).await?;
    Ok(())
}

pub async fn cast_vote(repo: &dyn Repo, id: &str, voter: &User, direction: VoteDirection) -> ApiResult<VoteSummary> {
    async move {
        let question = repo.get_question(id).await.map_err(missing("question"))?;
        let change = vote::plan(
            direction,
            question.up_votes.contains(&voter.id),
            question.down_votes.contains(&voter.id),
        );
        let updated = repo.vote_question(id, &voter.id, change).await.map_err(missing("question"))?;
        Ok::<_, ApiError>(vote::summary(&updated.up_votes, &updated.down_votes, &voter.id))
    }
    .await
    .log_err("vote on question")
}
