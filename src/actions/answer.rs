use validator::Validate;

use super::{ensure_author, populate_answer, populate_answers, vote, LogErr};
use crate::error::{missing, ApiError, ApiResult};
use crate::models::*;
use crate::repo::{AnswerQuery, AnswerSort, PageRequest, Repo};

pub async fn create(repo: &dyn Repo, question_id: &str, author: &User, form: AnswerForm) -> ApiResult<AnswerView> {
    async move {
        form.validate()?;
        let question = repo.get_question(question_id).await.map_err(missing("question"))?;
        let answer = repo
            .insert_answer(NewAnswer { content: form.content, author: author.id.clone(), question: question.id.clone() })
            .await?;
        repo.push_answer(&question.id, &answer.id).await.map_err(missing("question"))?;
        repo.insert_interaction(NewInteraction {
            user: author.id.clone(),
            action: InteractionKind::Answer,
            question: Some(question.id),
            answer: Some(answer.id.clone()),
            tags: question.tags,
        })
        .await?;
        populate_answer(repo, answer).await
    }
    .await
    .log_err("create answer")
}

pub async fn list_for_question(
    repo: &dyn Repo,
    question_id: &str,
    filter: Option<AnswerFilter>,
    page: PageRequest,
) -> ApiResult<AnswerList> {
    async move {
        repo.get_question(question_id).await.map_err(missing("question"))?;
        let q = AnswerQuery {
            question: Some(question_id.to_string()),
            sort: match filter {
                Some(AnswerFilter::HighestUpvotes) => AnswerSort::HighestUpvotes,
                Some(AnswerFilter::LowestUpvotes) => AnswerSort::LowestUpvotes,
                Some(AnswerFilter::Old) => AnswerSort::Old,
                Some(AnswerFilter::Recent) | None => AnswerSort::Recent,
            },
            page,
            ..Default::default()
        };
        let page = repo.list_answers(&q).await?;
        Ok::<_, ApiError>(AnswerList { answers: populate_answers(repo, page.items).await?, is_next: page.is_next })
    }
    .await
    .log_err("list answers")
}

pub async fn get(repo: &dyn Repo, id: &str) -> ApiResult<AnswerView> {
    async move {
        let answer = repo.get_answer(id).await.map_err(missing("answer"))?;
        populate_answer(repo, answer).await
    }
    .await
    .log_err("load answer")
}

pub async fn edit(repo: &dyn Repo, id: &str, editor: &User, form: AnswerForm) -> ApiResult<AnswerView> {
    async move {
        form.validate()?;
        let answer = repo.get_answer(id).await.map_err(missing("answer"))?;
        ensure_author(&answer.author, editor)?;
        let updated = repo.update_answer_content(id, form.content).await.map_err(missing("answer"))?;
        populate_answer(repo, updated).await
    }
    .await
    .log_err("edit answer")
}

/// Removes the answer, unlinks it from its question and drops its interactions.
pub async fn delete(repo: &dyn Repo, id: &str, actor: &User) -> ApiResult<()> {
    async move {
        let answer = repo.get_answer(id).await.map_err(missing("answer"))?;
        ensure_author(&answer.author, actor)?;
        repo.delete_answer(id).await.map_err(missing("answer"))?;
        repo.pull_answer(&answer.question, id).await?;
        repo.delete_interactions_for_answer(id).await?;
        Ok::<_, ApiError>(())
    }
    .await
    .log_err("delete answer")
}

pub async fn cast_vote(repo: &dyn Repo, id: &str, voter: &User, direction: VoteDirection) -> ApiResult<VoteSummary> {
    async move {
        let answer = repo.get_answer(id).await.map_err(missing("answer"))?;
        let change = vote::plan(direction, answer.up_votes.contains(&voter.id), answer.down_votes.contains(&voter.id));
        let updated = repo.vote_answer(id, &voter.id, change).await.map_err(missing("answer"))?;
        Ok::<_, ApiError>(vote::summary(&updated.up_votes, &updated.down_votes, &voter.id))
    }
    .await
    .log_err("vote on answer")
}
