use std::collections::HashMap;

use super::{populate_questions, LogErr};
use crate::error::{missing, ApiError, ApiResult};
use crate::models::*;
use crate::repo::{PageRequest, QuestionQuery, QuestionSort, Repo, TagQuery, TagSort};

pub const DEFAULT_TOP_TAGS: usize = 3;
pub const POPULAR_LIMIT: usize = 5;

/// Tags the user asks about most, with how many of their questions carry each.
pub async fn top_interacted(repo: &dyn Repo, clerk_id: &str, limit: Option<usize>) -> ApiResult<Vec<PopularTag>> {
    async move {
        let user = repo.get_user_by_clerk_id(clerk_id).await.map_err(missing("user"))?;
        let counts = repo.top_tags_for_author(&user.id, limit.unwrap_or(DEFAULT_TOP_TAGS)).await?;
        let ids: Vec<Id> = counts.iter().map(|(id, _)| id.clone()).collect();
        let names: HashMap<Id, String> = repo.tags_by_ids(&ids).await?.into_iter().map(|t| (t.id, t.name)).collect();
        Ok::<_, ApiError>(
            counts
                .into_iter()
                .filter_map(|(id, question_count)| {
                    let name = names.get(&id)?.clone();
                    Some(PopularTag { id, name, question_count })
                })
                .collect(),
        )
    }
    .await
    .log_err("load top tags")
}

pub async fn list(
    repo: &dyn Repo,
    search: Option<String>,
    filter: Option<TagFilter>,
    page: PageRequest,
) -> ApiResult<TagList> {
    async move {
        let q = TagQuery {
            search,
            sort: match filter {
                None => TagSort::Unsorted,
                Some(TagFilter::Popular) => TagSort::Popular,
                Some(TagFilter::Recent) => TagSort::Recent,
                Some(TagFilter::Name) => TagSort::Name,
                Some(TagFilter::Old) => TagSort::Old,
            },
            page,
        };
        let page = repo.list_tags(&q).await?;
        Ok::<_, ApiError>(TagList { tags: page.items, is_next: page.is_next })
    }
    .await
    .log_err("list tags")
}

/// Questions linked to one tag, searched by title.
pub async fn questions(repo: &dyn Repo, tag_id: &str, search: Option<String>, page: PageRequest) -> ApiResult<TagQuestions> {
    async move {
        let tag = repo.get_tag(tag_id).await.map_err(missing("tag"))?;
        let q = QuestionQuery {
            search,
            ids: Some(tag.questions),
            sort: QuestionSort::Newest,
            page,
            ..Default::default()
        };
        let page = repo.list_questions(&q).await?;
        Ok::<_, ApiError>(TagQuestions {
            tag_title: tag.name,
            questions: populate_questions(repo, page.items).await?,
            is_next: page.is_next,
        })
    }
    .await
    .log_err("list tag questions")
}

pub async fn popular(repo: &dyn Repo) -> ApiResult<Vec<PopularTag>> {
    async move { Ok::<_, ApiError>(repo.popular_tags(POPULAR_LIMIT).await?) }
        .await
        .log_err("load popular tags")
}
