use super::LogErr;
use crate::error::{missing, ApiError, ApiResult};
use crate::models::{InteractionKind, NewInteraction};
use crate::repo::Repo;

/// Bump the view counter on every load; log a `view` interaction only the
/// first time a signed-in user opens the question.
pub async fn view_question(repo: &dyn Repo, question_id: &str, viewer: Option<&str>) -> ApiResult<()> {
    async move {
        let question = repo.get_question(question_id).await.map_err(missing("question"))?;
        repo.increment_views(question_id).await.map_err(missing("question"))?;

        let Some(user) = viewer else { return Ok(()) };
        if repo.interaction_exists(user, InteractionKind::View, question_id).await? {
            return Ok(());
        }
        repo.insert_interaction(NewInteraction {
            user: user.to_string(),
            action: InteractionKind::View,
            question: Some(question.id),
            answer: None,
            tags: question.tags,
        })
        .await?;
        Ok::<_, ApiError>(())
    }
    .await
    .log_err("record question view")
}
