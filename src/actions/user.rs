use validator::Validate;

use super::{populate_answers, populate_questions, question, LogErr};
use crate::error::{missing, ApiError, ApiResult};
use crate::models::*;
use crate::repo::{AnswerQuery, AnswerSort, PageRequest, QuestionQuery, QuestionSort, Repo, UserQuery, UserSort};

pub async fn create(repo: &dyn Repo, new: NewUser) -> ApiResult<User> {
    async move { Ok::<_, ApiError>(repo.create_user(new).await?) }
        .await
        .log_err("create user")
}

pub async fn update(repo: &dyn Repo, clerk_id: &str, upd: UpdateUser) -> ApiResult<User> {
    async move { repo.update_user(clerk_id, upd).await.map_err(missing("user")) }
        .await
        .log_err("update user")
}

/// Removes the user together with everything they authored. Their entries in
/// other documents' vote sets stay.
pub async fn delete(repo: &dyn Repo, clerk_id: &str) -> ApiResult<User> {
    async move {
        let user = repo.get_user_by_clerk_id(clerk_id).await.map_err(missing("user"))?;

        for id in repo.question_ids_by_author(&user.id).await? {
            let q = repo.get_question(&id).await.map_err(missing("question"))?;
            question::remove_with_dependents(repo, &q).await?;
        }
        for answer in repo.delete_answers_by_author(&user.id).await? {
            repo.pull_answer(&answer.question, &answer.id).await?;
            repo.delete_interactions_for_answer(&answer.id).await?;
        }
        repo.delete_interactions_by_user(&user.id).await?;
        repo.delete_user(&user.id).await.map_err(missing("user"))
    }
    .await
    .log_err("delete user")
}

pub async fn list(
    repo: &dyn Repo,
    search: Option<String>,
    filter: Option<UserFilter>,
    page: PageRequest,
) -> ApiResult<UserList> {
    async move {
        let q = UserQuery {
            search,
            sort: match filter {
                None => UserSort::Unsorted,
                Some(UserFilter::NewUsers) => UserSort::NewUsers,
                Some(UserFilter::OldUsers) => UserSort::OldUsers,
                Some(UserFilter::TopContributors) => UserSort::TopContributors,
            },
            page,
        };
        let page = repo.list_users(&q).await?;
        Ok::<_, ApiError>(UserList { users: page.items, is_next: page.is_next })
    }
    .await
    .log_err("list users")
}

/// Flip membership of `question_id` in the user's saved set.
pub async fn toggle_save(repo: &dyn Repo, user: &User, question_id: &str) -> ApiResult<SaveState> {
    async move {
        repo.get_question(question_id).await.map_err(missing("question"))?;
        // read fresh: the caller's copy may predate a concurrent toggle
        let current = repo.get_user(&user.id).await.map_err(missing("user"))?;
        let saved = !current.saved.iter().any(|id| id == question_id);
        repo.set_saved(&user.id, question_id, saved).await.map_err(missing("user"))?;
        Ok::<_, ApiError>(SaveState { saved })
    }
    .await
    .log_err("toggle saved question")
}

pub async fn saved(
    repo: &dyn Repo,
    user: &User,
    search: Option<String>,
    filter: Option<CollectionFilter>,
    page: PageRequest,
) -> ApiResult<QuestionList> {
    async move {
        let q = QuestionQuery {
            search,
            ids: Some(user.saved.clone()),
            sort: match filter {
                None | Some(CollectionFilter::MostRecent) => QuestionSort::Newest,
                Some(CollectionFilter::Oldest) => QuestionSort::Oldest,
                Some(CollectionFilter::MostVoted) => QuestionSort::MostVoted,
                Some(CollectionFilter::MostViewed) => QuestionSort::MostViewed,
                Some(CollectionFilter::MostAnswered) => QuestionSort::MostAnswered,
            },
            page,
            ..Default::default()
        };
        let page = repo.list_questions(&q).await?;
        Ok::<_, ApiError>(QuestionList { questions: populate_questions(repo, page.items).await?, is_next: page.is_next })
    }
    .await
    .log_err("list saved questions")
}

pub async fn info(repo: &dyn Repo, clerk_id: &str) -> ApiResult<UserInfo> {
    async move {
        let user = repo.get_user_by_clerk_id(clerk_id).await.map_err(missing("user"))?;
        let total_questions = repo.count_questions(&user.id).await?;
        let total_answers = repo.count_answers(&user.id).await?;
        Ok::<_, ApiError>(UserInfo { user, total_questions, total_answers })
    }
    .await
    .log_err("load user info")
}

/// The user's questions, most viewed first.
pub async fn questions(repo: &dyn Repo, clerk_id: &str, page: PageRequest) -> ApiResult<UserQuestions> {
    async move {
        let user = repo.get_user_by_clerk_id(clerk_id).await.map_err(missing("user"))?;
        let q = QuestionQuery { author: Some(user.id), sort: QuestionSort::Popular, page, ..Default::default() };
        let page = repo.list_questions(&q).await?;
        Ok::<_, ApiError>(UserQuestions {
            total_questions: page.total,
            questions: populate_questions(repo, page.items).await?,
            is_next: page.is_next,
        })
    }
    .await
    .log_err("list user questions")
}

/// The user's answers, most upvoted first.
pub async fn answers(repo: &dyn Repo, clerk_id: &str, page: PageRequest) -> ApiResult<UserAnswers> {
    async move {
        let user = repo.get_user_by_clerk_id(clerk_id).await.map_err(missing("user"))?;
        let q = AnswerQuery { author: Some(user.id), sort: AnswerSort::HighestUpvotes, page, ..Default::default() };
        let page = repo.list_answers(&q).await?;
        Ok::<_, ApiError>(UserAnswers {
            total_answers: page.total,
            answers: populate_answers(repo, page.items).await?,
            is_next: page.is_next,
        })
    }
    .await
    .log_err("list user answers")
}

pub async fn update_profile(repo: &dyn Repo, user: &User, form: ProfileForm) -> ApiResult<User> {
    async move {
        let form = form.normalized();
        form.validate()?;
        repo.update_user(&user.clerk_id, form.into()).await.map_err(missing("user"))
    }
    .await
    .log_err("update profile")
}
