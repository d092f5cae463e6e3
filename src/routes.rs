use std::sync::Arc;

use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::actions::{self, answer, question, tag, user};
use crate::auth::Auth;
use crate::error::ApiError;
use crate::jobs::{JobBoard, JobFilter, JobQuery};
use crate::models::*;
use crate::repo::{PageRequest, Repo};
use crate::webhook;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(
                web::resource("/questions")
                    .route(web::get().to(list_questions))
                    .route(web::post().to(create_question)),
            )
            .service(web::resource("/questions/hot").route(web::get().to(hot_questions)))
            .service(
                web::resource("/questions/{id}")
                    .route(web::get().to(get_question))
                    .route(web::patch().to(edit_question))
                    .route(web::delete().to(delete_question)),
            )
            .service(web::resource("/questions/{id}/upvote").route(web::post().to(upvote_question)))
            .service(web::resource("/questions/{id}/downvote").route(web::post().to(downvote_question)))
            .service(web::resource("/questions/{id}/save").route(web::post().to(save_question)))
            .service(
                web::resource("/questions/{id}/answers")
                    .route(web::get().to(list_answers))
                    .route(web::post().to(create_answer)),
            )
            .service(
                web::resource("/answers/{id}")
                    .route(web::get().to(get_answer))
                    .route(web::patch().to(edit_answer))
                    .route(web::delete().to(delete_answer)),
            )
            .service(web::resource("/answers/{id}/upvote").route(web::post().to(upvote_answer)))
            .service(web::resource("/answers/{id}/downvote").route(web::post().to(downvote_answer)))
            .service(web::resource("/tags").route(web::get().to(list_tags)))
            .service(web::resource("/tags/popular").route(web::get().to(popular_tags)))
            .service(web::resource("/tags/{id}/questions").route(web::get().to(tag_questions)))
            .service(web::resource("/users").route(web::get().to(list_users)))
            .service(web::resource("/users/{clerk_id}").route(web::get().to(user_info)))
            .service(web::resource("/users/{clerk_id}/questions").route(web::get().to(user_questions)))
            .service(web::resource("/users/{clerk_id}/answers").route(web::get().to(user_answers)))
            .service(web::resource("/users/{clerk_id}/top-tags").route(web::get().to(user_top_tags)))
            .service(
                web::resource("/me")
                    .route(web::get().to(me))
                    .route(web::patch().to(update_me)),
            )
            .service(web::resource("/me/saved").route(web::get().to(my_saved)))
            .service(web::resource("/jobs").route(web::get().to(list_jobs)))
            .service(web::resource("/jobs/countries").route(web::get().to(job_countries))),
    );
    // provider-facing, kept outside the versioned API
    cfg.route("/api/webhooks/identity", web::post().to(webhook::identity_webhook));
}

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repo>,
    pub jobs: Arc<JobBoard>,
    pub webhook_secret: Option<String>,
}

/// `?q&filter&page&page_size`
#[derive(Debug, Deserialize)]
pub struct ListQuery<F> {
    pub q: Option<String>,
    pub filter: Option<F>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

impl<F> ListQuery<F> {
    fn page(&self) -> PageRequest {
        PageRequest::new(self.page, self.page_size)
    }
}

/// `?q&page&page_size`
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct TopTagsQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct JobParams {
    pub q: Option<String>,
    pub filter: Option<JobFilter>,
    pub location: Option<String>,
    #[serde(default)]
    pub remote: bool,
    #[serde(default)]
    pub wage: bool,
    #[serde(default)]
    pub skills: bool,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

async fn caller(data: &AppState, auth: &Auth) -> Result<User, ApiError> {
    actions::current_user(&*data.repo, auth.clerk_id()).await
}

// ---------------- Questions ----------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/questions",
    params(
        ("q" = Option<String>, Query, description = "Search title and content"),
        ("filter" = Option<HomeFilter>, Query, description = "newest | frequent | unanswered | recommended"),
        ("page" = Option<u64>, Query, description = "1-based page"),
        ("page_size" = Option<u64>, Query, description = "1..=50, default 10")
    ),
    responses((status = 200, description = "Question page", body = QuestionList))
)]
pub async fn list_questions(
    data: web::Data<AppState>,
    query: web::Query<ListQuery<HomeFilter>>,
) -> Result<HttpResponse, ApiError> {
    let query = query.into_inner();
    let page = query.page();
    let list = question::list_home(
        &*data.repo,
        question::HomeQuery { search: query.q, filter: query.filter, page },
    )
    .await?;
    Ok(HttpResponse::Ok().json(list))
}

#[utoipa::path(
    post,
    path = "/api/v1/questions",
    request_body = QuestionForm,
    responses(
        (status = 201, description = "Question created", body = QuestionView),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Authorization required")
    )
)]
pub async fn create_question(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<QuestionForm>,
) -> Result<HttpResponse, ApiError> {
    let me = caller(&data, &auth).await?;
    let created = question::create(&*data.repo, &me, payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(created))
}

#[utoipa::path(
    get,
    path = "/api/v1/questions/hot",
    responses((status = 200, description = "Top questions by views, then upvotes", body = [QuestionRef]))
)]
pub async fn hot_questions(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(question::hot(&*data.repo).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/questions/{id}",
    params(("id" = String, Path, description = "Question id")),
    responses(
        (status = 200, description = "Question with viewer state", body = QuestionDetail),
        (status = 404, description = "Question not found")
    )
)]
pub async fn get_question(
    auth: Option<Auth>,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    // a token whose user has not been synced yet reads anonymously
    let viewer = match auth {
        Some(a) => caller(&data, &a).await.ok(),
        None => None,
    };
    let detail = question::get_detail(&*data.repo, &path.into_inner(), viewer.as_ref()).await?;
    Ok(HttpResponse::Ok().json(detail))
}

#[utoipa::path(
    patch,
    path = "/api/v1/questions/{id}",
    params(("id" = String, Path, description = "Question id")),
    request_body = EditQuestionForm,
    responses(
        (status = 200, description = "Question updated", body = QuestionView),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Question not found")
    )
)]
pub async fn edit_question(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<EditQuestionForm>,
) -> Result<HttpResponse, ApiError> {
    let me = caller(&data, &auth).await?;
    let updated = question::edit(&*data.repo, &path.into_inner(), &me, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(updated))
}

#[utoipa::path(
    delete,
    path = "/api/v1/questions/{id}",
    params(("id" = String, Path, description = "Question id")),
    responses(
        (status = 204, description = "Question and its dependents removed"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Question not found")
    )
)]
pub async fn delete_question(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let me = caller(&data, &auth).await?;
    question::delete(&*data.repo, &path.into_inner(), &me).await?;
    Ok(HttpResponse::NoContent().finish())
}

async fn vote_question(
    auth: Auth,
    data: web::Data<AppState>,
    id: String,
    direction: VoteDirection,
) -> Result<HttpResponse, ApiError> {
    let me = caller(&data, &auth).await?;
    let summary = question::cast_vote(&*data.repo, &id, &me, direction).await?;
    Ok(HttpResponse::Ok().json(summary))
}

#[utoipa::path(
    post,
    path = "/api/v1/questions/{id}/upvote",
    params(("id" = String, Path, description = "Question id")),
    responses((status = 200, description = "Vote toggled", body = VoteSummary))
)]
pub async fn upvote_question(auth: Auth, data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    vote_question(auth, data, path.into_inner(), VoteDirection::Up).await
}

#[utoipa::path(
    post,
    path = "/api/v1/questions/{id}/downvote",
    params(("id" = String, Path, description = "Question id")),
    responses((status = 200, description = "Vote toggled", body = VoteSummary))
)]
pub async fn downvote_question(auth: Auth, data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    vote_question(auth, data, path.into_inner(), VoteDirection::Down).await
}

#[utoipa::path(
    post,
    path = "/api/v1/questions/{id}/save",
    params(("id" = String, Path, description = "Question id")),
    responses((status = 200, description = "Saved flag after the toggle", body = SaveState))
)]
pub async fn save_question(auth: Auth, data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let me = caller(&data, &auth).await?;
    let state = user::toggle_save(&*data.repo, &me, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(state))
}

// ---------------- Answers ------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/questions/{id}/answers",
    params(
        ("id" = String, Path, description = "Question id"),
        ("filter" = Option<AnswerFilter>, Query, description = "highest_upvotes | lowest_upvotes | recent | old"),
        ("page" = Option<u64>, Query, description = "1-based page")
    ),
    responses((status = 200, description = "Answer page", body = AnswerList))
)]
pub async fn list_answers(
    data: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<ListQuery<AnswerFilter>>,
) -> Result<HttpResponse, ApiError> {
    let list = answer::list_for_question(&*data.repo, &path.into_inner(), query.filter, query.page()).await?;
    Ok(HttpResponse::Ok().json(list))
}

#[utoipa::path(
    post,
    path = "/api/v1/questions/{id}/answers",
    params(("id" = String, Path, description = "Question id")),
    request_body = AnswerForm,
    responses(
        (status = 201, description = "Answer created", body = AnswerView),
        (status = 404, description = "Question not found")
    )
)]
pub async fn create_answer(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<AnswerForm>,
) -> Result<HttpResponse, ApiError> {
    let me = caller(&data, &auth).await?;
    let created = answer::create(&*data.repo, &path.into_inner(), &me, payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(created))
}

#[utoipa::path(
    get,
    path = "/api/v1/answers/{id}",
    params(("id" = String, Path, description = "Answer id")),
    responses(
        (status = 200, description = "Answer", body = AnswerView),
        (status = 404, description = "Answer not found")
    )
)]
pub async fn get_answer(data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(answer::get(&*data.repo, &path.into_inner()).await?))
}

#[utoipa::path(
    patch,
    path = "/api/v1/answers/{id}",
    params(("id" = String, Path, description = "Answer id")),
    request_body = AnswerForm,
    responses(
        (status = 200, description = "Answer updated", body = AnswerView),
        (status = 403, description = "Not the author")
    )
)]
pub async fn edit_answer(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<AnswerForm>,
) -> Result<HttpResponse, ApiError> {
    let me = caller(&data, &auth).await?;
    let updated = answer::edit(&*data.repo, &path.into_inner(), &me, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(updated))
}

#[utoipa::path(
    delete,
    path = "/api/v1/answers/{id}",
    params(("id" = String, Path, description = "Answer id")),
    responses(
        (status = 204, description = "Answer removed"),
        (status = 403, description = "Not the author")
    )
)]
pub async fn delete_answer(auth: Auth, data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let me = caller(&data, &auth).await?;
    answer::delete(&*data.repo, &path.into_inner(), &me).await?;
    Ok(HttpResponse::NoContent().finish())
}

async fn vote_answer(
    auth: Auth,
    data: web::Data<AppState>,
    id: String,
    direction: VoteDirection,
) -> Result<HttpResponse, ApiError> {
    let me = caller(&data, &auth).await?;
    let summary = answer::cast_vote(&*data.repo, &id, &me, direction).await?;
    Ok(HttpResponse::Ok().json(summary))
}

#[utoipa::path(
    post,
    path = "/api/v1/answers/{id}/upvote",
    params(("id" = String, Path, description = "Answer id")),
    responses((status = 200, description = "Vote toggled", body = VoteSummary))
)]
pub async fn upvote_answer(auth: Auth, data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    vote_answer(auth, data, path.into_inner(), VoteDirection::Up).await
}

#[utoipa::path(
    post,
    path = "/api/v1/answers/{id}/downvote",
    params(("id" = String, Path, description = "Answer id")),
    responses((status = 200, description = "Vote toggled", body = VoteSummary))
)]
pub async fn downvote_answer(auth: Auth, data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    vote_answer(auth, data, path.into_inner(), VoteDirection::Down).await
}

// ---------------- Tags ---------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/tags",
    params(
        ("q" = Option<String>, Query, description = "Search tag names"),
        ("filter" = Option<TagFilter>, Query, description = "popular | recent | name | old"),
        ("page" = Option<u64>, Query, description = "1-based page")
    ),
    responses((status = 200, description = "Tag page", body = TagList))
)]
pub async fn list_tags(data: web::Data<AppState>, query: web::Query<ListQuery<TagFilter>>) -> Result<HttpResponse, ApiError> {
    let query = query.into_inner();
    let page = query.page();
    Ok(HttpResponse::Ok().json(tag::list(&*data.repo, query.q, query.filter, page).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/tags/popular",
    responses((status = 200, description = "Tags with the most questions", body = [PopularTag]))
)]
pub async fn popular_tags(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(tag::popular(&*data.repo).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/tags/{id}/questions",
    params(
        ("id" = String, Path, description = "Tag id"),
        ("q" = Option<String>, Query, description = "Search question titles"),
        ("page" = Option<u64>, Query, description = "1-based page")
    ),
    responses(
        (status = 200, description = "Questions under the tag", body = TagQuestions),
        (status = 404, description = "Tag not found")
    )
)]
pub async fn tag_questions(
    data: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse, ApiError> {
    let query = query.into_inner();
    let page = PageRequest::new(query.page, query.page_size);
    Ok(HttpResponse::Ok().json(tag::questions(&*data.repo, &path.into_inner(), query.q, page).await?))
}

// ---------------- Users --------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/users",
    params(
        ("q" = Option<String>, Query, description = "Search name and username"),
        ("filter" = Option<UserFilter>, Query, description = "new_users | old_users | top_contributors"),
        ("page" = Option<u64>, Query, description = "1-based page")
    ),
    responses((status = 200, description = "User page", body = UserList))
)]
pub async fn list_users(data: web::Data<AppState>, query: web::Query<ListQuery<UserFilter>>) -> Result<HttpResponse, ApiError> {
    let query = query.into_inner();
    let page = query.page();
    Ok(HttpResponse::Ok().json(user::list(&*data.repo, query.q, query.filter, page).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{clerk_id}",
    params(("clerk_id" = String, Path, description = "Identity-provider user id")),
    responses(
        (status = 200, description = "Profile with totals", body = UserInfo),
        (status = 404, description = "User not found")
    )
)]
pub async fn user_info(data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(user::info(&*data.repo, &path.into_inner()).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{clerk_id}/questions",
    params(
        ("clerk_id" = String, Path, description = "Identity-provider user id"),
        ("page" = Option<u64>, Query, description = "1-based page")
    ),
    responses((status = 200, description = "The user's questions", body = UserQuestions))
)]
pub async fn user_questions(
    data: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse, ApiError> {
    let page = PageRequest::new(query.page, query.page_size);
    Ok(HttpResponse::Ok().json(user::questions(&*data.repo, &path.into_inner(), page).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{clerk_id}/answers",
    params(
        ("clerk_id" = String, Path, description = "Identity-provider user id"),
        ("page" = Option<u64>, Query, description = "1-based page")
    ),
    responses((status = 200, description = "The user's answers", body = UserAnswers))
)]
pub async fn user_answers(
    data: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse, ApiError> {
    let page = PageRequest::new(query.page, query.page_size);
    Ok(HttpResponse::Ok().json(user::answers(&*data.repo, &path.into_inner(), page).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{clerk_id}/top-tags",
    params(
        ("clerk_id" = String, Path, description = "Identity-provider user id"),
        ("limit" = Option<usize>, Query, description = "Default 3")
    ),
    responses((status = 200, description = "Most used tags", body = [PopularTag]))
)]
pub async fn user_top_tags(
    data: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<TopTagsQuery>,
) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(tag::top_interacted(&*data.repo, &path.into_inner(), query.limit).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/me",
    responses(
        (status = 200, description = "Caller's user document", body = User),
        (status = 401, description = "Authorization required")
    )
)]
pub async fn me(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(caller(&data, &auth).await?))
}

#[utoipa::path(
    patch,
    path = "/api/v1/me",
    request_body = ProfileForm,
    responses(
        (status = 200, description = "Profile updated", body = User),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Username taken")
    )
)]
pub async fn update_me(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<ProfileForm>,
) -> Result<HttpResponse, ApiError> {
    let current = caller(&data, &auth).await?;
    let updated = user::update_profile(&*data.repo, &current, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(updated))
}

#[utoipa::path(
    get,
    path = "/api/v1/me/saved",
    params(
        ("q" = Option<String>, Query, description = "Search question titles"),
        ("filter" = Option<CollectionFilter>, Query, description = "most_recent | oldest | most_voted | most_viewed | most_answered"),
        ("page" = Option<u64>, Query, description = "1-based page")
    ),
    responses((status = 200, description = "Saved questions", body = QuestionList))
)]
pub async fn my_saved(
    auth: Auth,
    data: web::Data<AppState>,
    query: web::Query<ListQuery<CollectionFilter>>,
) -> Result<HttpResponse, ApiError> {
    let current = caller(&data, &auth).await?;
    let query = query.into_inner();
    let page = query.page();
    Ok(HttpResponse::Ok().json(user::saved(&*data.repo, &current, query.q, query.filter, page).await?))
}

// ---------------- Jobs ---------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/jobs",
    params(
        ("q" = Option<String>, Query, description = "Title substring"),
        ("filter" = Option<JobFilter>, Query, description = "fulltime | parttime | contractor | intern"),
        ("location" = Option<String>, Query, description = "Country substring"),
        ("remote" = Option<bool>, Query, description = "Remote only"),
        ("wage" = Option<bool>, Query, description = "Only listings with a salary range"),
        ("skills" = Option<bool>, Query, description = "Only listings with required skills"),
        ("page" = Option<u64>, Query, description = "1-based page")
    ),
    responses((status = 200, description = "Job page", body = crate::jobs::JobList))
)]
pub async fn list_jobs(data: web::Data<AppState>, query: web::Query<JobParams>) -> Result<HttpResponse, ApiError> {
    let p = query.into_inner();
    let q = JobQuery {
        search: p.q,
        filter: p.filter,
        location: p.location,
        remote: p.remote,
        wage: p.wage,
        skills: p.skills,
        page: PageRequest::new(p.page, p.page_size),
    };
    Ok(HttpResponse::Ok().json(data.jobs.search(&q)?))
}

#[utoipa::path(
    get,
    path = "/api/v1/jobs/countries",
    responses((status = 200, description = "Country filter options", body = [crate::jobs::CountryOption]))
)]
pub async fn job_countries(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(data.jobs.countries()?))
}
