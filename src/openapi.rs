use crate::jobs::{CountryOption, Job, JobFilter, JobList};
use crate::models::*;
use crate::webhook::WebhookEvent;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::list_questions,
        crate::routes::create_question,
        crate::routes::hot_questions,
        crate::routes::get_question,
        crate::routes::edit_question,
        crate::routes::delete_question,
        crate::routes::upvote_question,
        crate::routes::downvote_question,
        crate::routes::save_question,
        crate::routes::list_answers,
        crate::routes::create_answer,
        crate::routes::get_answer,
        crate::routes::edit_answer,
        crate::routes::delete_answer,
        crate::routes::upvote_answer,
        crate::routes::downvote_answer,
        crate::routes::list_tags,
        crate::routes::popular_tags,
        crate::routes::tag_questions,
        crate::routes::list_users,
        crate::routes::user_info,
        crate::routes::user_questions,
        crate::routes::user_answers,
        crate::routes::user_top_tags,
        crate::routes::me,
        crate::routes::update_me,
        crate::routes::my_saved,
        crate::routes::list_jobs,
        crate::routes::job_countries,
        crate::webhook::identity_webhook,
    ),
    components(schemas(
        User, Question, Answer, Tag, Interaction, InteractionKind,
        QuestionForm, EditQuestionForm, AnswerForm, ProfileForm,
        TagRef, AuthorRef, QuestionRef, QuestionView, AnswerView, ViewerState, QuestionDetail, PopularTag,
        QuestionList, AnswerList, TagList, UserList, TagQuestions, UserQuestions, UserAnswers, UserInfo,
        VoteSummary, SaveState,
        HomeFilter, CollectionFilter, AnswerFilter, TagFilter, UserFilter,
        Job, JobFilter, JobList, CountryOption, WebhookEvent,
    )),
    tags(
        (name = "questions", description = "Questions, votes and saves"),
        (name = "answers", description = "Answers and votes"),
        (name = "community", description = "Tags, users and jobs"),
    )
)]
pub struct ApiDoc;
