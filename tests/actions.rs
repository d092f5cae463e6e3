#![cfg(feature = "inmem-store")]

use devflow::actions::{self, answer, question, tag, user};
use devflow::error::ApiError;
use devflow::models::*;
use devflow::repo::inmem::InMemRepo;
use devflow::repo::{InteractionRepo, PageRequest, QuestionRepo, Repo, TagQuery, TagRepo, UserRepo};

fn body() -> String {
    "This paragraph is deliberately long enough to pass the minimum content length check for posts. ".repeat(2)
}

async fn member(r: &dyn Repo, handle: &str) -> User {
    user::create(
        r,
        NewUser {
            clerk_id: format!("clerk_{handle}"),
            name: format!("{handle} tester"),
            username: format!("{handle}_user"),
            email: format!("{handle}@example.com"),
            picture: "https://img.example.com/a.png".into(),
        },
    )
    .await
    .unwrap()
}

async fn ask(r: &dyn Repo, author: &User, title: &str, tags: &[&str]) -> QuestionView {
    question::create(
        r,
        author,
        QuestionForm { title: title.into(), content: body(), tags: tags.iter().map(|t| t.to_string()).collect() },
    )
    .await
    .unwrap()
}

async fn reputation(r: &dyn Repo, u: &User) -> i64 {
    r.get_user(&u.id).await.unwrap().reputation
}

#[tokio::test]
async fn voting_is_a_strict_toggle() {
    let store = InMemRepo::ephemeral();
    let r: &dyn Repo = &store;
    let alice = member(r, "alice").await;
    let bob = member(r, "bob").await;
    let q = ask(r, &alice, "How do lifetimes work?", &["rust"]).await;

    let s = question::cast_vote(r, &q.id, &bob, VoteDirection::Up).await.unwrap();
    assert_eq!((s.upvotes, s.downvotes), (1, 0));
    assert!(s.has_upvoted);

    // down while up: moves across in one step
    let s = question::cast_vote(r, &q.id, &bob, VoteDirection::Down).await.unwrap();
    assert_eq!((s.upvotes, s.downvotes), (0, 1));
    assert!(s.has_downvoted && !s.has_upvoted);

    // same direction again withdraws
    let s = question::cast_vote(r, &q.id, &bob, VoteDirection::Down).await.unwrap();
    assert_eq!((s.upvotes, s.downvotes), (0, 0));

    let stored = r.get_question(&q.id).await.unwrap();
    assert!(stored.up_votes.is_empty() && stored.down_votes.is_empty());
}

#[tokio::test]
async fn answer_votes_follow_the_same_rules() {
    let store = InMemRepo::ephemeral();
    let r: &dyn Repo = &store;
    let alice = member(r, "alice").await;
    let bob = member(r, "bob").await;
    let q = ask(r, &alice, "Borrow checker error", &["rust"]).await;
    let a = answer::create(r, &q.id, &bob, AnswerForm { content: body() }).await.unwrap();

    let s = answer::cast_vote(r, &a.id, &alice, VoteDirection::Down).await.unwrap();
    assert_eq!((s.upvotes, s.downvotes), (0, 1));
    let s = answer::cast_vote(r, &a.id, &alice, VoteDirection::Up).await.unwrap();
    assert_eq!((s.upvotes, s.downvotes), (1, 0));
}

#[tokio::test]
async fn tags_are_shared_case_insensitively() {
    let store = InMemRepo::ephemeral();
    let r: &dyn Repo = &store;
    let alice = member(r, "alice").await;

    let first = ask(r, &alice, "React hooks question", &["React", "react", "hooks"]).await;
    assert_eq!(first.tags.len(), 2);
    assert_eq!(first.tags[0].name, "React");

    let second = ask(r, &alice, "Another react question", &["react"]).await;
    assert_eq!(second.tags[0].id, first.tags[0].id);

    let all = r.list_tags(&TagQuery::default()).await.unwrap();
    assert_eq!(all.total, 2);
    let react = r.get_tag(&first.tags[0].id).await.unwrap();
    assert_eq!(react.name, "React");
    assert_eq!(react.questions, vec![first.id.clone(), second.id.clone()]);
}

#[tokio::test]
async fn is_next_reflects_remaining_matches() {
    let store = InMemRepo::ephemeral();
    let r: &dyn Repo = &store;
    let alice = member(r, "alice").await;
    for i in 0..12 {
        ask(r, &alice, &format!("Question number {i}"), &["paging"]).await;
    }

    let first = question::list_home(r, question::HomeQuery { page: PageRequest::new(Some(1), None), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(first.questions.len(), 10);
    assert!(first.is_next);
    // newest first
    assert_eq!(first.questions[0].title, "Question number 11");

    let second = question::list_home(r, question::HomeQuery { page: PageRequest::new(Some(2), None), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(second.questions.len(), 2);
    assert!(!second.is_next);

    let searched = question::list_home(
        r,
        question::HomeQuery { search: Some("NUMBER 1".into()), ..Default::default() },
    )
    .await
    .unwrap();
    // 1, 10, 11
    assert_eq!(searched.questions.len(), 3);
    assert!(!searched.is_next);
}

#[tokio::test]
async fn unanswered_filter_skips_answered_questions() {
    let store = InMemRepo::ephemeral();
    let r: &dyn Repo = &store;
    let alice = member(r, "alice").await;
    let bob = member(r, "bob").await;
    let answered = ask(r, &alice, "Answered question", &["x"]).await;
    let open = ask(r, &alice, "Open question here", &["x"]).await;
    answer::create(r, &answered.id, &bob, AnswerForm { content: body() }).await.unwrap();

    let list = question::list_home(
        r,
        question::HomeQuery { filter: Some(HomeFilter::Unanswered), ..Default::default() },
    )
    .await
    .unwrap();
    let ids: Vec<&str> = list.questions.iter().map(|q| q.id.as_str()).collect();
    assert_eq!(ids, vec![open.id.as_str()]);
}

#[tokio::test]
async fn deleting_a_question_removes_its_dependents() {
    let store = InMemRepo::ephemeral();
    let r: &dyn Repo = &store;
    let alice = member(r, "alice").await;
    let bob = member(r, "bob").await;
    let q = ask(r, &alice, "Doomed question", &["cleanup"]).await;
    let a = answer::create(r, &q.id, &bob, AnswerForm { content: body() }).await.unwrap();
    user::toggle_save(r, &bob, &q.id).await.unwrap();

    // only the author may delete
    let err = question::delete(r, &q.id, &bob).await.unwrap_err();
    assert!(matches!(err, ApiError::Forbidden));

    question::delete(r, &q.id, &alice).await.unwrap();

    assert!(matches!(answer::get(r, &a.id).await.unwrap_err(), ApiError::NotFound("answer")));
    let tag = r.get_tag(&q.tags[0].id).await.unwrap();
    assert!(tag.questions.is_empty());
    assert!(r.get_user(&bob.id).await.unwrap().saved.is_empty());
    assert!(r.interactions_for_user(&bob.id).await.unwrap().is_empty());
    assert!(r.interactions_for_user(&alice.id).await.unwrap().is_empty());
    let err = question::get_detail(r, &q.id, None).await.unwrap_err();
    assert_eq!(err.to_string(), "question not found");
}

#[tokio::test]
async fn reputation_moves_by_fixed_amounts() {
    let store = InMemRepo::ephemeral();
    let r: &dyn Repo = &store;
    let alice = member(r, "alice").await;

    // +5 for asking, +3 for each of two new tags
    let q1 = ask(r, &alice, "First question", &["rust", "async"]).await;
    assert_eq!(reputation(r, &alice).await, 11);

    // only "tokio" is new
    ask(r, &alice, "Second question", &["RUST", "tokio"]).await;
    assert_eq!(reputation(r, &alice).await, 19);

    question::delete(r, &q1.id, &alice).await.unwrap();
    assert_eq!(reputation(r, &alice).await, 14);
}

#[tokio::test]
async fn views_count_every_load_but_log_once() {
    let store = InMemRepo::ephemeral();
    let r: &dyn Repo = &store;
    let alice = member(r, "alice").await;
    let bob = member(r, "bob").await;
    let q = ask(r, &alice, "Viewed question", &["views"]).await;

    for _ in 0..3 {
        question::get_detail(r, &q.id, Some(&bob)).await.unwrap();
    }
    let detail = question::get_detail(r, &q.id, None).await.unwrap();
    assert_eq!(detail.question.views, 4);
    assert!(detail.viewer.is_none());

    let views: Vec<_> = r
        .interactions_for_user(&bob.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|i| i.action == InteractionKind::View)
        .collect();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].tags, vec![q.tags[0].id.clone()]);
}

#[tokio::test]
async fn detail_reports_viewer_state() {
    let store = InMemRepo::ephemeral();
    let r: &dyn Repo = &store;
    let alice = member(r, "alice").await;
    let bob = member(r, "bob").await;
    let q = ask(r, &alice, "Stateful question", &["state"]).await;

    question::cast_vote(r, &q.id, &bob, VoteDirection::Up).await.unwrap();
    assert!(user::toggle_save(r, &bob, &q.id).await.unwrap().saved);
    let bob = actions::current_user(r, &bob.clerk_id).await.unwrap();

    let viewer = question::get_detail(r, &q.id, Some(&bob)).await.unwrap().viewer.unwrap();
    assert!(viewer.has_upvoted && viewer.has_saved && !viewer.has_downvoted);
}

#[tokio::test]
async fn save_toggles_and_lists() {
    let store = InMemRepo::ephemeral();
    let r: &dyn Repo = &store;
    let alice = member(r, "alice").await;
    let q1 = ask(r, &alice, "Saved alpha", &["s"]).await;
    let q2 = ask(r, &alice, "Saved beta", &["s"]).await;

    assert!(user::toggle_save(r, &alice, &q1.id).await.unwrap().saved);
    assert!(user::toggle_save(r, &alice, &q2.id).await.unwrap().saved);
    assert!(!user::toggle_save(r, &alice, &q2.id).await.unwrap().saved);
    assert!(user::toggle_save(r, &alice, &q2.id).await.unwrap().saved);

    let alice = actions::current_user(r, &alice.clerk_id).await.unwrap();
    let list = user::saved(r, &alice, None, Some(CollectionFilter::Oldest), PageRequest::default()).await.unwrap();
    let titles: Vec<&str> = list.questions.iter().map(|q| q.title.as_str()).collect();
    assert_eq!(titles, vec!["Saved alpha", "Saved beta"]);

    let searched = user::saved(r, &alice, Some("beta".into()), None, PageRequest::default()).await.unwrap();
    assert_eq!(searched.questions.len(), 1);

    let err = user::toggle_save(r, &alice, "missing").await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound("question")));
}

#[tokio::test]
async fn only_authors_edit() {
    let store = InMemRepo::ephemeral();
    let r: &dyn Repo = &store;
    let alice = member(r, "alice").await;
    let bob = member(r, "bob").await;
    let q = ask(r, &alice, "Original title", &["edit"]).await;

    let form = EditQuestionForm { title: "Better title".into(), content: body() };
    assert!(matches!(question::edit(r, &q.id, &bob, form.clone()).await, Err(ApiError::Forbidden)));
    let edited = question::edit(r, &q.id, &alice, form).await.unwrap();
    assert_eq!(edited.title, "Better title");
    assert_eq!(edited.tags.len(), 1);

    let a = answer::create(r, &q.id, &bob, AnswerForm { content: body() }).await.unwrap();
    let new_body = format!("{} edited", body());
    assert!(matches!(
        answer::edit(r, &a.id, &alice, AnswerForm { content: new_body.clone() }).await,
        Err(ApiError::Forbidden)
    ));
    assert_eq!(answer::edit(r, &a.id, &bob, AnswerForm { content: new_body.clone() }).await.unwrap().content, new_body);
}

#[tokio::test]
async fn short_content_is_rejected() {
    let store = InMemRepo::ephemeral();
    let r: &dyn Repo = &store;
    let alice = member(r, "alice").await;
    let err = question::create(
        r,
        &alice,
        QuestionForm { title: "Short".into(), content: "too short".into(), tags: vec!["x".into()] },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));

    let err = question::create(
        r,
        &alice,
        QuestionForm { title: "Valid title".into(), content: body(), tags: vec!["a-tag-that-is-way-too-long".into()] },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));
}

#[tokio::test]
async fn answer_lifecycle_links_and_unlinks() {
    let store = InMemRepo::ephemeral();
    let r: &dyn Repo = &store;
    let alice = member(r, "alice").await;
    let bob = member(r, "bob").await;
    let q = ask(r, &alice, "Answer lifecycle", &["life"]).await;

    let a1 = answer::create(r, &q.id, &bob, AnswerForm { content: body() }).await.unwrap();
    let a2 = answer::create(r, &q.id, &alice, AnswerForm { content: body() }).await.unwrap();
    assert_eq!(a1.question.as_ref().unwrap().title, "Answer lifecycle");
    answer::cast_vote(r, &a2.id, &bob, VoteDirection::Up).await.unwrap();

    let list = answer::list_for_question(r, &q.id, Some(AnswerFilter::HighestUpvotes), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(list.answers[0].id, a2.id);
    assert_eq!(list.answers.len(), 2);

    let kinds: Vec<InteractionKind> =
        r.interactions_for_user(&bob.id).await.unwrap().into_iter().map(|i| i.action).collect();
    assert_eq!(kinds, vec![InteractionKind::Answer]);

    answer::delete(r, &a1.id, &bob).await.unwrap();
    assert_eq!(r.get_question(&q.id).await.unwrap().answers, vec![a2.id.clone()]);
    assert!(r.interactions_for_user(&bob.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn deleting_a_user_cascades() {
    let store = InMemRepo::ephemeral();
    let r: &dyn Repo = &store;
    let alice = member(r, "alice").await;
    let bob = member(r, "bob").await;
    let alices = ask(r, &alice, "Alice question", &["a"]).await;
    let bobs = ask(r, &bob, "Bob question", &["b"]).await;
    answer::create(r, &alices.id, &bob, AnswerForm { content: body() }).await.unwrap();
    let kept = answer::create(r, &bobs.id, &alice, AnswerForm { content: body() }).await.unwrap();

    user::delete(r, &bob.clerk_id).await.unwrap();

    assert!(matches!(actions::current_user(r, &bob.clerk_id).await, Err(ApiError::NotFound("user"))));
    assert!(r.get_question(&bobs.id).await.is_err());
    // alice's answer lived under bob's question
    assert!(answer::get(r, &kept.id).await.is_err());
    assert!(r.get_question(&alices.id).await.unwrap().answers.is_empty());
    assert!(r.interactions_for_user(&bob.id).await.unwrap().is_empty());

    let info = user::info(r, &alice.clerk_id).await.unwrap();
    assert_eq!((info.total_questions, info.total_answers), (1, 0));
}

#[tokio::test]
async fn top_tags_and_popular_tags() {
    let store = InMemRepo::ephemeral();
    let r: &dyn Repo = &store;
    let alice = member(r, "alice").await;
    let bob = member(r, "bob").await;
    ask(r, &alice, "Rust one", &["rust", "web"]).await;
    ask(r, &alice, "Rust two", &["rust", "cli"]).await;
    ask(r, &alice, "Rust three", &["rust", "web"]).await;
    ask(r, &bob, "Go one", &["go"]).await;

    let top = tag::top_interacted(r, &alice.clerk_id, None).await.unwrap();
    let names: Vec<(&str, u64)> = top.iter().map(|t| (t.name.as_str(), t.question_count)).collect();
    assert_eq!(names, vec![("rust", 3), ("web", 2), ("cli", 1)]);

    let one = tag::top_interacted(r, &alice.clerk_id, Some(1)).await.unwrap();
    assert_eq!(one.len(), 1);

    let popular = tag::popular(r).await.unwrap();
    assert_eq!(popular[0].name, "rust");
    assert_eq!(popular.len(), 4);

    let under = tag::questions(r, &popular[0].id, Some("two".into()), PageRequest::default()).await.unwrap();
    assert_eq!(under.tag_title, "rust");
    assert_eq!(under.questions.len(), 1);
    assert!(!under.is_next);
}

#[tokio::test]
async fn profile_and_user_listings() {
    let store = InMemRepo::ephemeral();
    let r: &dyn Repo = &store;
    let alice = member(r, "alice").await;
    let bob = member(r, "bob").await;
    ask(r, &bob, "Reputation builder", &["rep"]).await;

    let updated = user::update_profile(
        r,
        &alice,
        ProfileForm {
            name: "Alice Liddell".into(),
            username: "alice_l".into(),
            bio: Some("Curious about everything".into()),
            portfolio_website: Some("".into()),
            location: Some("Oxford, UK".into()),
            onboarded: Some(true),
        },
    )
    .await
    .unwrap();
    assert_eq!(updated.username, "alice_l");
    assert!(updated.onboarded);
    assert_eq!(updated.portfolio_website, None);

    let bad = user::update_profile(
        r,
        &alice,
        ProfileForm {
            name: "Alice Liddell".into(),
            username: "alice_l".into(),
            bio: None,
            portfolio_website: Some("not a url".into()),
            location: None,
            onboarded: None,
        },
    )
    .await;
    assert!(matches!(bad, Err(ApiError::Validation(_))));

    // blank or omitted optional fields clear what was stored
    let cleared = user::update_profile(
        r,
        &alice,
        ProfileForm {
            name: "Alice Liddell".into(),
            username: "alice_l".into(),
            bio: Some("   ".into()),
            portfolio_website: None,
            location: None,
            onboarded: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(cleared.bio, None);
    assert_eq!(cleared.location, None);
    assert!(cleared.onboarded);
    assert_eq!(r.get_user(&alice.id).await.unwrap().bio, None);

    let top = user::list(r, None, Some(UserFilter::TopContributors), PageRequest::default()).await.unwrap();
    assert_eq!(top.users[0].id, bob.id);

    let found = user::list(r, Some("LIDDELL".into()), None, PageRequest::default()).await.unwrap();
    assert_eq!(found.users.len(), 1);

    let qs = user::questions(r, &bob.clerk_id, PageRequest::default()).await.unwrap();
    assert_eq!(qs.total_questions, 1);
    assert_eq!(qs.questions[0].author.as_ref().unwrap().clerk_id, bob.clerk_id);
}

#[tokio::test]
async fn hot_questions_rank_by_views() {
    let store = InMemRepo::ephemeral();
    let r: &dyn Repo = &store;
    let alice = member(r, "alice").await;
    let quiet = ask(r, &alice, "Quiet question", &["h"]).await;
    let busy = ask(r, &alice, "Busy question", &["h"]).await;
    for _ in 0..3 {
        question::get_detail(r, &busy.id, None).await.unwrap();
    }
    question::get_detail(r, &quiet.id, None).await.unwrap();

    let hot = question::hot(r).await.unwrap();
    assert_eq!(hot[0].id, busy.id);
    assert_eq!(hot.len(), 2);
}
