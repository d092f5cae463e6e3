#![cfg(feature = "inmem-store")]

use devflow::models::{NewInteraction, NewQuestion, NewUser, InteractionKind, UpdateUser, VoteChange};
use devflow::repo::{inmem::InMemRepo, PageRequest, QuestionQuery, QuestionSort, RepoError};
// Bring trait method namespaces into scope so calls on InMemRepo resolve.
use devflow::repo::{InteractionRepo, QuestionRepo, TagRepo, UserRepo};

/// Helper that returns a fresh, empty repository for every test run.
fn repo() -> InMemRepo {
    InMemRepo::ephemeral()
}

fn new_user(handle: &str) -> NewUser {
    NewUser {
        clerk_id: format!("clerk_{handle}"),
        name: handle.into(),
        username: handle.into(),
        email: format!("{handle}@example.com"),
        picture: String::new(),
    }
}

fn new_question(title: &str, author: &str) -> NewQuestion {
    NewQuestion { title: title.into(), content: "body".into(), author: author.into() }
}

#[tokio::test]
async fn user_uniqueness_and_update() {
    let r = repo();
    let u = r.create_user(new_user("ada")).await.unwrap();
    assert_eq!(u.reputation, 0);
    assert!(!u.onboarded);

    // same username → conflict
    let mut dup = new_user("grace");
    dup.username = "ada".into();
    assert!(matches!(r.create_user(dup).await.unwrap_err(), RepoError::Conflict));

    r.create_user(new_user("grace")).await.unwrap();
    let err = r
        .update_user("clerk_grace", UpdateUser { email: Some("ada@example.com".into()), ..Default::default() })
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::Conflict));

    let updated = r
        .update_user("clerk_ada", UpdateUser { bio: Some(Some("Analytical".into())), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(updated.bio.as_deref(), Some("Analytical"));
    assert_eq!(updated.username, "ada");

    assert!(matches!(r.update_user("nobody", UpdateUser::default()).await.unwrap_err(), RepoError::NotFound));
}

#[tokio::test]
async fn tag_upsert_is_case_insensitive_and_idempotent() {
    let r = repo();
    let (react, created) = r.upsert_tag("React", "q1").await.unwrap();
    assert!(created);
    let (again, created) = r.upsert_tag("react", "q2").await.unwrap();
    assert!(!created);
    assert_eq!(again.id, react.id);
    assert_eq!(again.name, "React");

    // linking the same question twice keeps one reference
    let (again, _) = r.upsert_tag("REACT", "q2").await.unwrap();
    assert_eq!(again.questions, vec!["q1".to_string(), "q2".to_string()]);

    r.pull_question_from_tags("q1").await.unwrap();
    assert_eq!(r.get_tag(&react.id).await.unwrap().questions, vec!["q2".to_string()]);
}

#[tokio::test]
async fn vote_changes_apply_as_set_operations() {
    let r = repo();
    let q = r.insert_question(new_question("Vote target", "author")).await.unwrap();

    let add_up = VoteChange { add_up: true, ..Default::default() };
    r.vote_question(&q.id, "u1", add_up).await.unwrap();
    // add-to-set: no duplicate entry
    let q2 = r.vote_question(&q.id, "u1", add_up).await.unwrap();
    assert_eq!(q2.up_votes, vec!["u1".to_string()]);

    let flip = VoteChange { pull_up: true, add_down: true, ..Default::default() };
    let q3 = r.vote_question(&q.id, "u1", flip).await.unwrap();
    assert!(q3.up_votes.is_empty());
    assert_eq!(q3.down_votes, vec!["u1".to_string()]);

    assert!(matches!(r.vote_question("missing", "u1", add_up).await.unwrap_err(), RepoError::NotFound));
}

#[tokio::test]
async fn question_listing_searches_and_pages() {
    let r = repo();
    for i in 0..5 {
        r.insert_question(new_question(&format!("Borrow question {i}"), "a")).await.unwrap();
    }
    r.insert_question(new_question("Unrelated (c++) topic", "b")).await.unwrap();

    let q = QuestionQuery { search: Some("borrow".into()), page: PageRequest::new(Some(1), Some(2)), ..Default::default() };
    let page = r.list_questions(&q).await.unwrap();
    assert_eq!(page.total, 5);
    assert_eq!(page.items.len(), 2);
    assert!(page.is_next);

    let q = QuestionQuery { search: Some("borrow".into()), page: PageRequest::new(Some(3), Some(2)), ..Default::default() };
    let page = r.list_questions(&q).await.unwrap();
    assert_eq!(page.items.len(), 1);
    assert!(!page.is_next);

    // regex metacharacters are matched literally
    let q = QuestionQuery { search: Some("(C++)".into()), ..Default::default() };
    assert_eq!(r.list_questions(&q).await.unwrap().total, 1);

    let q = QuestionQuery { author: Some("b".into()), sort: QuestionSort::Oldest, ..Default::default() };
    assert_eq!(r.list_questions(&q).await.unwrap().items[0].title, "Unrelated (c++) topic");
    assert_eq!(r.count_questions("a").await.unwrap(), 5);
}

#[tokio::test]
async fn view_interactions_are_queryable() {
    let r = repo();
    let row = NewInteraction {
        user: "u1".into(),
        action: InteractionKind::View,
        question: Some("q1".into()),
        answer: None,
        tags: vec![],
    };
    assert!(!r.interaction_exists("u1", InteractionKind::View, "q1").await.unwrap());
    r.insert_interaction(row).await.unwrap();
    assert!(r.interaction_exists("u1", InteractionKind::View, "q1").await.unwrap());
    assert!(!r.interaction_exists("u1", InteractionKind::AskQuestion, "q1").await.unwrap());

    assert_eq!(r.delete_interactions_for_question("q1").await.unwrap(), 1);
    assert!(r.interactions_for_user("u1").await.unwrap().is_empty());
}

#[tokio::test]
async fn snapshot_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    let first = InMemRepo::with_snapshot_path(path.clone());
    let u = first.create_user(new_user("ada")).await.unwrap();
    first.adjust_reputation(&u.id, 7).await.unwrap();
    let q = first.insert_question(new_question("Persisted", &u.id)).await.unwrap();

    let reopened = InMemRepo::in_dir(dir.path());
    assert_eq!(reopened.get_user_by_clerk_id("clerk_ada").await.unwrap().reputation, 7);
    assert_eq!(reopened.get_question(&q.id).await.unwrap().title, "Persisted");

    // ids keep increasing after a reload
    let q2 = reopened.insert_question(new_question("After restart", &u.id)).await.unwrap();
    assert_ne!(q2.id, q.id);
}
