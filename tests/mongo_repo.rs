#![cfg(feature = "mongo-store")]

use devflow::models::{NewQuestion, NewUser, UpdateUser, VoteChange};
use devflow::repo::mongo::MongoRepo;
use devflow::repo::{QuestionQuery, QuestionRepo, QuestionSort, RepoError, TagRepo, UserRepo};

/// Connects to a throwaway database, or returns None when MONGODB_URL is unset.
async fn repo() -> Option<MongoRepo> {
    let url = match std::env::var("MONGODB_URL") {
        Ok(u) => u,
        Err(_) => {
            eprintln!("skipping: MONGODB_URL not set");
            return None;
        }
    };
    let db = format!("devflow_test_{}", std::process::id());
    Some(MongoRepo::connect(&url, &db).await.expect("connect"))
}

#[tokio::test]
async fn mongo_tags_votes_and_uniqueness() {
    let Some(r) = repo().await else { return };

    let u = r
        .create_user(NewUser {
            clerk_id: "clerk_m1".into(),
            name: "Mongo User".into(),
            username: "mongo_user".into(),
            email: "m1@example.com".into(),
            picture: String::new(),
        })
        .await
        .unwrap();
    let dup = r
        .create_user(NewUser {
            clerk_id: "clerk_m2".into(),
            name: "Other".into(),
            username: "mongo_user".into(),
            email: "m2@example.com".into(),
            picture: String::new(),
        })
        .await
        .unwrap_err();
    assert!(matches!(dup, RepoError::Conflict));

    let with_bio = r
        .update_user("clerk_m1", UpdateUser { bio: Some(Some("Document stores".into())), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(with_bio.bio.as_deref(), Some("Document stores"));
    let cleared = r.update_user("clerk_m1", UpdateUser { bio: Some(None), ..Default::default() }).await.unwrap();
    assert_eq!(cleared.bio, None);

    let q = r
        .insert_question(NewQuestion { title: "Mongo question".into(), content: "body".into(), author: u.id.clone() })
        .await
        .unwrap();
    let (t1, created) = r.upsert_tag("Mongo", &q.id).await.unwrap();
    assert!(created);
    let (t2, created) = r.upsert_tag("mongo", &q.id).await.unwrap();
    assert!(!created);
    assert_eq!(t1.id, t2.id);
    assert_eq!(t2.questions.len(), 1);

    let q2 = r
        .vote_question(&q.id, &u.id, VoteChange { add_down: true, ..Default::default() })
        .await
        .unwrap();
    let q3 = r
        .vote_question(&q.id, &u.id, VoteChange { pull_down: true, add_up: true, ..Default::default() })
        .await
        .unwrap();
    assert_eq!(q2.down_votes.len(), 1);
    assert_eq!((q3.up_votes.len(), q3.down_votes.len()), (1, 0));

    let page = r
        .list_questions(&QuestionQuery { sort: QuestionSort::MostVoted, ..Default::default() })
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert!(!page.is_next);
}
