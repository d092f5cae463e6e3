use async_trait::async_trait;
use chrono::Utc;
use futures_util::TryStreamExt;
use mongodb::bson::{self, doc, oid::ObjectId, Bson, Document};
use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use mongodb::options::{FindOneAndUpdateOptions, IndexOptions, ReturnDocument};
use mongodb::{Client, Collection, Database, IndexModel};
use serde::de::DeserializeOwned;
use tracing::info;

use super::*;

const DUPLICATE_KEY: i32 = 11000;

#[derive(Clone)]
pub struct MongoRepo {
    db: Database,
}

fn new_id() -> Id {
    ObjectId::new().to_hex()
}

fn is_duplicate_key(e: &MongoError) -> bool {
    match e.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(we)) => we.code == DUPLICATE_KEY,
        ErrorKind::Command(ce) => ce.code == DUPLICATE_KEY,
        _ => false,
    }
}

fn map_err(e: MongoError) -> RepoError {
    if is_duplicate_key(&e) {
        RepoError::Conflict
    } else {
        RepoError::Internal(e.to_string())
    }
}

fn after_update() -> FindOneAndUpdateOptions {
    FindOneAndUpdateOptions::builder().return_document(ReturnDocument::After).build()
}

fn regex_doc(pattern: String) -> Document {
    doc! { "$regex": pattern, "$options": "i" }
}

/// `{$size: ...}` that tolerates a missing array field.
fn size_of(field: &str) -> Document {
    doc! { "$size": { "$ifNull": [format!("${field}"), []] } }
}

fn vote_update(user: &str, change: VoteChange) -> Document {
    let mut pull = Document::new();
    let mut add = Document::new();
    if change.pull_up { pull.insert("up_votes", user); }
    if change.pull_down { pull.insert("down_votes", user); }
    if change.add_up { add.insert("up_votes", user); }
    if change.add_down { add.insert("down_votes", user); }
    let mut update = Document::new();
    if !pull.is_empty() { update.insert("$pull", pull); }
    if !add.is_empty() { update.insert("$addToSet", add); }
    update
}

fn count_field(d: &Document, key: &str) -> u64 {
    match d.get(key) {
        Some(Bson::Int32(n)) => (*n).max(0) as u64,
        Some(Bson::Int64(n)) => (*n).max(0) as u64,
        Some(Bson::Double(n)) => n.max(0.0) as u64,
        _ => 0,
    }
}

async fn fetch_all<T>(coll: &Collection<T>, filter: Document) -> RepoResult<Vec<T>>
where
    T: DeserializeOwned + Unpin + Send + Sync,
{
    coll.find(filter, None).await.map_err(map_err)?.try_collect().await.map_err(map_err)
}

/// `$match` → `$addFields` → `$sort` → `$skip` → `$limit`, counted separately.
async fn aggregate_page<T: DeserializeOwned>(
    coll: &Collection<Document>,
    filter: Document,
    computed: Document,
    sort: Document,
    page: &PageRequest,
) -> RepoResult<Page<T>> {
    let total = coll.count_documents(filter.clone(), None).await.map_err(map_err)?;
    let mut pipeline = vec![doc! { "$match": filter }];
    if !computed.is_empty() { pipeline.push(doc! { "$addFields": computed }); }
    if !sort.is_empty() { pipeline.push(doc! { "$sort": sort }); }
    pipeline.push(doc! { "$skip": i64::try_from(page.skip()).unwrap_or(i64::MAX) });
    pipeline.push(doc! { "$limit": page.page_size as i64 });
    let docs: Vec<Document> = coll
        .aggregate(pipeline, None)
        .await
        .map_err(map_err)?
        .try_collect()
        .await
        .map_err(map_err)?;
    let items = docs
        .into_iter()
        .map(|d| bson::from_document::<T>(d).map_err(|e| RepoError::Internal(e.to_string())))
        .collect::<RepoResult<Vec<T>>>()?;
    Ok(Page::new(items, total, page))
}

impl MongoRepo {
    pub async fn connect(url: &str, db_name: &str) -> anyhow::Result<Self> {
        let client = Client::with_uri_str(url).await?;
        let db = client.database(db_name);
        db.run_command(doc! { "ping": 1 }, None).await?;
        let repo = Self { db };
        repo.ensure_indexes().await?;
        info!(db = db_name, "connected to mongodb");
        Ok(repo)
    }

    async fn ensure_indexes(&self) -> mongodb::error::Result<()> {
        for key in ["clerk_id", "username", "email"] {
            let mut keys = Document::new();
            keys.insert(key, 1);
            let model = IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().unique(true).build())
                .build();
            self.users().create_index(model, None).await?;
        }
        Ok(())
    }

    fn users(&self) -> Collection<User> { self.db.collection("users") }
    fn questions(&self) -> Collection<Question> { self.db.collection("questions") }
    fn answers(&self) -> Collection<Answer> { self.db.collection("answers") }
    fn tags(&self) -> Collection<Tag> { self.db.collection("tags") }
    fn interactions(&self) -> Collection<Interaction> { self.db.collection("interactions") }
    fn raw(&self, name: &str) -> Collection<Document> { self.db.collection(name) }
}

#[async_trait]
impl UserRepo for MongoRepo {
    async fn create_user(&self, new: NewUser) -> RepoResult<User> {
        let user = User {
            id: new_id(),
            clerk_id: new.clerk_id,
            name: new.name,
            username: new.username,
            email: new.email,
            picture: new.picture,
            bio: None,
            location: None,
            portfolio_website: None,
            reputation: 0,
            saved: Vec::new(),
            onboarded: false,
            joined_at: Utc::now(),
        };
        self.users().insert_one(&user, None).await.map_err(map_err)?;
        Ok(user)
    }

    async fn get_user(&self, id: &str) -> RepoResult<User> {
        self.users().find_one(doc! { "_id": id }, None).await.map_err(map_err)?.ok_or(RepoError::NotFound)
    }

    async fn get_user_by_clerk_id(&self, clerk_id: &str) -> RepoResult<User> {
        self.users()
            .find_one(doc! { "clerk_id": clerk_id }, None)
            .await
            .map_err(map_err)?
            .ok_or(RepoError::NotFound)
    }

    async fn users_by_ids(&self, ids: &[Id]) -> RepoResult<Vec<User>> {
        fetch_all(&self.users(), doc! { "_id": { "$in": ids.to_vec() } }).await
    }

    async fn update_user(&self, clerk_id: &str, upd: UpdateUser) -> RepoResult<User> {
        let mut set = Document::new();
        if let Some(v) = upd.name { set.insert("name", v); }
        if let Some(v) = upd.username { set.insert("username", v); }
        if let Some(v) = upd.email { set.insert("email", v); }
        if let Some(v) = upd.picture { set.insert("picture", v); }
        if let Some(v) = upd.onboarded { set.insert("onboarded", v); }
        let mut unset = Document::new();
        for (field, value) in [("bio", upd.bio), ("location", upd.location), ("portfolio_website", upd.portfolio_website)] {
            match value {
                Some(Some(v)) => { set.insert(field, v); }
                Some(None) => { unset.insert(field, ""); }
                None => {}
            }
        }
        let mut update = Document::new();
        if !set.is_empty() { update.insert("$set", set); }
        if !unset.is_empty() { update.insert("$unset", unset); }
        if update.is_empty() {
            return self.get_user_by_clerk_id(clerk_id).await;
        }
        self.users()
            .find_one_and_update(doc! { "clerk_id": clerk_id }, update, after_update())
            .await
            .map_err(map_err)?
            .ok_or(RepoError::NotFound)
    }

    async fn delete_user(&self, id: &str) -> RepoResult<User> {
        self.users().find_one_and_delete(doc! { "_id": id }, None).await.map_err(map_err)?.ok_or(RepoError::NotFound)
    }

    async fn list_users(&self, q: &UserQuery) -> RepoResult<Page<User>> {
        let mut filter = Document::new();
        if let Some(p) = search_pattern(q.search.as_deref()) {
            filter.insert("$or", vec![doc! { "name": regex_doc(p.clone()) }, doc! { "username": regex_doc(p) }]);
        }
        let sort = match q.sort {
            UserSort::Unsorted => Document::new(),
            UserSort::NewUsers => doc! { "joined_at": -1, "_id": -1 },
            UserSort::OldUsers => doc! { "joined_at": 1, "_id": 1 },
            UserSort::TopContributors => doc! { "reputation": -1, "_id": 1 },
        };
        aggregate_page(&self.raw("users"), filter, Document::new(), sort, &q.page).await
    }

    async fn adjust_reputation(&self, id: &str, delta: i64) -> RepoResult<()> {
        let res = self
            .users()
            .update_one(doc! { "_id": id }, doc! { "$inc": { "reputation": delta } }, None)
            .await
            .map_err(map_err)?;
        if res.matched_count == 0 { return Err(RepoError::NotFound); }
        Ok(())
    }

    async fn set_saved(&self, user_id: &str, question_id: &str, saved: bool) -> RepoResult<()> {
        let update = if saved {
            doc! { "$addToSet": { "saved": question_id } }
        } else {
            doc! { "$pull": { "saved": question_id } }
        };
        let res = self.users().update_one(doc! { "_id": user_id }, update, None).await.map_err(map_err)?;
        if res.matched_count == 0 { return Err(RepoError::NotFound); }
        Ok(())
    }

    async fn pull_saved_everywhere(&self, question_id: &str) -> RepoResult<()> {
        self.users()
            .update_many(doc! { "saved": question_id }, doc! { "$pull": { "saved": question_id } }, None)
            .await
            .map_err(map_err)?;
        Ok(())
    }
}

fn question_filter(q: &QuestionQuery) -> Document {
    let mut filter = Document::new();
    if let Some(author) = &q.author { filter.insert("author", author.clone()); }
    if let Some(ids) = &q.ids { filter.insert("_id", doc! { "$in": ids.clone() }); }
    if q.unanswered_only { filter.insert("answers", doc! { "$size": 0 }); }
    if let Some(p) = search_pattern(q.search.as_deref()) {
        if q.search_content {
            filter.insert("$or", vec![doc! { "title": regex_doc(p.clone()) }, doc! { "content": regex_doc(p) }]);
        } else {
            filter.insert("title", regex_doc(p));
        }
    }
    filter
}

fn question_sort(sort: QuestionSort) -> (Document, Document) {
    match sort {
        QuestionSort::Newest => (Document::new(), doc! { "created_at": -1, "_id": -1 }),
        QuestionSort::Oldest => (Document::new(), doc! { "created_at": 1, "_id": 1 }),
        QuestionSort::MostViewed => (Document::new(), doc! { "views": -1, "_id": 1 }),
        QuestionSort::MostVoted => (doc! { "up_count": size_of("up_votes") }, doc! { "up_count": -1, "_id": 1 }),
        QuestionSort::MostAnswered => {
            (doc! { "answer_count": size_of("answers") }, doc! { "answer_count": -1, "_id": 1 })
        }
        QuestionSort::Popular => {
            (doc! { "up_count": size_of("up_votes") }, doc! { "views": -1, "up_count": -1, "_id": 1 })
        }
    }
}

#[async_trait]
impl QuestionRepo for MongoRepo {
    async fn insert_question(&self, new: NewQuestion) -> RepoResult<Question> {
        let question = Question {
            id: new_id(),
            title: new.title,
            content: new.content,
            tags: Vec::new(),
            views: 0,
            up_votes: Vec::new(),
            down_votes: Vec::new(),
            author: new.author,
            answers: Vec::new(),
            created_at: Utc::now(),
        };
        self.questions().insert_one(&question, None).await.map_err(map_err)?;
        Ok(question)
    }

    async fn get_question(&self, id: &str) -> RepoResult<Question> {
        self.questions().find_one(doc! { "_id": id }, None).await.map_err(map_err)?.ok_or(RepoError::NotFound)
    }

    async fn questions_by_ids(&self, ids: &[Id]) -> RepoResult<Vec<Question>> {
        fetch_all(&self.questions(), doc! { "_id": { "$in": ids.to_vec() } }).await
    }

    async fn question_ids_by_author(&self, author: &str) -> RepoResult<Vec<Id>> {
        let found = fetch_all(&self.questions(), doc! { "author": author }).await?;
        Ok(found.into_iter().map(|q| q.id).collect())
    }

    async fn update_question_content(&self, id: &str, title: String, content: String) -> RepoResult<Question> {
        self.questions()
            .find_one_and_update(
                doc! { "_id": id },
                doc! { "$set": { "title": title, "content": content } },
                after_update(),
            )
            .await
            .map_err(map_err)?
            .ok_or(RepoError::NotFound)
    }

    async fn delete_question(&self, id: &str) -> RepoResult<Question> {
        self.questions().find_one_and_delete(doc! { "_id": id }, None).await.map_err(map_err)?.ok_or(RepoError::NotFound)
    }

    async fn push_question_tags(&self, id: &str, tags: &[Id]) -> RepoResult<()> {
        let res = self
            .questions()
            .update_one(doc! { "_id": id }, doc! { "$push": { "tags": { "$each": tags.to_vec() } } }, None)
            .await
            .map_err(map_err)?;
        if res.matched_count == 0 { return Err(RepoError::NotFound); }
        Ok(())
    }

    async fn push_answer(&self, question_id: &str, answer_id: &str) -> RepoResult<()> {
        let res = self
            .questions()
            .update_one(doc! { "_id": question_id }, doc! { "$push": { "answers": answer_id } }, None)
            .await
            .map_err(map_err)?;
        if res.matched_count == 0 { return Err(RepoError::NotFound); }
        Ok(())
    }

    async fn pull_answer(&self, question_id: &str, answer_id: &str) -> RepoResult<()> {
        self.questions()
            .update_one(doc! { "_id": question_id }, doc! { "$pull": { "answers": answer_id } }, None)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn increment_views(&self, id: &str) -> RepoResult<()> {
        let res = self
            .questions()
            .update_one(doc! { "_id": id }, doc! { "$inc": { "views": 1_i64 } }, None)
            .await
            .map_err(map_err)?;
        if res.matched_count == 0 { return Err(RepoError::NotFound); }
        Ok(())
    }

    async fn list_questions(&self, q: &QuestionQuery) -> RepoResult<Page<Question>> {
        let (computed, sort) = question_sort(q.sort);
        aggregate_page(&self.raw("questions"), question_filter(q), computed, sort, &q.page).await
    }

    async fn count_questions(&self, author: &str) -> RepoResult<u64> {
        self.questions().count_documents(doc! { "author": author }, None).await.map_err(map_err)
    }

    async fn vote_question(&self, id: &str, user: &str, change: VoteChange) -> RepoResult<Question> {
        let update = vote_update(user, change);
        if update.is_empty() { return self.get_question(id).await; }
        self.questions()
            .find_one_and_update(doc! { "_id": id }, update, after_update())
            .await
            .map_err(map_err)?
            .ok_or(RepoError::NotFound)
    }

    async fn top_tags_for_author(&self, author: &str, limit: usize) -> RepoResult<Vec<(Id, u64)>> {
        let pipeline = vec![
            doc! { "$match": { "author": author } },
            doc! { "$unwind": "$tags" },
            doc! { "$group": { "_id": "$tags", "count": { "$sum": 1 } } },
            doc! { "$sort": { "count": -1, "_id": 1 } },
            doc! { "$limit": limit as i64 },
        ];
        let docs: Vec<Document> = self
            .raw("questions")
            .aggregate(pipeline, None)
            .await
            .map_err(map_err)?
            .try_collect()
            .await
            .map_err(map_err)?;
        Ok(docs
            .iter()
            .filter_map(|d| d.get_str("_id").ok().map(|id| (id.to_string(), count_field(d, "count"))))
            .collect())
    }
}

#[async_trait]
impl AnswerRepo for MongoRepo {
    async fn insert_answer(&self, new: NewAnswer) -> RepoResult<Answer> {
        let answer = Answer {
            id: new_id(),
            content: new.content,
            author: new.author,
            question: new.question,
            up_votes: Vec::new(),
            down_votes: Vec::new(),
            created_at: Utc::now(),
        };
        self.answers().insert_one(&answer, None).await.map_err(map_err)?;
        Ok(answer)
    }

    async fn get_answer(&self, id: &str) -> RepoResult<Answer> {
        self.answers().find_one(doc! { "_id": id }, None).await.map_err(map_err)?.ok_or(RepoError::NotFound)
    }

    async fn update_answer_content(&self, id: &str, content: String) -> RepoResult<Answer> {
        self.answers()
            .find_one_and_update(doc! { "_id": id }, doc! { "$set": { "content": content } }, after_update())
            .await
            .map_err(map_err)?
            .ok_or(RepoError::NotFound)
    }

    async fn delete_answer(&self, id: &str) -> RepoResult<Answer> {
        self.answers().find_one_and_delete(doc! { "_id": id }, None).await.map_err(map_err)?.ok_or(RepoError::NotFound)
    }

    async fn delete_answers_for_question(&self, question_id: &str) -> RepoResult<u64> {
        let res = self.answers().delete_many(doc! { "question": question_id }, None).await.map_err(map_err)?;
        Ok(res.deleted_count)
    }

    async fn delete_answers_by_author(&self, author: &str) -> RepoResult<Vec<Answer>> {
        let found = fetch_all(&self.answers(), doc! { "author": author }).await?;
        self.answers().delete_many(doc! { "author": author }, None).await.map_err(map_err)?;
        Ok(found)
    }

    async fn list_answers(&self, q: &AnswerQuery) -> RepoResult<Page<Answer>> {
        let mut filter = Document::new();
        if let Some(id) = &q.question { filter.insert("question", id.clone()); }
        if let Some(id) = &q.author { filter.insert("author", id.clone()); }
        let (computed, sort) = match q.sort {
            AnswerSort::HighestUpvotes => (doc! { "up_count": size_of("up_votes") }, doc! { "up_count": -1, "_id": 1 }),
            AnswerSort::LowestUpvotes => (doc! { "up_count": size_of("up_votes") }, doc! { "up_count": 1, "_id": 1 }),
            AnswerSort::Recent => (Document::new(), doc! { "created_at": -1, "_id": -1 }),
            AnswerSort::Old => (Document::new(), doc! { "created_at": 1, "_id": 1 }),
        };
        aggregate_page(&self.raw("answers"), filter, computed, sort, &q.page).await
    }

    async fn count_answers(&self, author: &str) -> RepoResult<u64> {
        self.answers().count_documents(doc! { "author": author }, None).await.map_err(map_err)
    }

    async fn vote_answer(&self, id: &str, user: &str, change: VoteChange) -> RepoResult<Answer> {
        let update = vote_update(user, change);
        if update.is_empty() { return self.get_answer(id).await; }
        self.answers()
            .find_one_and_update(doc! { "_id": id }, update, after_update())
            .await
            .map_err(map_err)?
            .ok_or(RepoError::NotFound)
    }
}

#[async_trait]
impl TagRepo for MongoRepo {
    async fn upsert_tag(&self, name: &str, question_id: &str) -> RepoResult<(Tag, bool)> {
        // regex conditions are not copied into upserted documents, so the
        // inserted fields come from $setOnInsert alone
        let filter = doc! { "name": regex_doc(format!("^{}$", regex::escape(name))) };
        let minted = new_id();
        let update = doc! {
            "$setOnInsert": { "_id": minted.clone(), "name": name, "created_at": Utc::now().timestamp_millis() },
            "$addToSet": { "questions": question_id },
        };
        let opts = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();
        let tag = self
            .tags()
            .find_one_and_update(filter, update, opts)
            .await
            .map_err(map_err)?
            .ok_or(RepoError::NotFound)?;
        let created = tag.id == minted;
        Ok((tag, created))
    }

    async fn get_tag(&self, id: &str) -> RepoResult<Tag> {
        self.tags().find_one(doc! { "_id": id }, None).await.map_err(map_err)?.ok_or(RepoError::NotFound)
    }

    async fn tags_by_ids(&self, ids: &[Id]) -> RepoResult<Vec<Tag>> {
        fetch_all(&self.tags(), doc! { "_id": { "$in": ids.to_vec() } }).await
    }

    async fn list_tags(&self, q: &TagQuery) -> RepoResult<Page<Tag>> {
        let mut filter = Document::new();
        if let Some(p) = search_pattern(q.search.as_deref()) {
            filter.insert("name", regex_doc(p));
        }
        let (computed, sort) = match q.sort {
            TagSort::Unsorted => (Document::new(), Document::new()),
            TagSort::Popular => (doc! { "question_count": size_of("questions") }, doc! { "question_count": -1, "_id": 1 }),
            TagSort::Recent => (Document::new(), doc! { "created_at": -1, "_id": -1 }),
            TagSort::Name => (Document::new(), doc! { "name": 1 }),
            TagSort::Old => (Document::new(), doc! { "created_at": 1, "_id": 1 }),
        };
        aggregate_page(&self.raw("tags"), filter, computed, sort, &q.page).await
    }

    async fn pull_question_from_tags(&self, question_id: &str) -> RepoResult<()> {
        self.tags()
            .update_many(doc! { "questions": question_id }, doc! { "$pull": { "questions": question_id } }, None)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn popular_tags(&self, limit: usize) -> RepoResult<Vec<PopularTag>> {
        let pipeline = vec![
            doc! { "$project": { "name": 1, "question_count": size_of("questions") } },
            doc! { "$sort": { "question_count": -1, "_id": 1 } },
            doc! { "$limit": limit as i64 },
        ];
        let docs: Vec<Document> = self
            .raw("tags")
            .aggregate(pipeline, None)
            .await
            .map_err(map_err)?
            .try_collect()
            .await
            .map_err(map_err)?;
        Ok(docs
            .iter()
            .filter_map(|d| {
                let id = d.get_str("_id").ok()?;
                let name = d.get_str("name").ok()?;
                Some(PopularTag { id: id.to_string(), name: name.to_string(), question_count: count_field(d, "question_count") })
            })
            .collect())
    }
}

fn kind_bson(kind: InteractionKind) -> RepoResult<Bson> {
    bson::to_bson(&kind).map_err(|e| RepoError::Internal(e.to_string()))
}

#[async_trait]
impl InteractionRepo for MongoRepo {
    async fn insert_interaction(&self, new: NewInteraction) -> RepoResult<Interaction> {
        let row = Interaction {
            id: new_id(),
            user: new.user,
            action: new.action,
            question: new.question,
            answer: new.answer,
            tags: new.tags,
            created_at: Utc::now(),
        };
        self.interactions().insert_one(&row, None).await.map_err(map_err)?;
        Ok(row)
    }

    async fn interaction_exists(&self, user: &str, action: InteractionKind, question: &str) -> RepoResult<bool> {
        let filter = doc! { "user": user, "action": kind_bson(action)?, "question": question };
        let n = self.interactions().count_documents(filter, None).await.map_err(map_err)?;
        Ok(n > 0)
    }

    async fn interactions_for_user(&self, user: &str) -> RepoResult<Vec<Interaction>> {
        fetch_all(&self.interactions(), doc! { "user": user }).await
    }

    async fn delete_interactions_for_question(&self, question_id: &str) -> RepoResult<u64> {
        let res = self.interactions().delete_many(doc! { "question": question_id }, None).await.map_err(map_err)?;
        Ok(res.deleted_count)
    }

    async fn delete_interactions_for_answer(&self, answer_id: &str) -> RepoResult<u64> {
        let res = self.interactions().delete_many(doc! { "answer": answer_id }, None).await.map_err(map_err)?;
        Ok(res.deleted_count)
    }

    async fn delete_interactions_by_user(&self, user: &str) -> RepoResult<u64> {
        let res = self.interactions().delete_many(doc! { "user": user }, None).await.map_err(map_err)?;
        Ok(res.deleted_count)
    }
}
