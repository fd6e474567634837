use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Document},
    options::{IndexOptions, ReturnDocument},
    Client, Collection, Database, IndexModel,
};
use tokio::sync::OnceCell;

use super::{
    CompletionFilter, CompletionOrder, CompletionQuery, QuizFilter, QuizOrder, RecordStore,
    StoreError,
};
use crate::{
    metrics::track_db_operation,
    models::{Completion, NewCompletion, NewQuizSubmission, QuizSubmission},
};

pub const SCORES_COLLECTION: &str = "scores";
pub const QUIZ_ANSWERS_COLLECTION: &str = "quiz_answers";
const COUNTERS_COLLECTION: &str = "counters";

pub struct MongoRecordStore {
    uri: String,
    database_name: String,
    database: OnceCell<Database>,
}

impl MongoRecordStore {
    /// The connection is opened lazily by [`RecordStore::open`] so that a bad
    /// URI surfaces as a readiness failure instead of a startup crash.
    pub fn new(uri: impl Into<String>, database_name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            database_name: database_name.into(),
            database: OnceCell::new(),
        }
    }

    fn database(&self) -> Result<&Database, StoreError> {
        self.database.get().ok_or(StoreError::NotConnected)
    }

    fn scores(&self) -> Result<Collection<Completion>, StoreError> {
        Ok(self.database()?.collection(SCORES_COLLECTION))
    }

    fn quiz_answers(&self) -> Result<Collection<QuizSubmission>, StoreError> {
        Ok(self.database()?.collection(QUIZ_ANSWERS_COLLECTION))
    }

    /// Allocates the next surrogate id for a collection from the counters
    /// collection (`{ _id: <collection>, seq: <last id> }`).
    async fn next_id(&self, sequence: &str) -> Result<i64, StoreError> {
        let counters = self.database()?.collection::<Document>(COUNTERS_COLLECTION);
        let counter = counters
            .find_one_and_update(doc! { "_id": sequence }, doc! { "$inc": { "seq": 1_i64 } })
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| StoreError::operation("allocate id", e))?;

        counter
            .and_then(|doc| doc.get_i64("seq").ok())
            .ok_or_else(|| StoreError::operation("allocate id", "counter document missing"))
    }

    async fn ensure_indexes(&self) -> Result<(), StoreError> {
        let unique = || IndexOptions::builder().unique(true).build();
        let scores = self.database()?.collection::<Document>(SCORES_COLLECTION);
        let quiz_answers = self.database()?.collection::<Document>(QUIZ_ANSWERS_COLLECTION);

        let schema_err = |e: mongodb::error::Error| StoreError::Schema(e.to_string());

        scores
            .create_index(IndexModel::builder().keys(doc! { "id": 1 }).options(unique()).build())
            .await
            .map_err(schema_err)?;
        scores
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "completion_time": 1, "id": 1 })
                    .build(),
            )
            .await
            .map_err(schema_err)?;
        scores
            .create_index(IndexModel::builder().keys(doc! { "email": 1 }).build())
            .await
            .map_err(schema_err)?;

        quiz_answers
            .create_index(IndexModel::builder().keys(doc! { "id": 1 }).options(unique()).build())
            .await
            .map_err(schema_err)?;
        quiz_answers
            .create_index(IndexModel::builder().keys(doc! { "session_id": 1 }).build())
            .await
            .map_err(schema_err)?;
        quiz_answers
            .create_index(IndexModel::builder().keys(doc! { "participant_email": 1 }).build())
            .await
            .map_err(schema_err)?;

        Ok(())
    }
}

fn completion_filter_doc(filter: &CompletionFilter) -> Document {
    let mut doc = Document::new();
    if let Some(difficulty) = filter.difficulty {
        doc.insert("difficulty", difficulty);
    }
    if let Some(email) = &filter.email {
        doc.insert("email", email.as_str());
    }
    doc
}

fn completion_sort_doc(order: CompletionOrder) -> Document {
    match order {
        CompletionOrder::FastestFirst => doc! { "completion_time": 1, "id": 1 },
        CompletionOrder::NewestCompletedFirst => doc! { "completed_at": -1, "id": 1 },
    }
}

fn quiz_filter_doc(filter: &QuizFilter) -> Document {
    match filter {
        QuizFilter::All => doc! {},
        QuizFilter::Sessions(ids) => doc! { "session_id": { "$in": ids.clone() } },
        QuizFilter::Email(email) => doc! { "participant_email": email.as_str() },
        QuizFilter::EmailOrName { email, name } => doc! {
            "$or": [
                { "participant_email": email.as_str() },
                { "participant_name": name.as_str() }
            ]
        },
    }
}

fn quiz_sort_doc(order: QuizOrder) -> Document {
    match order {
        QuizOrder::InsertionOrder => doc! { "id": 1 },
        QuizOrder::NewestFirst => doc! { "id": -1 },
    }
}

#[async_trait]
impl RecordStore for MongoRecordStore {
    fn backend(&self) -> &'static str {
        "mongodb"
    }

    async fn open(&self) -> Result<(), StoreError> {
        if self.database.initialized() {
            return Ok(());
        }

        let client = Client::with_uri_str(&self.uri)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        let database = client.database(&self.database_name);
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        // A concurrent open may have won the race; either handle is usable.
        let _ = self.database.set(database);
        tracing::info!(database = %self.database_name, "MongoDB connected");
        Ok(())
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        let database = self.database()?;
        let existing = database
            .list_collection_names()
            .await
            .map_err(|e| StoreError::Schema(e.to_string()))?;

        for name in [SCORES_COLLECTION, QUIZ_ANSWERS_COLLECTION, COUNTERS_COLLECTION] {
            if !existing.iter().any(|collection| collection == name) {
                database
                    .create_collection(name)
                    .await
                    .map_err(|e| StoreError::Schema(e.to_string()))?;
                tracing::info!(collection = name, "Created collection");
            }
        }

        self.ensure_indexes().await?;

        let confirmed = database
            .list_collection_names()
            .await
            .map_err(|e| StoreError::Schema(e.to_string()))?;
        for name in [SCORES_COLLECTION, QUIZ_ANSWERS_COLLECTION] {
            if !confirmed.iter().any(|collection| collection == name) {
                return Err(StoreError::Schema(format!("collection {name} is missing")));
            }
        }

        Ok(())
    }

    async fn insert_completion(&self, record: NewCompletion) -> Result<Completion, StoreError> {
        track_db_operation("insert", SCORES_COLLECTION, async {
            let id = self.next_id(SCORES_COLLECTION).await?;
            let completion = record.into_record(id, Utc::now());
            self.scores()?
                .insert_one(&completion)
                .await
                .map_err(|e| StoreError::operation("insert completion", e))?;
            Ok::<_, StoreError>(completion)
        })
        .await
    }

    async fn delete_completion(&self, id: i64) -> Result<bool, StoreError> {
        track_db_operation("delete", SCORES_COLLECTION, async {
            let result = self
                .scores()?
                .delete_one(doc! { "id": id })
                .await
                .map_err(|e| StoreError::operation("delete completion", e))?;
            Ok::<_, StoreError>(result.deleted_count > 0)
        })
        .await
    }

    async fn list_completions(
        &self,
        query: &CompletionQuery,
    ) -> Result<Vec<Completion>, StoreError> {
        track_db_operation("find", SCORES_COLLECTION, async {
            let scores = self.scores()?;
            let mut find = scores
                .find(completion_filter_doc(&query.filter))
                .sort(completion_sort_doc(query.order));
            if let Some(limit) = query.limit {
                find = find.limit(i64::try_from(limit).unwrap_or(i64::MAX));
            }

            let cursor = find
                .await
                .map_err(|e| StoreError::operation("list completions", e))?;
            cursor
                .try_collect()
                .await
                .map_err(|e| StoreError::operation("list completions", e))
        })
        .await
    }

    async fn count_completions(&self, filter: &CompletionFilter) -> Result<u64, StoreError> {
        track_db_operation("count", SCORES_COLLECTION, async {
            self.scores()?
                .count_documents(completion_filter_doc(filter))
                .await
                .map_err(|e| StoreError::operation("count completions", e))
        })
        .await
    }

    async fn insert_quiz_submission(
        &self,
        record: NewQuizSubmission,
    ) -> Result<QuizSubmission, StoreError> {
        track_db_operation("insert", QUIZ_ANSWERS_COLLECTION, async {
            let id = self.next_id(QUIZ_ANSWERS_COLLECTION).await?;
            let quiz = record.into_record(id, Utc::now());
            self.quiz_answers()?
                .insert_one(&quiz)
                .await
                .map_err(|e| StoreError::operation("insert quiz submission", e))?;
            Ok::<_, StoreError>(quiz)
        })
        .await
    }

    async fn list_quiz_submissions(
        &self,
        filter: &QuizFilter,
        order: QuizOrder,
    ) -> Result<Vec<QuizSubmission>, StoreError> {
        track_db_operation("find", QUIZ_ANSWERS_COLLECTION, async {
            let cursor = self
                .quiz_answers()?
                .find(quiz_filter_doc(filter))
                .sort(quiz_sort_doc(order))
                .await
                .map_err(|e| StoreError::operation("list quiz submissions", e))?;
            cursor
                .try_collect()
                .await
                .map_err(|e| StoreError::operation("list quiz submissions", e))
        })
        .await
    }

    async fn count_quiz_submissions(&self, filter: &QuizFilter) -> Result<u64, StoreError> {
        track_db_operation("count", QUIZ_ANSWERS_COLLECTION, async {
            self.quiz_answers()?
                .count_documents(quiz_filter_doc(filter))
                .await
                .map_err(|e| StoreError::operation("count quiz submissions", e))
        })
        .await
    }
}
