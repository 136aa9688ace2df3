use crate::logic::UpdatePathProjector;
use crate::model::{ModifyRequest, ODataError, ProcessError, WriteLeaf};
use crate::store::{Transaction, WriteHandler};
use axum::http::StatusCode;
use serde_json::Value;

/// Runs partial updates inside a transaction.
///
/// The processor begins a transaction only when none is active and then owns
/// it: it commits on success and rolls back on failure. A transaction that was
/// already active is left to whoever opened it. Only a `ProcessError` raised
/// by the handler keeps its status; any other handler failure is internal.
pub struct WriteProcessor<'a> {
    transaction: &'a dyn Transaction,
    handler: &'a dyn WriteHandler,
}

impl<'a> WriteProcessor<'a> {
    pub fn new(transaction: &'a dyn Transaction, handler: &'a dyn WriteHandler) -> Self {
        Self { transaction, handler }
    }

    /// Clear the addressed property (set it to null)
    pub async fn clear_fields(&self, request: &ModifyRequest) -> Result<StatusCode, ODataError> {
        self.process(request, WriteLeaf::Clear).await
    }

    /// Replace the addressed primitive property with `value`
    pub async fn update_property(
        &self,
        request: &ModifyRequest,
        value: Value,
    ) -> Result<StatusCode, ODataError> {
        self.process(request, WriteLeaf::Set(value)).await
    }

    async fn process(
        &self,
        request: &ModifyRequest,
        leaf: WriteLeaf,
    ) -> Result<StatusCode, ODataError> {
        // Addressing errors never reach the transaction
        let instruction = UpdatePathProjector::project_request(request, leaf)?;

        let owned = !self.transaction.is_active().await;
        if owned {
            self.transaction.begin().await.map_err(|e| {
                ODataError::internal(format!("failed to begin transaction: {:#}", e))
            })?;
            log::info!("Began transaction for update of {}", request.entity_type.name());
        }

        match self.handler.update_entity(&instruction).await {
            Ok(()) => {
                if owned {
                    self.transaction.commit().await.map_err(|e| {
                        ODataError::internal(format!("failed to commit transaction: {:#}", e))
                    })?;
                    log::info!(
                        "Committed transaction for update of {}",
                        request.entity_type.name()
                    );
                }
                Ok(StatusCode::NO_CONTENT)
            }
            Err(error) => {
                if owned {
                    match self.transaction.rollback().await {
                        Ok(()) => log::info!(
                            "Rolled back transaction for update of {}",
                            request.entity_type.name()
                        ),
                        Err(rollback) => log::warn!("Rollback failed: {:#}", rollback),
                    }
                }
                Err(match error.downcast::<ProcessError>() {
                    Ok(process) => ODataError::Process(process),
                    Err(other) => ODataError::internal(format!("{:#}", other)),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Headers, KeyPredicate, MappingError, RequestError, RequestPathSegment, WriteInstruction,
    };
    use crate::seed;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingTransaction {
        active: AtomicBool,
        begins: AtomicUsize,
        commits: AtomicUsize,
        rollbacks: AtomicUsize,
    }

    impl CountingTransaction {
        fn active() -> Self {
            let transaction = Self::default();
            transaction.active.store(true, Ordering::SeqCst);
            transaction
        }

        fn counts(&self) -> (usize, usize, usize) {
            (
                self.begins.load(Ordering::SeqCst),
                self.commits.load(Ordering::SeqCst),
                self.rollbacks.load(Ordering::SeqCst),
            )
        }
    }

    #[async_trait::async_trait]
    impl Transaction for CountingTransaction {
        async fn is_active(&self) -> bool {
            self.active.load(Ordering::SeqCst)
        }

        async fn begin(&self) -> anyhow::Result<()> {
            self.begins.fetch_add(1, Ordering::SeqCst);
            self.active.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn commit(&self) -> anyhow::Result<()> {
            self.commits.fetch_add(1, Ordering::SeqCst);
            self.active.store(false, Ordering::SeqCst);
            Ok(())
        }

        async fn rollback(&self) -> anyhow::Result<()> {
            self.rollbacks.fetch_add(1, Ordering::SeqCst);
            self.active.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    enum Outcome {
        Succeed,
        NotImplemented,
        BadRequest,
        MappingFault,
        Fault,
    }

    struct RecordingHandler {
        outcome: Outcome,
        calls: Mutex<Vec<WriteInstruction>>,
    }

    impl RecordingHandler {
        fn new(outcome: Outcome) -> Self {
            Self {
                outcome,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl WriteHandler for RecordingHandler {
        async fn update_entity(&self, instruction: &WriteInstruction) -> anyhow::Result<()> {
            self.calls.lock().push(instruction.clone());
            match self.outcome {
                Outcome::Succeed => Ok(()),
                Outcome::NotImplemented => {
                    Err(ProcessError::not_implemented("updates are not supported").into())
                }
                Outcome::BadRequest => Err(RequestError::EmptyPath.into()),
                Outcome::MappingFault => Err(MappingError::MissingKey {
                    type_name: "Organization".to_string(),
                    alias: "ID".to_string(),
                }
                .into()),
                Outcome::Fault => anyhow::bail!("connection reset"),
            }
        }
    }

    fn request(segments: Vec<RequestPathSegment>) -> ModifyRequest {
        let mut headers = Headers::new();
        headers.insert("x-request-id".to_string(), vec!["42".to_string()]);
        ModifyRequest {
            entity_type: seed::organization_type().unwrap(),
            key_predicates: vec![KeyPredicate::new("ID", json!("4"))],
            segments,
            headers,
        }
    }

    fn updated_by() -> ModifyRequest {
        request(vec![
            RequestPathSegment::complex("AdministrativeInformation"),
            RequestPathSegment::complex("Updated"),
            RequestPathSegment::primitive("By"),
        ])
    }

    #[tokio::test]
    async fn test_owned_transaction_is_committed() {
        let transaction = CountingTransaction::default();
        let handler = RecordingHandler::new(Outcome::Succeed);
        let processor = WriteProcessor::new(&transaction, &handler);

        let status = processor.clear_fields(&updated_by()).await.unwrap();

        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(transaction.counts(), (1, 1, 0));

        let calls = handler.calls.lock();
        assert_eq!(calls.len(), 1);
        let updated = calls[0]
            .attributes
            .nested("administrativeInformation")
            .and_then(|admin| admin.nested("updated"))
            .unwrap();
        assert_eq!(updated.value("by"), Some(&WriteLeaf::Clear));
        assert_eq!(calls[0].headers.get("x-request-id"), Some(&vec!["42".to_string()]));
    }

    #[tokio::test]
    async fn test_active_transaction_is_left_alone() {
        let transaction = CountingTransaction::active();
        let handler = RecordingHandler::new(Outcome::Succeed);
        let processor = WriteProcessor::new(&transaction, &handler);

        processor.clear_fields(&updated_by()).await.unwrap();
        assert_eq!(transaction.counts(), (0, 0, 0));

        let failing = RecordingHandler::new(Outcome::Fault);
        let processor = WriteProcessor::new(&transaction, &failing);
        let error = processor.clear_fields(&updated_by()).await.unwrap_err();
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(transaction.counts(), (0, 0, 0));
        assert!(transaction.is_active().await);

        let not_implemented = RecordingHandler::new(Outcome::NotImplemented);
        let processor = WriteProcessor::new(&transaction, &not_implemented);
        let error = processor.clear_fields(&updated_by()).await.unwrap_err();
        assert_eq!(error.status_code(), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(transaction.counts(), (0, 0, 0));
        assert!(transaction.is_active().await);
    }

    #[tokio::test]
    async fn test_process_error_keeps_its_status() {
        let transaction = CountingTransaction::default();
        let handler = RecordingHandler::new(Outcome::NotImplemented);
        let processor = WriteProcessor::new(&transaction, &handler);

        let error = processor.clear_fields(&updated_by()).await.unwrap_err();

        assert_eq!(error.status_code(), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(error.to_string(), "updates are not supported");
        assert_eq!(transaction.counts(), (1, 0, 1));
    }

    #[tokio::test]
    async fn test_unrecognized_fault_is_internal() {
        let transaction = CountingTransaction::default();
        let handler = RecordingHandler::new(Outcome::Fault);
        let processor = WriteProcessor::new(&transaction, &handler);

        let error = processor.clear_fields(&updated_by()).await.unwrap_err();

        assert!(matches!(error, ODataError::Internal { .. }));
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(transaction.counts(), (1, 0, 1));
    }

    #[tokio::test]
    async fn test_handler_request_and_mapping_errors_are_internal() {
        for outcome in [Outcome::BadRequest, Outcome::MappingFault] {
            let transaction = CountingTransaction::default();
            let handler = RecordingHandler::new(outcome);
            let processor = WriteProcessor::new(&transaction, &handler);

            let error = processor.clear_fields(&updated_by()).await.unwrap_err();

            assert!(matches!(error, ODataError::Internal { .. }));
            assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(transaction.counts(), (1, 0, 1));
        }
    }

    #[tokio::test]
    async fn test_addressing_error_skips_transaction() {
        let transaction = CountingTransaction::default();
        let handler = RecordingHandler::new(Outcome::Succeed);
        let processor = WriteProcessor::new(&transaction, &handler);

        let error = processor
            .clear_fields(&request(vec![RequestPathSegment::primitive("Planet")]))
            .await
            .unwrap_err();

        assert!(matches!(error, ODataError::Request(RequestError::UnknownProperty { .. })));
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(transaction.counts(), (0, 0, 0));
        assert!(handler.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_update_property_sets_value() {
        let transaction = CountingTransaction::default();
        let handler = RecordingHandler::new(Outcome::Succeed);
        let processor = WriteProcessor::new(&transaction, &handler);

        let request = request(vec![
            RequestPathSegment::primitive("Name2"),
            RequestPathSegment::RawValue,
        ]);
        let status = processor
            .update_property(&request, json!("Second line"))
            .await
            .unwrap();

        assert_eq!(status, StatusCode::NO_CONTENT);
        let calls = handler.calls.lock();
        assert_eq!(calls[0].attributes.value("name2"), Some(&WriteLeaf::Set(json!("Second line"))));
        assert_eq!(calls[0].keys.get("iD"), Some(&json!("4")));
    }
}
