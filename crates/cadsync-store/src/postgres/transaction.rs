use async_trait::async_trait;
use cadsync_core::error::{CadSyncError, Result};
use cadsync_core::models::{CanonicalObject, EntityLink, ObjectRef, ProjectId};
use sqlx::{Postgres, Transaction};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;

use super::{links, objects, storage_error, PostgresStore};
use crate::ports::{LinkStore, ObjectStore, Transactional, UnitOfWork};

type TxSlot = Option<Transaction<'static, Postgres>>;

/// One entity's writes inside a database transaction
///
/// Dropping the unit without committing rolls the transaction back.
pub struct PgUnitOfWork {
    tx: Mutex<TxSlot>,
    timeout: Duration,
}

impl PgUnitOfWork {
    fn new(tx: Transaction<'static, Postgres>, timeout: Duration) -> Self {
        Self { tx: Mutex::new(Some(tx)), timeout }
    }

    async fn take(&self) -> Result<Transaction<'static, Postgres>> {
        self.tx
            .lock()
            .await
            .take()
            .ok_or_else(|| CadSyncError::Storage("Transaction already completed".to_string()))
    }
}

// Runs one query against the open transaction
macro_rules! with_tx {
    ($self:ident, |$conn:ident| $body:expr) => {{
        let mut guard = $self.tx.lock().await;
        match guard.as_mut() {
            Some(tx) => {
                let $conn = &mut **tx;
                $body.await
            }
            None => Err(CadSyncError::Storage("Transaction already completed".to_string())),
        }
    }};
}

#[async_trait]
impl LinkStore for PgUnitOfWork {
    async fn insert_link(&self, link: &EntityLink) -> Result<()> {
        with_tx!(self, |conn| links::insert(conn, link))
    }

    async fn update_link(&self, link: &EntityLink) -> Result<()> {
        with_tx!(self, |conn| links::update(conn, link))
    }

    async fn find_link(&self, project_id: ProjectId, handle: &str) -> Result<Option<EntityLink>> {
        with_tx!(self, |conn| links::find(conn, project_id, handle))
    }

    async fn find_link_by_object(
        &self,
        project_id: ProjectId,
        object: ObjectRef,
    ) -> Result<Option<EntityLink>> {
        with_tx!(self, |conn| links::find_by_object(conn, project_id, object))
    }

    async fn list_links(
        &self,
        project_id: ProjectId,
        drawing_id: Option<&str>,
    ) -> Result<Vec<EntityLink>> {
        with_tx!(self, |conn| links::list(conn, project_id, drawing_id))
    }
}

#[async_trait]
impl ObjectStore for PgUnitOfWork {
    async fn insert_object(&self, object: &CanonicalObject) -> Result<()> {
        with_tx!(self, |conn| objects::insert(conn, object))
    }

    async fn get_object(
        &self,
        project_id: ProjectId,
        object: ObjectRef,
    ) -> Result<Option<CanonicalObject>> {
        with_tx!(self, |conn| objects::get(conn, project_id, object))
    }

    async fn update_object(&self, object: &CanonicalObject) -> Result<()> {
        with_tx!(self, |conn| objects::update(conn, object))
    }

    async fn list_objects(&self, project_id: ProjectId) -> Result<Vec<CanonicalObject>> {
        with_tx!(self, |conn| objects::list(conn, project_id))
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn commit(self: Box<Self>) -> Result<()> {
        let tx = self.take().await?;
        match timeout(self.timeout, tx.commit()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(storage_error("Failed to commit transaction", e)),
            Err(_) => Err(CadSyncError::Storage(format!(
                "Transaction commit timeout after {}s",
                self.timeout.as_secs()
            ))),
        }
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let tx = self.take().await?;
        match timeout(self.timeout, tx.rollback()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(storage_error("Failed to rollback transaction", e)),
            Err(_) => Err(CadSyncError::Storage(format!(
                "Transaction rollback timeout after {}s",
                self.timeout.as_secs()
            ))),
        }
    }
}

#[async_trait]
impl Transactional for PostgresStore {
    async fn begin_unit(&self) -> Result<Box<dyn UnitOfWork>> {
        let tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| storage_error("Failed to begin transaction", e))?;
        Ok(Box::new(PgUnitOfWork::new(tx, self.config().unit_timeout)))
    }
}
