//! Client-side accumulation of objects for batched insertion.

use tracing::{debug, error, warn};

use crate::error::Result;
use crate::service::{DataObject, VectorDatabase};

/// Accumulates [`DataObject`]s and sends them in as few round trips as possible.
///
/// With a `batch_size`, the batch flushes itself whenever that many objects are
/// pending. [`run`](ObjectBatch::run) drives a whole insertion and flushes the
/// remainder on every exit path. A batch driven by hand must end with
/// [`finish`](ObjectBatch::finish); dropping it with pending objects logs a
/// warning and sends nothing.
///
/// # Example
///
/// ```rust,ignore
/// let objects = objects.into_iter().map(Ok);
/// let inserted = ObjectBatch::run(service.as_ref(), Some(100), objects).await?;
/// ```
pub struct ObjectBatch<'a> {
    service: &'a dyn VectorDatabase,
    batch_size: Option<usize>,
    pending: Vec<DataObject>,
    flushed: usize,
}

impl<'a> ObjectBatch<'a> {
    /// Create an empty batch writing to `service`.
    pub fn new(service: &'a dyn VectorDatabase, batch_size: Option<usize>) -> Self {
        Self { service, batch_size, pending: Vec::new(), flushed: 0 }
    }

    /// Queue every object `objects` yields, then flush what is still pending.
    ///
    /// Stops at the first error, either one yielded by `objects` or a failed
    /// automatic flush, but still flushes the objects queued before it. That
    /// error is returned ahead of any error from the final flush. On success,
    /// returns how many objects were inserted.
    pub async fn run<I>(
        service: &'a dyn VectorDatabase,
        batch_size: Option<usize>,
        objects: I,
    ) -> Result<usize>
    where
        I: IntoIterator<Item = Result<DataObject>>,
    {
        let mut batch = Self::new(service, batch_size);
        let mut outcome = Ok(());
        for object in objects {
            let queued = match object {
                Ok(object) => batch.add(object).await,
                Err(e) => Err(e),
            };
            if let Err(e) = queued {
                warn!(pending = batch.len(), error = %e, "object batch interrupted, flushing");
                outcome = Err(e);
                break;
            }
        }
        let flushed = batch.finish().await;
        outcome?;
        flushed
    }

    /// Queue an object, flushing first if the batch has reached its size.
    pub async fn add(&mut self, object: DataObject) -> Result<()> {
        self.pending.push(object);
        if self.batch_size.is_some_and(|size| self.pending.len() >= size) {
            self.flush().await?;
        }
        Ok(())
    }

    /// Send all pending objects in one insertion call.
    pub async fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let objects = std::mem::take(&mut self.pending);
        self.service.insert_objects(&objects).await.map_err(|e| {
            error!(count = objects.len(), error = %e, "batch insertion failed");
            e
        })?;
        self.flushed += objects.len();
        debug!(count = objects.len(), total = self.flushed, "flushed object batch");
        Ok(())
    }

    /// Flush the remainder and return how many objects this batch inserted.
    pub async fn finish(mut self) -> Result<usize> {
        self.flush().await?;
        Ok(self.flushed)
    }

    /// Number of objects waiting to be flushed.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no objects are waiting to be flushed.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Drop for ObjectBatch<'_> {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            warn!(pending = self.pending.len(), "object batch dropped with unflushed objects");
        }
    }
}
