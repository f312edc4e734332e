//! # Cola de Admisión
//! src/jobs/queue.rs
//!
//! Lista de espera FIFO estricta de jobs aún no despachados. Guarda solo
//! ids: el `JobStore` es dueño de los jobs y la cola define el orden.
//!
//! No es thread-safe por sí misma; vive dentro de `SchedulerState`,
//! que la protege junto con el store bajo un único Mutex.

use crate::error::QueueError;
use crate::jobs::types::JobId;
use std::collections::VecDeque;

#[derive(Debug, Default)]
pub struct AdmissionQueue {
    entries: VecDeque<JobId>,
}

impl AdmissionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agrega al final, O(1)
    pub fn enqueue(&mut self, id: JobId) {
        self.entries.push_back(id);
    }

    /// Remueve y retorna la cabeza
    pub fn dequeue_front(&mut self) -> Result<JobId, QueueError> {
        self.entries.pop_front().ok_or(QueueError::EmptyQueue)
    }

    /// Remueve un elemento arbitrario (para cancelación)
    pub fn remove(&mut self, id: &JobId) -> Result<JobId, QueueError> {
        let idx = self
            .entries
            .iter()
            .position(|queued| queued == id)
            .ok_or_else(|| QueueError::NotFound(id.clone()))?;
        self.entries
            .remove(idx)
            .ok_or_else(|| QueueError::NotFound(id.clone()))
    }

    /// Distancia (base 0) desde la cabeza
    pub fn position_of(&self, id: &JobId) -> Result<usize, QueueError> {
        self.entries
            .iter()
            .position(|queued| queued == id)
            .ok_or_else(|| QueueError::NotFound(id.clone()))
    }

    /// Consulta la cabeza sin sacarla
    pub fn front(&self) -> Option<&JobId> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> JobId {
        JobId::new(s)
    }

    #[test]
    fn test_queue_fifo_order() {
        let mut queue = AdmissionQueue::new();
        queue.enqueue(id("1"));
        queue.enqueue(id("2"));
        queue.enqueue(id("3"));

        assert_eq!(queue.front(), Some(&id("1")));
        assert_eq!(queue.dequeue_front().unwrap(), id("1"));
        assert_eq!(queue.dequeue_front().unwrap(), id("2"));
        assert_eq!(queue.dequeue_front().unwrap(), id("3"));
    }

    #[test]
    fn test_dequeue_empty() {
        let mut queue = AdmissionQueue::new();
        assert_eq!(queue.dequeue_front(), Err(QueueError::EmptyQueue));
    }

    #[test]
    fn test_remove_by_id() {
        let mut queue = AdmissionQueue::new();
        queue.enqueue(id("a"));
        queue.enqueue(id("b"));
        queue.enqueue(id("c"));

        assert_eq!(queue.remove(&id("b")).unwrap(), id("b"));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.position_of(&id("c")).unwrap(), 1);
        assert_eq!(queue.remove(&id("b")), Err(QueueError::NotFound(id("b"))));
    }

    #[test]
    fn test_position_of() {
        let mut queue = AdmissionQueue::new();
        queue.enqueue(id("a"));
        queue.enqueue(id("b"));

        assert_eq!(queue.position_of(&id("a")).unwrap(), 0);
        assert_eq!(queue.position_of(&id("b")).unwrap(), 1);
        assert!(matches!(queue.position_of(&id("z")), Err(QueueError::NotFound(_))));

        queue.dequeue_front().unwrap();
        assert_eq!(queue.position_of(&id("b")).unwrap(), 0);
    }
}
