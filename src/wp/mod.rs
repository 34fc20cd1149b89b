//! The watchpoint module.
//!
//! Watchpoints live in a fixed-capacity pool of slots. A slot is either active (bound to an
//! expression and its last observed value) or free; allocation always takes the lowest free slot,
//! so ids are small, stable and reused deterministically.

use std::fmt;

use thiserror::Error;

use crate::{
    expr::{expr, ExprError, RegisterResolver},
    plat::Word,
};

/// Number of slots in a default pool.
pub const NR_WP: usize = 32;

/// Size of the expression buffer of a slot, including the terminator; expressions may be at most
/// `EXPR_LEN - 1` characters long.
pub const EXPR_LEN: usize = 32;

/// A watchpoint's slot index.
pub type WatchpointId = usize;

/// An error for the watchpoint pool.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("no free watchpoint slot (all {0} in use)")]
    PoolExhausted(usize),
    #[error("no watchpoint number {0}")]
    NotFound(WatchpointId),
    #[error("expression is {0} characters long (max {})", EXPR_LEN - 1)]
    ExpressionTooLong(usize),
    #[error(transparent)]
    Expr(#[from] ExprError),
}

/// A user-registered expression and the value it had when last evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watchpoint {
    pub id: WatchpointId,
    pub expression: String,
    pub last_value: Word,
}

impl fmt::Display for Watchpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Watchpoint {}: {}, value = {}",
            self.id, self.expression, self.last_value
        )
    }
}

/// A watchpoint whose value changed during a [check][WatchpointPool::check] pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Triggered {
    pub id: WatchpointId,
    pub expression: String,
    pub old: Word,
    pub new: Word,
}

impl fmt::Display for Triggered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Watchpoint {} triggered: {}\nOld value = {:#x}\nNew value = {:#x}",
            self.id, self.expression, self.old, self.new
        )
    }
}

/// The fixed set of watchpoint slots. `None` slots make up the free set.
#[derive(Debug, Clone)]
pub struct WatchpointPool {
    slots: Box<[Option<Watchpoint>]>,
}

impl WatchpointPool {
    /// Creates a pool of [NR_WP] free slots.
    pub fn new() -> Self {
        Self::with_capacity(NR_WP)
    }

    /// Creates a pool of `capacity` free slots. The pool never grows past this.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of active watchpoints.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of free slots.
    pub fn free_count(&self) -> usize {
        self.capacity() - self.len()
    }

    pub fn is_active(&self, id: WatchpointId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: WatchpointId) -> Option<&Watchpoint> {
        self.slots.get(id).and_then(Option::as_ref)
    }

    /// Binds `expression` and its current value to the lowest free slot.
    ///
    /// # Errors
    ///
    /// Fails without touching the pool if no slot is free or the expression is too long.
    pub fn allocate(
        &mut self,
        expression: &str,
        initial_value: Word,
    ) -> Result<WatchpointId, PoolError> {
        if expression.len() >= EXPR_LEN {
            return Err(PoolError::ExpressionTooLong(expression.len()));
        }
        let capacity = self.capacity();
        let (id, slot) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| slot.is_none())
            .ok_or(PoolError::PoolExhausted(capacity))?;
        *slot = Some(Watchpoint {
            id,
            expression: expression.to_string(),
            last_value: initial_value,
        });
        log::debug!("allocated watchpoint {} for `{}`", id, expression);
        Ok(id)
    }

    /// Returns slot `id` to the free set, handing back the record it held.
    pub fn release(&mut self, id: WatchpointId) -> Result<Watchpoint, PoolError> {
        self.slots
            .get_mut(id)
            .and_then(Option::take)
            .ok_or(PoolError::NotFound(id))
    }

    /// [release][Self::release], reporting the outcome.
    pub fn delete(&mut self, id: WatchpointId) -> Result<Watchpoint, PoolError> {
        match self.release(id) {
            Ok(wp) => {
                log::debug!("Deleted watchpoint {}", id);
                Ok(wp)
            }
            Err(e) => {
                log::debug!("{}", e);
                Err(e)
            }
        }
    }

    /// Evaluates `expression` once and watches it, starting from that value.
    pub fn watch<R>(&mut self, expression: &str, regs: &R) -> Result<WatchpointId, PoolError>
    where
        R: RegisterResolver + ?Sized,
    {
        let expression = expression.trim();
        let value = expr(expression, regs)?;
        self.allocate(expression, value)
    }

    /// Active watchpoints in ascending id order.
    pub fn list(&self) -> impl Iterator<Item = &Watchpoint> + '_ {
        self.slots.iter().flatten()
    }

    /// Re-evaluates every active watchpoint and records new values.
    ///
    /// Returns the watchpoints whose value changed; a non-empty result means execution should
    /// stop. A watchpoint that fails to evaluate keeps its old value and does not affect the
    /// others.
    pub fn check<R>(&mut self, regs: &R) -> Vec<Triggered>
    where
        R: RegisterResolver + ?Sized,
    {
        let mut triggered = Vec::new();
        for wp in self.slots.iter_mut().flatten() {
            let new = match expr(&wp.expression, regs) {
                Ok(value) => value,
                Err(e) => {
                    log::warn!(
                        "failed to evaluate watchpoint {} `{}`: {}",
                        wp.id,
                        wp.expression,
                        e
                    );
                    continue;
                }
            };
            if new != wp.last_value {
                let hit = Triggered {
                    id: wp.id,
                    expression: wp.expression.clone(),
                    old: wp.last_value,
                    new,
                };
                log::debug!("{}", hit);
                wp.last_value = new;
                triggered.push(hit);
            }
        }
        triggered
    }
}

impl Default for WatchpointPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::expr::{EvalError, NoRegisters};

    fn ids(pool: &WatchpointPool) -> Vec<WatchpointId> {
        pool.list().map(|wp| wp.id).collect()
    }

    fn assert_partition(pool: &WatchpointPool) {
        let active = (0..pool.capacity()).filter(|id| pool.is_active(*id)).count();
        assert_eq!(active, pool.len());
        assert_eq!(pool.len() + pool.free_count(), pool.capacity());
    }

    #[test]
    fn test_capacity() {
        let mut pool = WatchpointPool::new();
        for i in 0..NR_WP {
            assert_eq!(pool.allocate("1", i as Word).unwrap(), i);
        }
        assert_eq!(pool.allocate("1", 0), Err(PoolError::PoolExhausted(NR_WP)));
        assert_eq!(ids(&pool), (0..NR_WP).collect::<Vec<_>>());
        assert_eq!(pool.free_count(), 0);
        assert_partition(&pool);
    }

    #[test]
    fn test_reuse_lowest_free() {
        let mut pool = WatchpointPool::with_capacity(4);
        for _ in 0..4 {
            pool.allocate("$a0", 0).unwrap();
        }
        pool.release(2).unwrap();
        pool.release(1).unwrap();
        assert_partition(&pool);
        assert_eq!(ids(&pool), [0, 3]);
        assert_eq!(pool.allocate("$a1", 7).unwrap(), 1);
        assert_eq!(pool.allocate("$a2", 8).unwrap(), 2);
        assert_eq!(pool.get(1).unwrap().expression, "$a1");
        assert_eq!(pool.get(2).unwrap().last_value, 8);
        assert_partition(&pool);
    }

    #[test]
    fn test_release_roundtrip() {
        let mut pool = WatchpointPool::with_capacity(3);
        let id = pool.allocate("1+1", 2).unwrap();
        let wp = pool.release(id).unwrap();
        assert_eq!(wp.expression, "1+1");
        assert!(!pool.is_active(id));
        assert!(pool.is_empty());
        assert_eq!(pool.release(id), Err(PoolError::NotFound(id)));
        assert_partition(&pool);
    }

    #[test]
    fn test_delete_missing() {
        let mut pool = WatchpointPool::new();
        pool.allocate("1", 1).unwrap();
        pool.allocate("2", 2).unwrap();
        let before: Vec<Watchpoint> = pool.list().cloned().collect();
        assert_eq!(pool.delete(5), Err(PoolError::NotFound(5)));
        assert_eq!(pool.delete(1000), Err(PoolError::NotFound(1000)));
        let after: Vec<Watchpoint> = pool.list().cloned().collect();
        assert_eq!(before, after);
        assert_partition(&pool);
    }

    #[test]
    fn test_expression_too_long() {
        let mut pool = WatchpointPool::new();
        let long = "1+".repeat(16);
        assert_eq!(long.len(), EXPR_LEN);
        assert_eq!(
            pool.allocate(&long, 0),
            Err(PoolError::ExpressionTooLong(EXPR_LEN))
        );
        assert!(pool.is_empty());
        assert!(pool.allocate(&long[1..], 0).is_ok());
    }

    #[test]
    fn test_watch_too_long() {
        let mut pool = WatchpointPool::new();
        let long = format!("  {}  ", "1+".repeat(15) + "11");
        assert_eq!(
            pool.watch(&long, &NoRegisters),
            Err(PoolError::ExpressionTooLong(EXPR_LEN))
        );
        assert!(pool.is_empty());
        // drops the leading "1+", leaving 30 characters
        assert_eq!(pool.watch(&long[4..], &NoRegisters).unwrap(), 0);
        assert_eq!(pool.get(0).unwrap().last_value, 25);
    }

    #[test]
    fn test_check_triggers_once() {
        let mut pool = WatchpointPool::new();
        let id = pool.allocate("1+1", 3).unwrap();
        let hits = pool.check(&NoRegisters);
        assert_eq!(
            hits,
            [Triggered {
                id,
                expression: "1+1".to_string(),
                old: 3,
                new: 2,
            }]
        );
        assert_eq!(pool.get(id).unwrap().last_value, 2);
        assert!(pool.check(&NoRegisters).is_empty());
    }

    #[test]
    fn test_check_failure_is_isolated() {
        let a0 = Cell::new(1);
        let regs = |name: &str| -> Option<Word> { (name == "a0").then(|| a0.get()) };
        let mut pool = WatchpointPool::new();
        let bad = pool.allocate("1/0", 9).unwrap();
        let good = pool.watch("$a0 * 2", &regs).unwrap();
        assert_eq!(pool.get(good).unwrap().last_value, 2);

        a0.set(5);
        let hits = pool.check(&regs);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, good);
        assert_eq!(hits[0].new, 10);
        assert_eq!(pool.get(bad).unwrap().last_value, 9);
    }

    #[test]
    fn test_watch_invalid_expression() {
        let mut pool = WatchpointPool::new();
        assert_eq!(
            pool.watch("$nope", &NoRegisters),
            Err(PoolError::Expr(ExprError::Eval(EvalError::UnknownRegister(
                "nope".to_string()
            ))))
        );
        assert!(pool.is_empty());
    }
}
