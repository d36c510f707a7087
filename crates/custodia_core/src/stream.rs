//! Streaming query results.

use crate::entity::{Entity, EntityRef};
use crate::error::{CoreError, CoreResult};
use custodia_engine::Cursor;
use std::fmt;
use std::iter::FusedIterator;
use std::marker::PhantomData;

/// The result of a load, backed by one engine cursor.
///
/// A stream can be traversed once. Rows are decoded lazily as the traversal
/// advances, so nothing is materialized up front.
pub struct ResultStream<T, C> {
    cursor: Option<C>,
    entity: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity, C: Cursor> ResultStream<T, C> {
    pub(crate) fn new(cursor: C) -> Self {
        Self {
            cursor: Some(cursor),
            entity: T::NAME,
            _marker: PhantomData,
        }
    }

    /// Starts the traversal.
    ///
    /// # Errors
    ///
    /// Returns `ConcurrentUse` if the stream was already traversed, or the
    /// engine error from positioning the cursor. A cursor that failed to
    /// position is discarded, so the stream counts as consumed either way.
    pub fn traverse(&mut self) -> CoreResult<Traversal<T, C>> {
        let mut cursor = self
            .cursor
            .take()
            .ok_or_else(|| CoreError::concurrent_use(self.entity))?;
        let has_row = cursor.first()?;
        Ok(Traversal {
            cursor,
            entity: self.entity,
            finished: !has_row,
            advance: false,
            _marker: PhantomData,
        })
    }

    /// Returns true once the traversal has been taken.
    #[must_use]
    pub fn is_consumed(&self) -> bool {
        self.cursor.is_none()
    }
}

impl<T, C> fmt::Debug for ResultStream<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultStream")
            .field("entity", &self.entity)
            .field("consumed", &self.cursor.is_none())
            .finish()
    }
}

/// A single pass over a [`ResultStream`].
///
/// Yields one decoded entity per cursor row. A null row or an engine error
/// ends the traversal after it is reported.
pub struct Traversal<T, C> {
    cursor: C,
    entity: &'static str,
    finished: bool,
    /// Whether the cursor must move before the next read.
    advance: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity, C: Cursor> Traversal<T, C> {
    fn fail(&mut self, err: CoreError) -> Option<CoreResult<EntityRef<T>>> {
        self.finished = true;
        Some(Err(err))
    }
}

impl<T: Entity, C: Cursor> Iterator for Traversal<T, C> {
    type Item = CoreResult<EntityRef<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if self.advance {
            match self.cursor.next() {
                Ok(true) => {}
                Ok(false) => {
                    self.finished = true;
                    return None;
                }
                Err(e) => return self.fail(e.into()),
            }
        }
        self.advance = true;

        match self.cursor.get() {
            Ok(Some(row)) => Some(EntityRef::from_row(&row).map_err(CoreError::from)),
            Ok(None) => self.fail(CoreError::null_row(self.entity)),
            Err(e) => self.fail(e.into()),
        }
    }
}

impl<T: Entity, C: Cursor> FusedIterator for Traversal<T, C> {}

impl<T, C> fmt::Debug for Traversal<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Traversal")
            .field("entity", &self.entity)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

/// Owning iterator over a [`ResultStream`].
#[derive(Debug)]
pub struct IntoIter<T, C>(Inner<T, C>);

#[derive(Debug)]
enum Inner<T, C> {
    Live(Traversal<T, C>),
    Failed(Option<CoreError>),
}

impl<T: Entity, C: Cursor> Iterator for IntoIter<T, C> {
    type Item = CoreResult<EntityRef<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.0 {
            Inner::Live(traversal) => traversal.next(),
            Inner::Failed(err) => err.take().map(Err),
        }
    }
}

impl<T: Entity, C: Cursor> FusedIterator for IntoIter<T, C> {}

impl<T: Entity, C: Cursor> IntoIterator for ResultStream<T, C> {
    type Item = CoreResult<EntityRef<T>>;
    type IntoIter = IntoIter<T, C>;

    fn into_iter(mut self) -> Self::IntoIter {
        match self.traverse() {
            Ok(traversal) => IntoIter(Inner::Live(traversal)),
            Err(err) => IntoIter(Inner::Failed(Some(err))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use custodia_engine::{EngineError, EntityId, MemoryCursor, Row};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Page {
        id: EntityId,
        number: u32,
    }

    impl Entity for Page {
        const NAME: &'static str = "page";

        fn entity_id(&self) -> EntityId {
            self.id
        }
    }

    fn page(number: u32) -> Page {
        Page {
            id: EntityId::new(),
            number,
        }
    }

    fn row(page: &Page) -> Option<Row> {
        Some(Row::serialized(page).unwrap())
    }

    fn stream(rows: Vec<Option<Row>>) -> ResultStream<Page, MemoryCursor> {
        ResultStream::new(MemoryCursor::new(rows))
    }

    #[test]
    fn empty_cursor_yields_nothing() {
        let mut results = stream(Vec::new());
        let mut traversal = results.traverse().unwrap();
        assert!(traversal.next().is_none());
        assert!(traversal.next().is_none());
    }

    #[test]
    fn rows_come_back_in_cursor_order() {
        let pages = vec![page(1), page(2), page(3)];
        let mut results = stream(pages.iter().map(row).collect());

        let decoded: Vec<Page> = results
            .traverse()
            .unwrap()
            .map(|r| r.unwrap().snapshot())
            .collect();
        assert_eq!(decoded, pages);
    }

    #[test]
    fn second_traverse_is_concurrent_use() {
        let mut results = stream(vec![row(&page(1))]);
        assert!(!results.is_consumed());
        let _first = results.traverse().unwrap();
        assert!(results.is_consumed());

        let err = results.traverse().unwrap_err();
        assert!(matches!(err, CoreError::ConcurrentUse { ref entity } if entity == "page"));
    }

    #[test]
    fn null_row_fails_fast_and_ends_traversal() {
        let mut results = stream(vec![row(&page(1)), None, row(&page(3))]);
        let mut traversal = results.traverse().unwrap();

        assert_eq!(traversal.next().unwrap().unwrap().read().number, 1);
        assert!(matches!(
            traversal.next(),
            Some(Err(CoreError::NullRow { .. }))
        ));
        assert!(traversal.next().is_none());
    }

    #[test]
    fn undecodable_row_is_a_codec_error() {
        let mut results = stream(vec![Some(Row::Text("garbage".into())), row(&page(2))]);
        let items: Vec<_> = results.traverse().unwrap().collect();

        assert!(matches!(
            items[0],
            Err(CoreError::Transaction(EngineError::Codec(_)))
        ));
        assert_eq!(items[1].as_ref().unwrap().read().number, 2);
    }

    struct Unpositionable;

    impl Cursor for Unpositionable {
        fn first(&mut self) -> custodia_engine::EngineResult<bool> {
            Err(EngineError::NotConnected)
        }

        fn next(&mut self) -> custodia_engine::EngineResult<bool> {
            Ok(false)
        }

        fn get(&self) -> custodia_engine::EngineResult<Option<Row>> {
            Err(EngineError::NoCurrentRow)
        }
    }

    #[test]
    fn failed_positioning_consumes_stream() {
        let mut results: ResultStream<Page, _> = ResultStream::new(Unpositionable);

        assert!(matches!(
            results.traverse(),
            Err(CoreError::Transaction(EngineError::NotConnected))
        ));
        assert!(results.is_consumed());
        assert!(matches!(
            results.traverse(),
            Err(CoreError::ConcurrentUse { .. })
        ));
    }

    #[test]
    fn into_iter_consumes_stream() {
        let results = stream(vec![row(&page(1)), row(&page(2))]);
        let numbers: Vec<u32> = results
            .into_iter()
            .map(|r| r.unwrap().read().number)
            .collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[test]
    fn into_iter_after_traverse_reports_once() {
        let mut results = stream(vec![row(&page(1))]);
        drop(results.traverse().unwrap());

        let items: Vec<_> = results.into_iter().collect();
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(CoreError::ConcurrentUse { .. })));
    }
}
