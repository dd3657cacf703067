//! State machine wrapping a [LevelIterator] with the peek-before-advance
//! contract [crate::scan::merge::KWayMerge] needs: every source must expose
//! its current candidate without consuming it, since the merge has to look
//! at every source's head before deciding which one wins a given key.

use std::{cell::RefCell, ops::Bound, rc::Rc};

use crate::{
    db::{Diff, Entry},
    scan::{
        buffer::ScanBuffer,
        event_loop::EventLoop,
        level_iter::{Direction, LevelIterator},
        manifest::TableInfo,
        storage::BlockStore,
    },
    Result,
};

/// Where a [LevelScan] is relative to its underlying data.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum State {
    /// No block has been loaded yet; the first `poll` will issue I/O.
    Idle,
    /// A fetch is outstanding; `current()` is not yet meaningful.
    Loading,
    /// `current()` holds a valid candidate entry.
    Ready,
    /// The level has no further entries in range.
    Eof,
}

/// One level's contribution to a k-way merge.
pub struct LevelScan<K, V, D = <V as Diff>::Delta>
where
    V: Diff<Delta = D>,
{
    iter: Option<LevelIterator<K, V, D>>,
    state: Rc<RefCell<State>>,
}

impl<K, V, D> Clone for LevelScan<K, V, D>
where
    V: Diff<Delta = D>,
{
    fn clone(&self) -> Self {
        LevelScan {
            iter: self.iter.clone(),
            state: self.state.clone(),
        }
    }
}

impl<K, V, D> LevelScan<K, V, D>
where
    K: Clone + Ord + 'static,
    V: Clone + Diff<Delta = D> + 'static,
    D: Clone + 'static,
{
    /// Begin loading a level, positioned at the start (or end, in reverse)
    /// of `range`. `buffer`, when given, is charged for every data block the
    /// level loads, including the very first one loaded here.
    pub fn open(
        tables: Vec<TableInfo<K>>,
        range: (Bound<K>, Bound<K>),
        direction: Direction,
        store: Rc<dyn BlockStore<K, V, D>>,
        buffer: Option<Rc<RefCell<ScanBuffer>>>,
        el: &mut EventLoop,
        on_done: Box<dyn FnOnce(&mut EventLoop, Result<LevelScan<K, V, D>>)>,
    ) {
        LevelIterator::open(
            tables,
            range,
            direction,
            store,
            buffer,
            el,
            Box::new(move |el, res| {
                let result = res.map(|iter| {
                    let state = if iter.is_eof() {
                        State::Eof
                    } else {
                        State::Ready
                    };
                    LevelScan {
                        iter: Some(iter),
                        state: Rc::new(RefCell::new(state)),
                    }
                });
                on_done(el, result)
            }),
        );
    }

    pub fn state(&self) -> State {
        *self.state.borrow()
    }

    /// The entry this level would contribute right now, or `None` at EOF.
    pub fn current(&self) -> Option<Entry<K, V, D>> {
        match self.state() {
            State::Ready => self.iter.as_ref().and_then(|it| it.current()),
            _ => None,
        }
    }

    /// Consume the current candidate and load the next one.
    pub fn advance(
        &self,
        el: &mut EventLoop,
        buffer: Option<&Rc<RefCell<ScanBuffer>>>,
        on_done: Box<dyn FnOnce(&mut EventLoop, Result<LevelScan<K, V, D>>)>,
    ) {
        let iter = match &self.iter {
            Some(it) => it.clone(),
            None => {
                let this = self.clone();
                el.schedule(move |el| on_done(el, Ok(this)));
                return;
            }
        };

        *self.state.borrow_mut() = State::Loading;
        let this = self.clone();
        iter.advance(
            el,
            buffer,
            Box::new(move |el, res| {
                let result = res.map(|iter| {
                    *this.state.borrow_mut() = if iter.is_eof() {
                        State::Eof
                    } else {
                        State::Ready
                    };
                    this
                });
                on_done(el, result)
            }),
        );
    }
}
