//! Fixed-capacity, allocation-free state arena
//!
//! A [`StateBuffer`] owns raw storage for one simple slot and one compound
//! slot per nesting level. Every slot holds two buffers plus a toggle that
//! selects the buffer for the next construction and an occupancy tag per
//! buffer:
//!
//! ```text
//! StateBuffer<L, S, C>
//! ├── simple:   Slot<S>       { buffers: [a, b], occupied, next }
//! └── compound: [Slot<C>; L]  { buffers: [a, b], occupied, next }
//! ```
//!
//! The toggle flips when a state is constructed, not when it becomes live,
//! and a buffer that is still occupied is never handed out. A state that
//! stages a new instance of its own type therefore never shares memory with
//! the replacement, even though it is still executing when the replacement
//! is built.
//!
//! # Safety model
//!
//! After an [`ArenaStore`] borrows the buffer, the buffer is only accessed
//! through raw pointers derived from that single borrow. Each live or staged
//! state owns exactly one occupied buffer; constructing writes only to a free
//! buffer and destroying clears the tag of the buffer it owned. No reference
//! to the whole buffer is created while states are alive.

use core::fmt;
use core::marker::PhantomData;
use core::mem::{self, MaybeUninit};
use core::ops::{Deref, DerefMut};
use core::ptr::{self, NonNull};

use fsm_core::{
    AllocError, CompoundState, HandleEventReturn, SimpleState, StateAllocator, StateKind,
};
use log::{trace, warn};

use crate::{AllocatorStats, StateStore};

/// Alignment guaranteed by every arena buffer
pub const SLOT_ALIGN: usize = 16;

#[derive(Clone, Copy)]
#[repr(C, align(16))]
struct RawBuffer<const N: usize> {
    bytes: MaybeUninit<[u8; N]>,
}

#[derive(Clone, Copy)]
struct Slot<const N: usize> {
    buffers: [RawBuffer<N>; 2],
    occupied: [bool; 2],
    next: usize,
}

impl<const N: usize> Slot<N> {
    const fn new() -> Self {
        Self {
            buffers: [RawBuffer {
                bytes: MaybeUninit::uninit(),
            }; 2],
            occupied: [false; 2],
            next: 0,
        }
    }
}

/// Raw storage for the arena allocator
///
/// - `MAX_NESTING_LEVEL`: number of compound levels
/// - `MAX_SIMPLE_STATE_SIZE`: largest simple state in bytes
/// - `MAX_COMPOUND_STATE_SIZE`: largest compound state in bytes
///
/// States larger than their slot, or aligned beyond [`SLOT_ALIGN`], are
/// rejected at compile time:
///
/// ```compile_fail
/// use fsm_core::{HandleEventReturn, SimpleState, StateAllocator};
/// use fsm_mem::{ArenaStore, StateBuffer, StateStore};
///
/// struct Oversized([u8; 64]);
///
/// impl<A> SimpleState<(), (), A> for Oversized {
///     fn handle_event(&mut self, _sa: &mut A, _ev: ()) -> HandleEventReturn {
///         HandleEventReturn::PassOn
///     }
/// }
///
/// let mut buffer = StateBuffer::<1, 8, 8>::new();
/// let mut store = ArenaStore::<(), (), 1, 8, 8>::new(&mut buffer);
/// store.make_ready_for_nesting_level(0);
/// let _ = store.allocator().create_simple(Oversized([0; 64]));
/// ```
///
/// The same state fits once the simple slot is large enough:
///
/// ```
/// use fsm_core::{HandleEventReturn, SimpleState, StateAllocator};
/// use fsm_mem::{ArenaStore, StateBuffer, StateStore};
///
/// struct Oversized([u8; 64]);
///
/// impl<A> SimpleState<(), (), A> for Oversized {
///     fn handle_event(&mut self, _sa: &mut A, _ev: ()) -> HandleEventReturn {
///         HandleEventReturn::PassOn
///     }
/// }
///
/// let mut buffer = StateBuffer::<1, 64, 8>::new();
/// let mut store = ArenaStore::<(), (), 1, 64, 8>::new(&mut buffer);
/// store.make_ready_for_nesting_level(0);
/// assert!(store.allocator().create_simple(Oversized([0; 64])).is_new_state());
/// ```
pub struct StateBuffer<
    const MAX_NESTING_LEVEL: usize,
    const MAX_SIMPLE_STATE_SIZE: usize,
    const MAX_COMPOUND_STATE_SIZE: usize,
> {
    simple: Slot<MAX_SIMPLE_STATE_SIZE>,
    compound: [Slot<MAX_COMPOUND_STATE_SIZE>; MAX_NESTING_LEVEL],
}

impl<const L: usize, const S: usize, const C: usize> StateBuffer<L, S, C> {
    pub const MAX_NESTING_LEVEL: usize = L;
    pub const MAX_SIMPLE_STATE_SIZE: usize = S;
    pub const MAX_COMPOUND_STATE_SIZE: usize = C;

    pub const fn new() -> Self {
        Self {
            simple: Slot::new(),
            compound: [Slot::new(); L],
        }
    }

    /// Number of buffers currently holding a state
    pub fn occupied_buffers(&self) -> usize {
        let count = |slot: &[bool; 2]| slot.iter().filter(|occupied| **occupied).count();
        count(&self.simple.occupied)
            + self
                .compound
                .iter()
                .map(|slot| count(&slot.occupied))
                .sum::<usize>()
    }
}

impl<const L: usize, const S: usize, const C: usize> Default for StateBuffer<L, S, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const L: usize, const S: usize, const C: usize> fmt::Debug for StateBuffer<L, S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateBuffer")
            .field("max_nesting_level", &L)
            .field("max_simple_state_size", &S)
            .field("max_compound_state_size", &C)
            .field("occupied_buffers", &self.occupied_buffers())
            .finish()
    }
}

/// Compile-time check that `T` fits a buffer of `N` bytes
struct Fits<T, const N: usize>(PhantomData<T>);

impl<T, const N: usize> Fits<T, N> {
    const OK: () = assert!(
        mem::size_of::<T>() <= N && mem::align_of::<T>() <= SLOT_ALIGN,
        "state type does not fit into its arena buffer"
    );
}

/// Location of a state constructed inside a slot
struct Placed<T: ?Sized> {
    object: NonNull<T>,
    occupied: NonNull<bool>,
}

/// Move `value` into a free buffer of `slot`, flipping the toggle
///
/// Returns `None`, dropping `value`, when both buffers are occupied.
///
/// # Safety
///
/// `slot` must point to a live `Slot<N>` that is only accessed through raw
/// pointers, and `T` must fit the buffer (see [`Fits`]).
unsafe fn emplace<T, const N: usize>(slot: *mut Slot<N>, value: T) -> Option<Placed<T>> {
    // SAFETY: the caller guarantees `slot` is valid; only the tag, toggle and
    // a free buffer are touched, never the buffer backing a live state.
    unsafe {
        let occupied = ptr::addr_of_mut!((*slot).occupied).cast::<bool>();
        let next = ptr::addr_of!((*slot).next).read();
        let index = if !occupied.add(next).read() {
            next
        } else if !occupied.add(1 - next).read() {
            1 - next
        } else {
            return None;
        };

        let target = ptr::addr_of_mut!((*slot).buffers)
            .cast::<RawBuffer<N>>()
            .add(index)
            .cast::<T>();
        target.write(value);
        occupied.add(index).write(true);
        ptr::addr_of_mut!((*slot).next).write(1 - index);

        Some(Placed {
            object: NonNull::new_unchecked(target),
            occupied: NonNull::new_unchecked(occupied.add(index)),
        })
    }
}

/// Drop a placed state and free its buffer
///
/// # Safety
///
/// `placed` must describe a state created by [`emplace`] that has not been
/// destroyed yet and is not referenced anywhere else.
unsafe fn destroy<T: ?Sized>(placed: &Placed<T>) {
    // SAFETY: guaranteed by the caller.
    unsafe {
        ptr::drop_in_place(placed.object.as_ptr());
        placed.occupied.as_ptr().write(false);
    }
}

/// Simple state as stored by the arena allocator
pub type ArenaSimpleState<E, R, const L: usize, const S: usize, const C: usize> =
    dyn SimpleState<E, R, ArenaStateAllocator<E, R, L, S, C>>;
/// Compound state as stored by the arena allocator
pub type ArenaCompoundState<E, R, const L: usize, const S: usize, const C: usize> =
    dyn CompoundState<E, R, ArenaStateAllocator<E, R, L, S, C>>;

/// Allocator facade that constructs staged states inside a [`StateBuffer`]
///
/// Only an [`ArenaStore`] creates this type; handlers receive it by mutable
/// reference for the duration of one dispatch.
pub struct ArenaStateAllocator<E, R, const L: usize, const S: usize, const C: usize> {
    buffer: NonNull<StateBuffer<L, S, C>>,
    simple: Option<Placed<ArenaSimpleState<E, R, L, S, C>>>,
    compound: Option<Placed<ArenaCompoundState<E, R, L, S, C>>>,
    ready: bool,
    level: usize,
    stats: AllocatorStats,
}

impl<E, R, const L: usize, const S: usize, const C: usize> ArenaStateAllocator<E, R, L, S, C> {
    fn new(buffer: NonNull<StateBuffer<L, S, C>>) -> Self {
        Self {
            buffer,
            simple: None,
            compound: None,
            ready: false,
            level: 0,
            stats: AllocatorStats::new(),
        }
    }

    /// Nesting level the current pass stages for
    pub fn nesting_level(&self) -> usize {
        self.level
    }

    fn reject(&mut self, err: AllocError) -> HandleEventReturn {
        warn!("arena allocator rejected state at level {}: {}", self.level, err);
        self.stats.on_error();
        HandleEventReturn::AllocationError(err)
    }

    fn release(&mut self) {
        if let Some(placed) = self.simple.take() {
            // SAFETY: staged states are owned by the allocator alone.
            unsafe { destroy(&placed) };
            self.stats.on_release();
        }
        if let Some(placed) = self.compound.take() {
            // SAFETY: staged states are owned by the allocator alone.
            unsafe { destroy(&placed) };
            self.stats.on_release();
        }
    }
}

impl<E, R, const L: usize, const S: usize, const C: usize> StateAllocator<E, R>
    for ArenaStateAllocator<E, R, L, S, C>
{
    fn create_simple<T>(&mut self, state: T) -> HandleEventReturn
    where
        T: SimpleState<E, R, Self> + 'static,
    {
        #[allow(clippy::let_unit_value)]
        let () = Fits::<T, S>::OK;

        if !self.ready {
            return self.reject(AllocError::NotReady);
        }
        if self.simple.is_some() {
            return self.reject(AllocError::AlreadyStaged(StateKind::Simple));
        }

        // SAFETY: the buffer is borrowed by the owning store for as long as
        // this allocator exists and the size check above passed.
        let placed = unsafe {
            let slot = ptr::addr_of_mut!((*self.buffer.as_ptr()).simple);
            emplace(slot, state)
        };
        let Some(placed) = placed else {
            return self.reject(AllocError::SlotsExhausted {
                kind: StateKind::Simple,
                level: self.level,
            });
        };

        let object: NonNull<ArenaSimpleState<E, R, L, S, C>> = placed.object;
        self.simple = Some(Placed {
            object,
            occupied: placed.occupied,
        });
        self.stats.on_create();
        trace!(
            "staged simple state ({} of {} bytes) at {:p}",
            mem::size_of::<T>(),
            S,
            object.as_ptr()
        );
        HandleEventReturn::NewState
    }

    fn create_compound<T>(&mut self, state: T) -> HandleEventReturn
    where
        T: CompoundState<E, R, Self> + 'static,
    {
        #[allow(clippy::let_unit_value)]
        let () = Fits::<T, C>::OK;

        if !self.ready {
            return self.reject(AllocError::NotReady);
        }
        if self.compound.is_some() {
            return self.reject(AllocError::AlreadyStaged(StateKind::Compound));
        }
        if self.level >= L {
            return self.reject(AllocError::NestingOverflow {
                level: self.level,
                max: L,
            });
        }

        // SAFETY: `level < L` keeps the slot pointer inside the compound
        // array; see `create_simple` for the buffer borrow.
        let placed = unsafe {
            let slot = ptr::addr_of_mut!((*self.buffer.as_ptr()).compound)
                .cast::<Slot<C>>()
                .add(self.level);
            emplace(slot, state)
        };
        let Some(placed) = placed else {
            return self.reject(AllocError::SlotsExhausted {
                kind: StateKind::Compound,
                level: self.level,
            });
        };

        let object: NonNull<ArenaCompoundState<E, R, L, S, C>> = placed.object;
        self.compound = Some(Placed {
            object,
            occupied: placed.occupied,
        });
        self.stats.on_create();
        trace!(
            "staged compound state ({} of {} bytes) for level {} at {:p}",
            mem::size_of::<T>(),
            C,
            self.level,
            object.as_ptr()
        );
        HandleEventReturn::NewState
    }
}

/// Owning handle of a state living in a [`StateBuffer`]
///
/// Dropping the handle drops the state in place and frees its buffer.
pub struct ArenaBox<'b, T: ?Sized> {
    placed: Placed<T>,
    _buffer: PhantomData<&'b mut ()>,
    _owns: PhantomData<T>,
}

impl<T: ?Sized> ArenaBox<'_, T> {
    /// Address of the state inside the arena
    pub fn as_ptr(this: &Self) -> *const T {
        this.placed.object.as_ptr()
    }
}

impl<T: ?Sized> Deref for ArenaBox<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the handle uniquely owns an initialized state.
        unsafe { self.placed.object.as_ref() }
    }
}

impl<T: ?Sized> DerefMut for ArenaBox<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the handle uniquely owns an initialized state.
        unsafe { self.placed.object.as_mut() }
    }
}

impl<T: ?Sized> Drop for ArenaBox<'_, T> {
    fn drop(&mut self) {
        // SAFETY: the handle uniquely owns the state and the buffer outlives
        // `'b`.
        unsafe { destroy(&self.placed) };
    }
}

/// Arena-backed [`StateStore`] borrowing a [`StateBuffer`] for `'b`
///
/// Performs no heap allocation; the compound stack is a `heapless::Vec`
/// with one entry per nesting level.
pub struct ArenaStore<'b, E, R, const L: usize, const S: usize, const C: usize> {
    allocator: ArenaStateAllocator<E, R, L, S, C>,
    _buffer: PhantomData<&'b mut StateBuffer<L, S, C>>,
}

impl<'b, E, R, const L: usize, const S: usize, const C: usize> ArenaStore<'b, E, R, L, S, C> {
    pub fn new(buffer: &'b mut StateBuffer<L, S, C>) -> Self {
        Self {
            allocator: ArenaStateAllocator::new(NonNull::from(buffer)),
            _buffer: PhantomData,
        }
    }
}

impl<'b, E, R, const L: usize, const S: usize, const C: usize> StateStore<E, R>
    for ArenaStore<'b, E, R, L, S, C>
{
    type Allocator = ArenaStateAllocator<E, R, L, S, C>;
    type Simple = ArenaBox<'b, ArenaSimpleState<E, R, L, S, C>>;
    type Compound = ArenaBox<'b, ArenaCompoundState<E, R, L, S, C>>;
    type Stack = heapless::Vec<ArenaBox<'b, ArenaCompoundState<E, R, L, S, C>>, L>;

    fn allocator(&mut self) -> &mut Self::Allocator {
        &mut self.allocator
    }

    fn new_stack(&self) -> Self::Stack {
        heapless::Vec::new()
    }

    fn make_ready_for_nesting_level(&mut self, level: usize) {
        self.allocator.release();
        self.allocator.ready = true;
        self.allocator.level = level;
    }

    fn finish_pass(&mut self) {
        self.allocator.release();
        self.allocator.ready = false;
    }

    fn has_staged_states(&self) -> bool {
        self.allocator.simple.is_some() || self.allocator.compound.is_some()
    }

    fn has_staged_simple_state(&self) -> bool {
        self.allocator.simple.is_some()
    }

    fn pull_simple_state(&mut self) -> Option<Self::Simple> {
        let placed = self.allocator.simple.take()?;
        self.allocator.stats.on_pull();
        Some(ArenaBox {
            placed,
            _buffer: PhantomData,
            _owns: PhantomData,
        })
    }

    fn pull_compound_state(&mut self) -> Option<Self::Compound> {
        let placed = self.allocator.compound.take()?;
        self.allocator.stats.on_pull();
        Some(ArenaBox {
            placed,
            _buffer: PhantomData,
            _owns: PhantomData,
        })
    }

    fn release_staged_states(&mut self) {
        self.allocator.release();
    }

    fn max_nesting_level(&self) -> Option<usize> {
        Some(L)
    }

    fn stats(&self) -> AllocatorStats {
        self.allocator.stats
    }
}

impl<E, R, const L: usize, const S: usize, const C: usize> Drop for ArenaStore<'_, E, R, L, S, C> {
    fn drop(&mut self) {
        self.allocator.release();
    }
}
