use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use fsm_engine::fsm_core::{CompoundState, HandleEventReturn, SimpleState, StateAllocator};
use fsm_engine::fsm_mem::StateBuffer;
use fsm_engine::{BufferedFsm, DynamicFsm};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BenchEvent {
    Toggle,
    Swap,
    Bubble,
}

struct StateA;
struct StateB;
struct Outer(u32);

impl<A: StateAllocator<BenchEvent, ()>> SimpleState<BenchEvent, (), A> for StateA {
    fn handle_event(&mut self, sa: &mut A, ev: BenchEvent) -> HandleEventReturn {
        match ev {
            BenchEvent::Toggle => sa.create_simple(StateB),
            _ => A::PASS_ON,
        }
    }
}

impl<A: StateAllocator<BenchEvent, ()>> SimpleState<BenchEvent, (), A> for StateB {
    fn handle_event(&mut self, sa: &mut A, ev: BenchEvent) -> HandleEventReturn {
        match ev {
            BenchEvent::Toggle => sa.create_simple(StateA),
            _ => A::PASS_ON,
        }
    }
}

impl<A: StateAllocator<BenchEvent, ()>> CompoundState<BenchEvent, (), A> for Outer {
    fn handle_event(&mut self, sa: &mut A, ev: BenchEvent) -> HandleEventReturn {
        match ev {
            BenchEvent::Bubble => {
                self.0 = self.0.wrapping_add(1);
                A::HANDLED_INTERNALLY
            }
            BenchEvent::Swap => {
                let staged = sa.create_compound(Outer(self.0));
                if staged.is_allocation_error() {
                    return staged;
                }
                sa.create_simple(StateA)
            }
            BenchEvent::Toggle => A::PASS_ON,
        }
    }
}

/// Leaf that opens the `Outer` level on its first event
struct Opener;

impl<A: StateAllocator<BenchEvent, ()>> SimpleState<BenchEvent, (), A> for Opener {
    fn handle_event(&mut self, sa: &mut A, _ev: BenchEvent) -> HandleEventReturn {
        let staged = sa.create_compound(Outer(0));
        if staged.is_allocation_error() {
            return staged;
        }
        sa.create_simple(StateA)
    }
}

pub fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");
    group.throughput(Throughput::Elements(1));

    group.bench_function("heap_leaf_transition", |b| {
        let mut fsm: DynamicFsm<BenchEvent, ()> = DynamicFsm::new();
        let _ = fsm.reset(StateA);
        b.iter(|| fsm.handle_event(black_box(BenchEvent::Toggle)));
    });

    group.bench_function("buffer_leaf_transition", |b| {
        let mut buffer = StateBuffer::<2, 16, 16>::new();
        let mut fsm: BufferedFsm<'_, BenchEvent, (), 2, 16, 16> =
            BufferedFsm::with_buffer(&mut buffer);
        let _ = fsm.reset(StateA);
        b.iter(|| fsm.handle_event(black_box(BenchEvent::Toggle)));
    });

    group.bench_function("buffer_bubble_handled", |b| {
        let mut buffer = StateBuffer::<2, 16, 16>::new();
        let mut fsm: BufferedFsm<'_, BenchEvent, (), 2, 16, 16> =
            BufferedFsm::with_buffer(&mut buffer);
        let _ = fsm.reset(Opener);
        fsm.handle_event(BenchEvent::Toggle);
        b.iter(|| fsm.handle_event(black_box(BenchEvent::Bubble)));
    });

    group.bench_function("buffer_compound_swap", |b| {
        let mut buffer = StateBuffer::<2, 16, 16>::new();
        let mut fsm: BufferedFsm<'_, BenchEvent, (), 2, 16, 16> =
            BufferedFsm::with_buffer(&mut buffer);
        let _ = fsm.reset(Opener);
        fsm.handle_event(BenchEvent::Toggle);
        b.iter(|| fsm.handle_event(black_box(BenchEvent::Swap)));
    });

    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default();
    targets = bench_dispatch
);

criterion_main!(benches);
