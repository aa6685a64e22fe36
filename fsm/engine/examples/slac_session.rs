//! Simulated SLAC matching session on an allocation-free state machine.
//!
//! An EV-side session resets the PLC chip, sends parameter requests and
//! retries until the simulated modem answers. Leaf callbacks return the
//! number of milliseconds to wait before the next `feed`.

use std::cell::RefCell;
use std::rc::Rc;

use fsm_engine::fsm_core::{
    CallbackResult, CompoundState, FeedResult, HandleEventReturn, SimpleState, StateAllocator,
};
use fsm_engine::fsm_mem::StateBuffer;
use fsm_engine::{BufferedFsm, FsmConfig};
use log::{info, LevelFilter, Log, Metadata, Record};

const CHIP_RESET_DELAY_MS: u32 = 100;
const CHIP_RESET_TIMEOUT_MS: u32 = 500;
const MATCH_RESPONSE_MS: u32 = 200;
const MAX_PARM_REQUESTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    TriggerMatching,
    SlacMessage,
    Success,
    Failed,
    Reset,
}

/// Simulated PLC modem shared by all states
#[derive(Debug, Default)]
struct Modem {
    chip_reset_enabled: bool,
    parm_requests: u32,
    answer_after: u32,
    pending: Option<Event>,
}

impl Modem {
    fn send_reset(&mut self) {
        info!("modem: RS_DEV.REQ");
        self.pending = Some(Event::Success);
    }

    fn send_parm_req(&mut self) {
        self.parm_requests += 1;
        info!("modem: CM_SLAC_PARM.REQ #{}", self.parm_requests);
        if self.parm_requests >= self.answer_after {
            self.pending = Some(Event::SlacMessage);
        }
    }

    fn poll(&mut self) -> Option<Event> {
        self.pending.take()
    }
}

type Ctx = Rc<RefCell<Modem>>;

struct ResetState {
    ctx: Ctx,
}

impl<A: StateAllocator<Event, u32>> SimpleState<Event, u32, A> for ResetState {
    fn enter(&mut self) {
        info!("entered reset state, signalling UNMATCHED");
    }

    fn handle_event(&mut self, sa: &mut A, ev: Event) -> HandleEventReturn {
        if ev != Event::TriggerMatching {
            return A::PASS_ON;
        }
        let staged = sa.create_compound(MatchingState {
            ctx: self.ctx.clone(),
        });
        if staged.is_allocation_error() {
            return staged;
        }
        if self.ctx.borrow().chip_reset_enabled {
            sa.create_simple(ResetChipState {
                ctx: self.ctx.clone(),
                sub_state: ChipReset::Delay,
            })
        } else {
            sa.create_simple(InitSlacState::new(self.ctx.clone()))
        }
    }
}

/// Level 0 container for every state of an ongoing matching attempt
struct MatchingState {
    ctx: Ctx,
}

impl<A: StateAllocator<Event, u32>> CompoundState<Event, u32, A> for MatchingState {
    fn enter(&mut self) {
        info!("matching session opened");
    }

    fn handle_event(&mut self, sa: &mut A, ev: Event) -> HandleEventReturn {
        match ev {
            Event::Reset | Event::Failed => sa.create_simple(ResetState {
                ctx: self.ctx.clone(),
            }),
            _ => A::PASS_ON,
        }
    }

    fn leave(&mut self) {
        info!("matching session closed");
    }
}

#[derive(Debug, Clone, Copy)]
enum ChipReset {
    Delay,
    SendReset,
    Done,
}

struct ResetChipState {
    ctx: Ctx,
    sub_state: ChipReset,
}

impl<A: StateAllocator<Event, u32>> SimpleState<Event, u32, A> for ResetChipState {
    fn enter(&mut self) {
        info!("entered chip reset state");
    }

    fn handle_event(&mut self, sa: &mut A, ev: Event) -> HandleEventReturn {
        match ev {
            Event::Success => sa.create_simple(InitSlacState::new(self.ctx.clone())),
            _ => A::PASS_ON,
        }
    }

    fn callback(&mut self) -> CallbackResult<Event, u32> {
        match self.sub_state {
            ChipReset::Delay => {
                self.sub_state = ChipReset::SendReset;
                CallbackResult::Value(CHIP_RESET_DELAY_MS)
            }
            ChipReset::SendReset => {
                self.ctx.borrow_mut().send_reset();
                self.sub_state = ChipReset::Done;
                CallbackResult::Value(CHIP_RESET_TIMEOUT_MS)
            }
            ChipReset::Done => {
                info!("chip reset timed out");
                CallbackResult::Event(Event::Failed)
            }
        }
    }
}

struct InitSlacState {
    ctx: Ctx,
    tries: u32,
}

impl InitSlacState {
    fn new(ctx: Ctx) -> Self {
        Self { ctx, tries: 0 }
    }
}

impl<A: StateAllocator<Event, u32>> SimpleState<Event, u32, A> for InitSlacState {
    fn enter(&mut self) {
        info!("entered init state");
    }

    fn handle_event(&mut self, sa: &mut A, ev: Event) -> HandleEventReturn {
        match ev {
            Event::SlacMessage => sa.create_simple(MatchedState),
            _ => A::PASS_ON,
        }
    }

    fn callback(&mut self) -> CallbackResult<Event, u32> {
        if self.tries == MAX_PARM_REQUESTS {
            return CallbackResult::Event(Event::Failed);
        }
        self.tries += 1;
        self.ctx.borrow_mut().send_parm_req();
        CallbackResult::Value(MATCH_RESPONSE_MS)
    }
}

struct MatchedState;

impl<A: StateAllocator<Event, u32>> SimpleState<Event, u32, A> for MatchedState {
    fn enter(&mut self) {
        info!("entered matched state, signalling MATCHED");
    }

    fn handle_event(&mut self, _sa: &mut A, _ev: Event) -> HandleEventReturn {
        A::PASS_ON
    }
}

struct StdoutLogger;

impl Log for StdoutLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        println!("[{:<5}] {}", record.level(), record.args());
    }

    fn flush(&self) {}
}

static LOGGER: StdoutLogger = StdoutLogger;

fn main() {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Debug);
    }

    let ctx = Ctx::new(RefCell::new(Modem {
        chip_reset_enabled: true,
        answer_after: 2,
        ..Modem::default()
    }));

    let mut buffer = StateBuffer::<1, 32, 16>::new();
    let config = FsmConfig::builder().name("slac-ev").build();
    let mut fsm: BufferedFsm<'_, Event, u32, 1, 32, 16> =
        BufferedFsm::with_buffer(&mut buffer).with_config(config);

    if let Err(err) = fsm.reset(ResetState { ctx: ctx.clone() }) {
        eprintln!("failed to reset: {err}");
        return;
    }
    fsm.handle_event(Event::TriggerMatching);

    let mut elapsed_ms = 0;
    for _ in 0..16 {
        match fsm.feed() {
            FeedResult::HasValue(timeout_ms) => elapsed_ms += timeout_ms,
            FeedResult::Transition => continue,
            FeedResult::NoValue | FeedResult::UnhandledEvent => break,
            FeedResult::InternalError => {
                eprintln!("internal error: {:?}", fsm.last_error());
                return;
            }
        }

        let incoming = ctx.borrow_mut().poll();
        if let Some(ev) = incoming {
            fsm.handle_event(ev);
        }
    }

    info!("session finished after {} ms", elapsed_ms);

    // unplug: the matching container handles the reset for any leaf
    fsm.handle_event(Event::Reset);
    info!(
        "nesting level {} after reset: {:?}",
        fsm.current_nesting_level(),
        fsm.stats()
    );
    info!("allocator: {:?}", fsm.allocator_stats());
}
