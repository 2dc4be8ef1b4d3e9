//! Frame lock between the logic worker and the render worker
//!
//! Both workers alternate strictly: one logic step, one render step, one
//! logic step, ... The logic counter starts one frame behind so that logic
//! runs first and render never sees an empty frame.
//!
//! Logic side:
//! ```text
//! loop { wait_for_pre_render(); tick(); logic_done(); }
//! logic_thread_finished();
//! ```
//! Render side:
//! ```text
//! loop { wait_for_logic(); draw(); pre_render_done(); }
//! ```

use parking_lot::{Condvar, Mutex};

const INITIAL_LOGIC_FRAME: i64 = -1;
const INITIAL_PRE_RENDER_FRAME: i64 = 0;

#[derive(Debug)]
struct FrameState {
    last_logic: i64,
    last_pre_render: i64,
    logic_finished: bool,
    running: bool,
}

/// Two-worker rendezvous barrier; carries no payload
#[derive(Debug)]
pub struct Synchronizer {
    state: Mutex<FrameState>,
    /// Render side waits here for a finished logic step
    logic: Condvar,
    /// Logic side waits here for a finished render step
    pre_render: Condvar,
    /// `set_active(false)` waits here for the drain
    disable: Condvar,
}

impl Default for Synchronizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Synchronizer {
    /// A running synchronizer at the initial frame offset
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FrameState {
                last_logic: INITIAL_LOGIC_FRAME,
                last_pre_render: INITIAL_PRE_RENDER_FRAME,
                logic_finished: false,
                running: true,
            }),
            logic: Condvar::new(),
            pre_render: Condvar::new(),
            disable: Condvar::new(),
        }
    }

    /// Rewind both counters to the initial offset; `running` is unchanged
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.last_logic = INITIAL_LOGIC_FRAME;
        state.last_pre_render = INITIAL_PRE_RENDER_FRAME;
        self.pre_render.notify_all();
        self.logic.notify_all();
    }

    /// Render side: block until the current logic step is done
    ///
    /// Returns right away when the synchronizer is not running, or as soon
    /// as it is deactivated while blocked.
    pub fn wait_for_logic(&self) {
        let mut state = self.state.lock();
        while state.running && state.last_pre_render != state.last_logic {
            self.logic.wait(&mut state);
        }
    }

    /// Logic side: block until the previous frame was rendered
    ///
    /// Same early return as [`Self::wait_for_logic`].
    pub fn wait_for_pre_render(&self) {
        let mut state = self.state.lock();
        while state.running && state.last_pre_render == state.last_logic {
            self.pre_render.wait(&mut state);
        }
    }

    pub fn pre_render_done(&self) {
        let mut state = self.state.lock();
        state.last_pre_render += 1;
        self.disable.notify_all();
        self.pre_render.notify_all();
    }

    pub fn logic_done(&self) {
        let mut state = self.state.lock();
        state.last_logic += 1;
        self.disable.notify_all();
        self.logic.notify_all();
    }

    /// Logic worker has left its loop
    pub fn logic_thread_finished(&self) {
        let mut state = self.state.lock();
        state.logic_finished = true;
        self.disable.notify_all();
    }

    /// Pause or resume the workers
    ///
    /// Pausing blocks until the logic worker reported finished and one more
    /// render step completed after the call. The render worker must keep
    /// calling `pre_render_done` for this to return, so never pause from the
    /// render thread. Resuming clears the finished flag.
    pub fn set_active(&self, active: bool) {
        let mut state = self.state.lock();
        if state.running == active {
            return;
        }
        state.running = active;

        if active {
            state.logic_finished = false;
            log::debug!("synchronizer resumed");
            return;
        }

        let target = state.last_pre_render;
        // wake parked workers so they can observe the pause
        self.logic.notify_all();
        self.pre_render.notify_all();
        while !state.logic_finished || state.last_pre_render <= target {
            self.disable.wait(&mut state);
        }
        log::debug!(
            "synchronizer paused at logic {}, render {}",
            state.last_logic,
            state.last_pre_render
        );
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// Snapshot of `(last_logic, last_pre_render)`
    pub fn frames(&self) -> (i64, i64) {
        let state = self.state.lock();
        (state.last_logic, state.last_pre_render)
    }
}
